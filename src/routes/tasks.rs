use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::tasks::TaskList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::task_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/generate", post(generate_tasks))
}

#[utoipa::path(
    get,
    path = "/api/user-tasks",
    responses(
        (status = 200, description = "Current month's tasks", body = ApiResponse<TaskList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<TaskList>>> {
    let resp = task_service::list_tasks(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/user-tasks/generate",
    responses(
        (status = 200, description = "Generated monthly task batch", body = ApiResponse<TaskList>),
        (status = 409, description = "Tasks already generated this month"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn generate_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<TaskList>>> {
    let resp = task_service::generate_monthly(&state, &user).await?;
    Ok(Json(resp))
}
