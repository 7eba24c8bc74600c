use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::bonus::BonusBalance,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::bonus_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/bonus", get(get_bonus))
}

#[utoipa::path(
    get,
    path = "/api/user/bonus",
    responses(
        (status = 200, description = "Caller's bonus point balance", body = ApiResponse<BonusBalance>)
    ),
    security(("bearer_auth" = [])),
    tag = "Bonus"
)]
pub async fn get_bonus(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BonusBalance>>> {
    let resp = bonus_service::get_balance(&state.pool, &user).await?;
    Ok(Json(resp))
}
