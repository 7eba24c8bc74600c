use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post, put},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{SubmitReviewRequest, UpdateReviewRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/orders/{order_id}/products/{product_id}/reviews",
            post(submit_review),
        )
        .route("/reviews/{id}", put(update_review))
        .route("/reviews/{id}", delete(delete_review))
}

#[utoipa::path(
    post,
    path = "/api/orders/{order_id}/products/{product_id}/reviews",
    params(
        ("order_id" = Uuid, Path, description = "Order ID"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = SubmitReviewRequest,
    responses(
        (status = 200, description = "Review created", body = ApiResponse<Review>),
        (status = 403, description = "Product not purchased in this order"),
        (status = 409, description = "Product already reviewed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path((order_id, product_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SubmitReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp =
        review_service::submit_review(&state.pool, &user, order_id, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ApiResponse<Review>),
        (status = 403, description = "Not the review owner"),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::update_review(&state.pool, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Review deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = review_service::delete_review(&state.pool, &user, id).await?;
    Ok(Json(resp))
}
