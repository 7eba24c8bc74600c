use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod bonus;
pub mod cart;
pub mod doc;
pub mod favorites;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod reviews;
pub mod tasks;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .merge(reviews::router())
        .nest("/user-tasks", tasks::router())
        .nest("/user", bonus::router())
        .nest("/favorites", favorites::router())
        .nest("/admin", admin::router())
}
