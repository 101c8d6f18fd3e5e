use axum::Router;

pub mod farms;
pub mod system;

/// Router for all farm-scoped endpoints.
pub fn router() -> Router {
    Router::new().nest("/farms", farms::router())
}
