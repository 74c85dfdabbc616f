//! API routes module

pub mod broadcasts;
pub mod health;

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create all API routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/broadcasts", broadcasts::router(state.clone()))
        .merge(health::router(state))
        .layer(middleware::from_fn(
            observability::middleware::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
