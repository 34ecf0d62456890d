//! HTTP route handlers.

pub mod app;
pub mod billing;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// All application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(app::router())
        .merge(billing::router())
        .merge(webhooks::router())
}
