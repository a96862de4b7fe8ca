//! HTTP routes.

pub mod customers;
pub mod orders;
pub mod rates;
pub mod settings;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// All engine routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(orders::router())
        .merge(rates::router())
        .merge(settings::router())
        .merge(customers::router())
        .merge(webhooks::stripe::router())
        .merge(webhooks::boxtal::router())
}
