use axum::{
    routing::{get, post},
    Router,
};

use super::{health, tariffs};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/calculate", post(tariffs::calculate))
        .route("/tariffs", get(tariffs::list_tariffs))
        .route("/tariffs/:key", get(tariffs::get_tariff))
        .route("/healthz", get(health::healthz))
        .route("/health", get(health::health_check))
        .with_state(state)
}
