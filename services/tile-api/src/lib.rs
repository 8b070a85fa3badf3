//! Datacube tile and output API service library.
//!
//! This module exposes the router and its parts for testing purposes.

pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use state::AppState;

/// Build the HTTP router over shared state.
pub fn router(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        // Vector tiles
        .route("/tiles/:z/:x/:y", get(handlers::tile_handler))
        // Timeseries
        .route("/timeseries/correct", post(handlers::correct_handler))
        .route(
            "/timeseries/per-capita",
            post(handlers::per_capita_timeseries_handler),
        )
        // Regional outputs
        .route(
            "/regional/per-capita",
            post(handlers::per_capita_regional_handler),
        )
        .route("/regional/normalize", post(handlers::normalize_regional_handler))
        .route(
            "/regional/qualifier/per-capita",
            post(handlers::per_capita_qualifier_handler),
        )
        .route(
            "/regional/qualifier/normalize",
            post(handlers::normalize_qualifier_handler),
        )
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus))
}
