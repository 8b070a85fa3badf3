//! HTTP handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::instrument;

use cube_common::{
    AggregationOption, CubeError, QualifierAdmins, RawResolution, RegionalAdmins,
    TemporalResolution, TileCoord, TileSpec, TimeseriesPoint,
};

use crate::error::ApiResult;
use crate::state::AppState;

pub const VECTOR_TILE_CONTENT_TYPE: &str = "application/vnd.mapbox-vector-tile";

// ============================================================================
// Tiles
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TileQuery {
    /// JSON array of tile specs
    pub specs: String,
}

/// GET /tiles/:z/:x/:y?specs=[...]
#[instrument(skip(state, query))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, u32)>,
    Query(query): Query<TileQuery>,
) -> ApiResult<Response> {
    let specs: Vec<TileSpec> = serde_json::from_str(&query.specs)
        .map_err(|e| CubeError::invalid_parameter("specs", e.to_string()))?;

    let tile = state
        .tiles
        .build_tile(TileCoord::new(z, x, y), &specs)
        .await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, VECTOR_TILE_CONTENT_TYPE),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        tile,
    )
        .into_response())
}

// ============================================================================
// Timeseries
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CorrectRequest {
    pub series: Vec<TimeseriesPoint>,
    pub agg_option: AggregationOption,
    pub agg_res: TemporalResolution,
    pub raw_res: RawResolution,
    pub raw_last_timestamp: i64,
}

/// POST /timeseries/correct
pub async fn correct_handler(
    Json(request): Json<CorrectRequest>,
) -> ApiResult<Json<Vec<TimeseriesPoint>>> {
    let corrected = output_engine::correct(
        &request.series,
        request.agg_option,
        request.agg_res,
        request.raw_res,
        request.raw_last_timestamp,
    )?;
    Ok(Json(corrected))
}

#[derive(Debug, Deserialize)]
pub struct PerCapitaTimeseriesRequest {
    pub series: Vec<TimeseriesPoint>,
    pub region_id: String,
}

/// POST /timeseries/per-capita
#[instrument(skip(state, request), fields(region_id = %request.region_id))]
pub async fn per_capita_timeseries_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<PerCapitaTimeseriesRequest>,
) -> ApiResult<Json<Vec<TimeseriesPoint>>> {
    let series = state
        .transforms
        .per_capita_timeseries(&request.series, &request.region_id)
        .await?;
    Ok(Json(series))
}

// ============================================================================
// Regional outputs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PerCapitaRegionalRequest {
    pub admins: RegionalAdmins,
    pub timestamp: i64,
}

/// POST /regional/per-capita
#[instrument(skip(state, request), fields(timestamp = request.timestamp))]
pub async fn per_capita_regional_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<PerCapitaRegionalRequest>,
) -> ApiResult<Json<RegionalAdmins>> {
    let admins = state
        .transforms
        .per_capita_regional(&request.admins, request.timestamp)
        .await?;
    Ok(Json(admins))
}

/// POST /regional/normalize
pub async fn normalize_regional_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(admins): Json<RegionalAdmins>,
) -> Json<RegionalAdmins> {
    Json(state.transforms.normalize_regional(&admins))
}

#[derive(Debug, Deserialize)]
pub struct PerCapitaQualifierRequest {
    pub admins: QualifierAdmins,
    pub timestamp: i64,
}

/// POST /regional/qualifier/per-capita
#[instrument(skip(state, request), fields(timestamp = request.timestamp))]
pub async fn per_capita_qualifier_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<PerCapitaQualifierRequest>,
) -> ApiResult<Json<QualifierAdmins>> {
    let admins = state
        .transforms
        .per_capita_qualifier(&request.admins, request.timestamp)
        .await?;
    Ok(Json(admins))
}

/// POST /regional/qualifier/normalize
pub async fn normalize_qualifier_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(admins): Json<QualifierAdmins>,
) -> Json<QualifierAdmins> {
    Json(state.transforms.normalize_qualifier(&admins))
}

// ============================================================================
// Health & Metrics
// ============================================================================

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}
