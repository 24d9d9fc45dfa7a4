// GET handlers: metrics, version

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use super::AppState;
use crate::version::VersionInfo;

/// GET /metrics: Prometheus text exposition of every container gauge.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.sink.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, operation = "render_metrics", "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /version
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(VersionInfo::current())
}
