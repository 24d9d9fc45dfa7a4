// HTTP routes: Prometheus scrape endpoint and version

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::sink::PrometheusSink;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) sink: Arc<PrometheusSink>,
}

pub fn app(sink: Arc<PrometheusSink>) -> Router {
    let state = AppState { sink };
    Router::new()
        .route("/metrics", get(http::metrics_handler)) // GET /metrics
        .route("/version", get(http::version_handler)) // GET /version
        .with_state(state)
}
