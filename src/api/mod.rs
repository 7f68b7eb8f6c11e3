pub mod error;
pub mod filters;
pub mod methods;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the JSON-RPC router: one POST endpoint for all methods and an
/// optional Prometheus scrape route. CORS mirrors the request origin.
pub fn router(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut app = Router::new().route("/", post(methods::dispatch));

    if let Some(handle) = metrics_handle {
        app = app.route(
            "/metrics",
            get(move || std::future::ready(handle.render())),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
