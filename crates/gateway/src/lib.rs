//! Gutachten Intake Gateway
//!
//! HTTP surface for the accident report form:
//! - `POST /api/submit-gutachten` runs the submission pipeline
//! - `GET /health` and `GET /ready` for probes
//!
//! Cross-cutting layers: tracing, CORS, request ids, body limit, request
//! timeout and a token bucket on the submit route.

pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod state;

pub use pipeline::{PipelineResult, StageOutcome, SubmissionPipeline};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // The form is served from a different origin than the API
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut submit = Router::new().route(
        "/api/submit-gutachten",
        post(handlers::submissions::submit_gutachten),
    );
    if config.rate_limit.enabled {
        let limiter = create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        submit = submit.route_layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(submit)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(config.request_timeout()))
                .layer(DefaultBodyLimit::max(config.server.body_limit_bytes)),
        )
        .with_state(state)
}
