mod envelope;
mod handlers;
mod state;

pub use envelope::Envelope;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use blocks_store::Store;

/// Builds the conductor's router: status/introspection GETs plus the
/// worker-facing `/ping`, `/job-request`, `/job-submit`, `/job-reject`
/// POSTs. Every handler returns HTTP 200 with a `{success, ...}`
/// envelope; transport-level failures are the only thing that surface a
/// non-200 status.
pub fn router<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/conductor-status", get(handlers::conductor_status::<S>))
        .route("/known-blocks", get(handlers::known_blocks::<S>))
        .route("/status", get(handlers::status::<S>))
        .route("/ping", post(handlers::ping::<S>))
        .route("/job-request", post(handlers::job_request::<S>))
        .route("/job-submit", post(handlers::job_submit::<S>))
        .route("/job-reject", post(handlers::job_reject::<S>))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
