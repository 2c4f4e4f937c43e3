use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::gateway::FileGateway;
use crate::handlers;

/// Upload and file-serving routes, ready to merge into a larger router.
///
/// The upload route carries its own body limit so that files up to the
/// configured maximum reach validation instead of being cut off by axum's
/// default limit.
pub fn file_routes<S>(gateway: FileGateway) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let body_limit = gateway.config().upload_body_limit();

    Router::new()
        .route(
            "/api/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/file/{*path}", get(handlers::get_file))
        .with_state(gateway)
}
