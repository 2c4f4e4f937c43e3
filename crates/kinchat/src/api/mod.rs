//! HTTP API module.
//!
//! Chat relay, image generation and analysis endpoints, plus the file gateway
//! routes for uploads and stored images.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
