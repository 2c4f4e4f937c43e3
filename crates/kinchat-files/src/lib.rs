//! Image gateway for kinchat.
//!
//! Validates and stores uploaded and generated images under a public
//! directory, and serves them back by logical path. The routes can be merged
//! into any axum router via [`file_routes`].

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod routes;

pub use config::GatewayConfig;
pub use error::FileGatewayError;
pub use gateway::{
    Attachment, AttachmentKind, FILE_URL_PREFIX, FileBytes, FileGateway, FileRoot, ImageType,
    OpenedFile, StoredFile, logical_path_from_url,
};
pub use routes::file_routes;
