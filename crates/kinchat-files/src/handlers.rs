//! HTTP handlers for uploads and file reads.

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

use crate::error::FileGatewayError;
use crate::gateway::{Attachment, FileGateway, IMMUTABLE_CACHE_CONTROL};

/// Multipart field that carries the file.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub attachment: Attachment,
}

/// POST /api/upload - Store an uploaded image
#[instrument(skip(gateway, multipart))]
pub async fn upload_file(
    State(gateway): State<FileGateway>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, FileGatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to read multipart field: {}", e);
        FileGatewayError::Multipart(e.body_text())
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let mime = field
            .content_type()
            .map(str::to_string)
            .or_else(|| {
                filename
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|m| m.essence_str().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field.bytes().await.map_err(|e| {
            warn!("Failed to read upload body: {}", e);
            FileGatewayError::Multipart(e.body_text())
        })?;

        let attachment = gateway
            .store_upload(filename.as_deref(), &mime, &data)
            .await?;

        info!(
            id = %attachment.id,
            size = attachment.size,
            mime = %attachment.mime_type,
            "Upload stored"
        );

        return Ok(Json(UploadResponse {
            success: true,
            attachment,
        }));
    }

    Err(FileGatewayError::MissingFile)
}

/// GET /api/file/{*path} - Serve a stored file
#[instrument(skip(gateway))]
pub async fn get_file(
    State(gateway): State<FileGateway>,
    Path(path): Path<String>,
) -> Result<Response, FileGatewayError> {
    let opened = gateway.open(&path).await?;

    let file = match tokio::fs::File::open(&opened.path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileGatewayError::NotFound(path));
        }
        Err(err) => return Err(err.into()),
    };

    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, opened.content_type),
            (header::CONTENT_LENGTH, opened.size.to_string()),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL.to_string()),
        ],
        body,
    )
        .into_response())
}
