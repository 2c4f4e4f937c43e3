//! Image storage under the public directory.
//!
//! Files live in two roots, `uploads/` for user uploads and `generated/` for
//! model output, each partitioned by year and zero-padded month. Names are
//! random UUID tokens with an extension derived from the MIME type, so stored
//! files are never overwritten.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::FileGatewayError;

/// URL prefix under which stored files are served.
pub const FILE_URL_PREFIX: &str = "/api/file/";

/// Cache policy for served files. Stored names are never reused.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Top-level directory a stored file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRoot {
    Uploads,
    Generated,
}

impl FileRoot {
    const ALL: [FileRoot; 2] = [FileRoot::Uploads, FileRoot::Generated];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileRoot::Uploads => "uploads",
            FileRoot::Generated => "generated",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|root| root.as_str() == segment)
    }
}

/// Image formats the gateway knows how to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageType {
    /// Parse a MIME type, ignoring case and parameters.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(ImageType::Png),
            "image/jpeg" | "image/jpg" => Some(ImageType::Jpeg),
            "image/gif" => Some(ImageType::Gif),
            "image/webp" => Some(ImageType::Webp),
            _ => None,
        }
    }

    /// Match a canonical MIME type exactly. No aliases, case folding or parameters.
    pub fn from_canonical(mime: &str) -> Option<Self> {
        [ImageType::Png, ImageType::Jpeg, ImageType::Gif, ImageType::Webp]
            .into_iter()
            .find(|t| t.mime_type() == mime)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpeg => "image/jpeg",
            ImageType::Gif => "image/gif",
            ImageType::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Png => "png",
            ImageType::Jpeg => "jpg",
            ImageType::Gif => "gif",
            ImageType::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
}

/// A stored user upload, as referenced from chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Sanitized original file name
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size: u64,
    /// Unix milliseconds
    pub uploaded_at: i64,
}

/// A file written by the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    #[serde(skip)]
    pub root: FileRoot,
    /// Path relative to the public directory, e.g. `uploads/2025/01/<uuid>.png`
    pub path: String,
    pub url: String,
    pub mime_type: String,
    pub size: u64,
}

impl StoredFile {
    pub fn file_name(&self) -> String {
        self.path.rsplit('/').next().unwrap_or(&self.path).to_string()
    }
}

/// A resolved file ready to be streamed.
#[derive(Debug, Clone)]
pub struct OpenedFile {
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
}

/// File contents with their content type.
#[derive(Debug, Clone)]
pub struct FileBytes {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Gateway over the public directory.
#[derive(Debug, Clone)]
pub struct FileGateway {
    public_dir: PathBuf,
    config: Arc<GatewayConfig>,
}

impl FileGateway {
    /// Create a gateway with the default configuration.
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(public_dir, GatewayConfig::default())
    }

    pub fn with_config(public_dir: impl Into<PathBuf>, config: GatewayConfig) -> Self {
        Self {
            public_dir: public_dir.into(),
            config: Arc::new(config),
        }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Check an upload against the type allow-list and the size limit.
    ///
    /// The declared type must appear verbatim on the allow-list.
    pub fn validate_upload(&self, mime: &str, size: u64) -> Result<ImageType, FileGatewayError> {
        let image_type = Some(mime)
            .filter(|m| self.config.is_allowed_mime(m))
            .and_then(ImageType::from_canonical)
            .ok_or_else(|| FileGatewayError::UnsupportedType(mime.to_string()))?;

        if size > self.config.max_upload_size {
            return Err(FileGatewayError::FileTooLarge {
                size,
                limit: self.config.max_upload_size,
            });
        }

        if size == 0 {
            return Err(FileGatewayError::EmptyFile);
        }

        Ok(image_type)
    }

    /// Validate and store a user upload. Nothing is written when validation fails.
    pub async fn store_upload(
        &self,
        original_name: Option<&str>,
        mime: &str,
        data: &[u8],
    ) -> Result<Attachment, FileGatewayError> {
        let image_type = self.validate_upload(mime, data.len() as u64)?;
        let stored = self.write_new(FileRoot::Uploads, image_type, data).await?;

        let filename = original_name
            .and_then(sanitize_filename)
            .unwrap_or_else(|| stored.file_name());

        Ok(Attachment {
            id: stored.id,
            kind: AttachmentKind::Image,
            filename,
            url: stored.url,
            mime_type: stored.mime_type,
            size: stored.size,
            uploaded_at: Utc::now().timestamp_millis(),
        })
    }

    /// Store model output under `generated/`. No size limit applies.
    pub async fn store_generated(
        &self,
        mime: &str,
        data: &[u8],
    ) -> Result<StoredFile, FileGatewayError> {
        let image_type = ImageType::from_mime(mime)
            .ok_or_else(|| FileGatewayError::UnsupportedType(mime.to_string()))?;
        if data.is_empty() {
            return Err(FileGatewayError::EmptyFile);
        }
        self.write_new(FileRoot::Generated, image_type, data).await
    }

    async fn write_new(
        &self,
        root: FileRoot,
        image_type: ImageType,
        data: &[u8],
    ) -> Result<StoredFile, FileGatewayError> {
        let id = Uuid::new_v4().to_string();
        let file_name = format!("{}.{}", id, image_type.extension());
        let relative_dir = partition_dir(root, &Local::now());

        let dir = self.public_dir.join(&relative_dir);
        fs::create_dir_all(&dir).await?;

        let full_path = dir.join(&file_name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await?;

        if let Err(err) = file.write_all(data).await {
            drop(file);
            let _ = fs::remove_file(&full_path).await;
            return Err(err.into());
        }
        file.flush().await?;

        let path = format!("{}/{}", relative_dir, file_name);
        info!(path = %path, size = data.len(), "Stored image");

        Ok(StoredFile {
            id,
            root,
            url: format!("{FILE_URL_PREFIX}{path}"),
            path,
            mime_type: image_type.mime_type().to_string(),
            size: data.len() as u64,
        })
    }

    /// Resolve a logical path such as `uploads/2025/01/<uuid>.png`.
    pub async fn open(&self, logical_path: &str) -> Result<OpenedFile, FileGatewayError> {
        let (root, rest) = split_logical_path(logical_path)?;
        let root_dir = self.public_dir.join(root.as_str());
        let path = resolve_and_verify_path(&root_dir, rest)?;

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileGatewayError::NotFound(logical_path.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        if !metadata.is_file() {
            return Err(FileGatewayError::NotFound(logical_path.to_string()));
        }

        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        debug!("Resolved {} to {}", logical_path, path.display());

        Ok(OpenedFile {
            path,
            content_type,
            size: metadata.len(),
        })
    }

    /// Read a stored file fully into memory.
    pub async fn read(&self, logical_path: &str) -> Result<FileBytes, FileGatewayError> {
        let opened = self.open(logical_path).await?;
        let data = match fs::read(&opened.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileGatewayError::NotFound(logical_path.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(FileBytes {
            data,
            content_type: opened.content_type,
        })
    }

    /// Read a stored file by the URL the gateway handed out.
    pub async fn read_url(&self, url: &str) -> Result<FileBytes, FileGatewayError> {
        self.read(logical_path_from_url(url)).await
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// `<root>/<year>/<zero-padded month>`
pub fn partition_dir(root: FileRoot, date: &impl Datelike) -> String {
    format!("{}/{}/{:02}", root.as_str(), date.year(), date.month())
}

/// Strip the serving prefix from a gateway URL, leaving the logical path.
pub fn logical_path_from_url(url: &str) -> &str {
    url.strip_prefix(FILE_URL_PREFIX)
        .unwrap_or(url)
        .trim_start_matches('/')
}

/// Reject traversal syntax and paths outside the gateway roots.
fn split_logical_path(path: &str) -> Result<(FileRoot, &str), FileGatewayError> {
    if path.contains("..") || path.contains('~') {
        warn!("Rejected path with traversal syntax: {:?}", path);
        return Err(FileGatewayError::InvalidPath(path.to_string()));
    }

    let trimmed = path.trim_start_matches('/');
    let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    match FileRoot::from_segment(first) {
        Some(root) => Ok((root, rest)),
        None => {
            warn!("Rejected path outside gateway roots: {:?}", path);
            Err(FileGatewayError::Forbidden)
        }
    }
}

/// Sanitize a filename by removing dangerous characters and path components.
/// Returns None if the filename is invalid or empty after sanitization.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    // Leading/trailing dots and spaces
    let sanitized = sanitized.trim_matches(|c| c == '.' || c == ' ');

    if sanitized.is_empty() {
        return None;
    }

    let upper = sanitized.to_uppercase();
    let reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if reserved
        .iter()
        .any(|r| upper == *r || upper.starts_with(&format!("{}.", r)))
    {
        return None;
    }

    if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        return Some(sanitized[..end].to_string());
    }

    Some(sanitized.to_string())
}

/// Build a path under `root` component by component.
///
/// Parent references, absolute components and NUL bytes are rejected outright
/// instead of being normalized away.
fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, FileGatewayError> {
    let relative = relative.trim_start_matches('/');

    if relative.is_empty() || relative == "." {
        return Ok(root.to_path_buf());
    }

    let mut result = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    warn!("Path component contains null byte: {:?}", name);
                    return Err(FileGatewayError::InvalidPath(relative.to_string()));
                }
                result.push(name);
            }
            Component::CurDir => continue,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                warn!("Rejected path component {:?} in {:?}", component, relative);
                return Err(FileGatewayError::InvalidPath(relative.to_string()));
            }
        }
    }

    if !result.starts_with(root) {
        return Err(FileGatewayError::Forbidden);
    }

    Ok(result)
}

/// Resolve a path and, if it exists, make sure symlinks do not lead out of `root`.
fn resolve_and_verify_path(root: &Path, relative: &str) -> Result<PathBuf, FileGatewayError> {
    let built_path = resolve_path(root, relative)?;

    if !built_path.exists() {
        return Ok(built_path);
    }

    let canonical_root = root.canonicalize()?;
    let canonical_path = built_path.canonicalize()?;

    if !canonical_path.starts_with(&canonical_root) {
        warn!(
            "Symlink escape attempt: {:?} resolved to {:?} which is outside {:?}",
            built_path, canonical_path, canonical_root
        );
        return Err(FileGatewayError::Forbidden);
    }

    Ok(canonical_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

    fn count_files(dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                if path.is_dir() { count_files(&path) } else { 1 }
            })
            .sum()
    }

    // ========================================================================
    // Filename Sanitization Tests
    // ========================================================================

    #[test]
    fn test_sanitize_filename_normal() {
        assert_eq!(sanitize_filename("cat.png"), Some("cat.png".to_string()));
        assert_eq!(
            sanitize_filename("holiday photo 1.jpg"),
            Some("holiday photo 1.jpg".to_string())
        );
    }

    #[test]
    fn test_sanitize_filename_removes_path_separators() {
        let r = sanitize_filename("../etc/passwd").unwrap();
        assert!(!r.contains('/'));
        assert_eq!(sanitize_filename("foo/bar/baz.png"), Some("foo_bar_baz.png".to_string()));
        let r = sanitize_filename("..\\..\\windows\\system32").unwrap();
        assert!(!r.contains('\\'));
    }

    #[test]
    fn test_sanitize_filename_removes_control_chars() {
        assert_eq!(sanitize_filename("te\0st\x01.png"), Some("test.png".to_string()));
    }

    #[test]
    fn test_sanitize_filename_rejects_empty_and_reserved() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename("   "), None);
        assert_eq!(sanitize_filename("CON"), None);
        assert_eq!(sanitize_filename("lpt1.png"), None);
    }

    #[test]
    fn test_sanitize_filename_length_limit_respects_char_boundaries() {
        let long_name = "é".repeat(200);
        let result = sanitize_filename(&long_name).unwrap();
        assert!(result.len() <= 255);
        assert!(result.chars().all(|c| c == 'é'));
    }

    // ========================================================================
    // Path Tests
    // ========================================================================

    #[test]
    fn test_partition_dir_zero_pads_month() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(partition_dir(FileRoot::Uploads, &date), "uploads/2025/03");
        let date = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(partition_dir(FileRoot::Generated, &date), "generated/2024/12");
    }

    #[test]
    fn test_logical_path_from_url() {
        assert_eq!(
            logical_path_from_url("/api/file/uploads/2025/01/a.png"),
            "uploads/2025/01/a.png"
        );
        assert_eq!(logical_path_from_url("/uploads/2025/01/a.png"), "uploads/2025/01/a.png");
        assert_eq!(logical_path_from_url("uploads/a.png"), "uploads/a.png");
    }

    #[test]
    fn test_split_logical_path_rejects_traversal_syntax() {
        for path in [
            "uploads/../secret.txt",
            "../etc/passwd",
            "~/.ssh/id_rsa",
            "uploads/~root/file.png",
            "..",
        ] {
            assert!(
                matches!(split_logical_path(path), Err(FileGatewayError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_split_logical_path_forbids_other_roots() {
        assert!(matches!(split_logical_path("secrets/key.pem"), Err(FileGatewayError::Forbidden)));
        assert!(matches!(split_logical_path("uploadsX/a.png"), Err(FileGatewayError::Forbidden)));
        assert!(matches!(split_logical_path(""), Err(FileGatewayError::Forbidden)));
        let (root, rest) = split_logical_path("/generated/2025/01/a.png").unwrap();
        assert_eq!(root, FileRoot::Generated);
        assert_eq!(rest, "2025/01/a.png");
    }

    #[test]
    fn test_resolve_path_rejects_parent_and_null() {
        let root = PathBuf::from("/tmp/kinchat-root");
        assert!(matches!(resolve_path(&root, "a/../../b"), Err(FileGatewayError::InvalidPath(_))));
        assert!(matches!(resolve_path(&root, "a\0.png"), Err(FileGatewayError::InvalidPath(_))));
        assert_eq!(resolve_path(&root, "/2025/01/a.png").unwrap(), root.join("2025/01/a.png"));
    }

    #[test]
    fn test_image_type_from_mime() {
        assert_eq!(ImageType::from_mime("image/png"), Some(ImageType::Png));
        assert_eq!(ImageType::from_mime("IMAGE/JPEG; charset=binary"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_mime("image/svg+xml"), None);
        assert_eq!(ImageType::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_image_type_from_canonical_is_exact() {
        assert_eq!(ImageType::from_canonical("image/jpeg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_canonical("image/jpg"), None);
        assert_eq!(ImageType::from_canonical("IMAGE/PNG"), None);
        assert_eq!(ImageType::from_canonical("image/png; x=y"), None);
    }

    #[test]
    fn test_validate_upload_requires_exact_allowed_type() {
        let gateway = FileGateway::new("/tmp/kinchat-unused");
        for mime in ["image/jpg", "IMAGE/PNG", "image/png; x=y", " image/png"] {
            assert!(
                matches!(
                    gateway.validate_upload(mime, 4),
                    Err(FileGatewayError::UnsupportedType(ref m)) if m == mime
                ),
                "{mime}"
            );
        }
        assert_eq!(gateway.validate_upload("image/png", 4).unwrap(), ImageType::Png);
    }

    #[test]
    fn test_allowed_type_without_known_format_is_unsupported() {
        let config = GatewayConfig {
            allowed_mime_types: vec!["image/bmp".to_string()],
            ..GatewayConfig::default()
        };
        let gateway = FileGateway::with_config("/tmp/kinchat-unused", config);
        assert!(matches!(
            gateway.validate_upload("image/bmp", 4),
            Err(FileGatewayError::UnsupportedType(_))
        ));
        assert!(matches!(
            gateway.validate_upload("image/png", 4),
            Err(FileGatewayError::UnsupportedType(_))
        ));
    }

    // ========================================================================
    // Storage Tests (require temp directory)
    // ========================================================================

    #[tokio::test]
    async fn test_upload_reads_back_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let attachment = gateway
            .store_upload(Some("kitten.png"), "image/png", PNG_BYTES)
            .await
            .unwrap();

        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.filename, "kitten.png");
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.size, PNG_BYTES.len() as u64);
        assert!(attachment.url.starts_with("/api/file/uploads/"));
        assert!(attachment.url.ends_with(&format!("{}.png", attachment.id)));

        let read = gateway.read_url(&attachment.url).await.unwrap();
        assert_eq!(read.data, PNG_BYTES);
        assert_eq!(read.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_upload_partitions_by_year_and_month() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let attachment = gateway
            .store_upload(Some("a.gif"), "image/gif", b"GIF89a")
            .await
            .unwrap();

        let expected = format!("/api/file/{}/", partition_dir(FileRoot::Uploads, &Local::now()));
        assert!(attachment.url.starts_with(&expected));
    }

    #[tokio::test]
    async fn test_uploads_get_distinct_names() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let a = gateway.store_upload(Some("same.png"), "image/png", PNG_BYTES).await.unwrap();
        let b = gateway.store_upload(Some("same.png"), "image/png", PNG_BYTES).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.url, b.url);
        assert_eq!(count_files(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_oversized_upload_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig {
            max_upload_size: 8,
            ..GatewayConfig::default()
        };
        let gateway = FileGateway::with_config(dir.path(), config);

        let result = gateway.store_upload(Some("big.png"), "image/png", &[0u8; 9]).await;

        assert!(matches!(result, Err(FileGatewayError::FileTooLarge { size: 9, limit: 8 })));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_disallowed_type_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let result = gateway
            .store_upload(Some("notes.txt"), "text/plain", b"hello")
            .await;

        assert!(matches!(result, Err(FileGatewayError::UnsupportedType(_))));
        assert_eq!(count_files(dir.path()), 0);

        let result = gateway
            .store_upload(Some("photo.jpg"), "image/jpg", b"\xff\xd8\xff")
            .await;

        assert!(matches!(result, Err(FileGatewayError::UnsupportedType(_))));
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unusable_original_name_falls_back_to_stored_name() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let attachment = gateway
            .store_upload(Some("..."), "image/webp", b"RIFF....WEBP")
            .await
            .unwrap();

        assert_eq!(attachment.filename, format!("{}.webp", attachment.id));
    }

    #[tokio::test]
    async fn test_generated_images_are_readable() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let stored = gateway.store_generated("image/jpeg", b"\xff\xd8\xff").await.unwrap();

        assert_eq!(stored.root, FileRoot::Generated);
        assert!(stored.path.starts_with("generated/"));
        assert!(stored.path.ends_with(".jpg"));
        let read = gateway.read(&stored.path).await.unwrap();
        assert_eq!(read.data, b"\xff\xd8\xff");
        assert_eq!(read.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let gateway = FileGateway::new(dir.path());

        let result = gateway.read("uploads/2025/01/missing.png").await;
        assert!(matches!(result, Err(FileGatewayError::NotFound(_))));

        std::fs::create_dir_all(dir.path().join("uploads/2025")).unwrap();
        let result = gateway.read("uploads/2025").await;
        assert!(matches!(result, Err(FileGatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_never_returns_files_outside_roots() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();
        let gateway = FileGateway::new(dir.path());

        assert!(matches!(gateway.read("secret.txt").await, Err(FileGatewayError::Forbidden)));
        assert!(matches!(
            gateway.read("uploads/../secret.txt").await,
            Err(FileGatewayError::InvalidPath(_))
        ));
        assert!(matches!(
            gateway.read("~/secret.txt").await,
            Err(FileGatewayError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_detects_symlink_escape() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.png"), "secret").unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        symlink(outside.path(), dir.path().join("uploads/escape")).unwrap();

        let gateway = FileGateway::new(dir.path());
        let result = gateway.read("uploads/escape/secret.png").await;
        assert!(matches!(result, Err(FileGatewayError::Forbidden)));
    }
}
