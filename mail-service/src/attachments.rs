//! Attachment storage
//!
//! Uploaded files land in a single local directory under a generated name.
//! The caller's original file name is kept only as metadata; the stored
//! name is built from the arrival time, a random id and a sanitized copy of
//! the original, so two uploads never collide and no upload can escape the
//! directory.

use chrono::Utc;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// Name used when nothing usable is left after sanitizing
const FALLBACK_NAME: &str = "attachment";

/// Longest sanitized original name kept in a stored name
const MAX_NAME_LEN: usize = 128;

/// MIME type reported when the upload does not declare one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Upload and attachment lookup failures
#[derive(Error, Debug)]
pub enum UploadError {
    /// Request carried no file part
    #[error("No file uploaded")]
    NoFile,

    /// Request carried more than one file part
    #[error("Only one file may be uploaded per request")]
    TooManyFiles,

    /// Multipart body could not be read
    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    /// Stored name contains characters a generated name never has
    #[error("Invalid stored file name: {0}")]
    InvalidName(String),

    /// No stored file with that name
    #[error("Attachment not found: {0}")]
    NotFound(String),

    /// Filesystem failure
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// True when the caller sent a bad request rather than the server failing
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NoFile | Self::TooManyFiles | Self::Multipart(_) | Self::InvalidName(_)
        )
    }
}

/// File part received from a client
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Metadata for a stored upload
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadedFile {
    /// Generated name inside the upload directory
    #[serde(rename = "filename")]
    pub stored_name: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    #[serde(rename = "path")]
    pub storage_path: String,
}

/// Directory-backed attachment store
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    /// Open the store, creating the directory if it does not exist yet
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!("Attachment directory ready at {}", dir.display());
        Ok(Self { dir })
    }

    /// Upload directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one uploaded file and report its metadata
    pub async fn receive(&self, file: IncomingFile) -> Result<UploadedFile, UploadError> {
        let stored_name = stored_name_for(&file.original_name);
        let path = self.dir.join(&stored_name);

        // create_new: a generated name must never replace an existing file
        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        out.write_all(&file.data).await?;
        out.flush().await?;

        let uploaded = UploadedFile {
            stored_name,
            original_name: file.original_name,
            size_bytes: file.data.len() as u64,
            mime_type: file
                .content_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            storage_path: path.display().to_string(),
        };

        info!(
            filename = %uploaded.stored_name,
            size = uploaded.size_bytes,
            mimetype = %uploaded.mime_type,
            "Attachment stored"
        );

        Ok(uploaded)
    }

    /// Path of a previously stored file
    ///
    /// Only names that could have been generated by [`receive`](Self::receive)
    /// are accepted, so the result always lies inside the upload directory.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf, UploadError> {
        let well_formed = !stored_name.is_empty()
            && !stored_name.starts_with('.')
            && stored_name.chars().all(is_safe_char);

        if !well_formed {
            return Err(UploadError::InvalidName(stored_name.to_string()));
        }

        Ok(self.dir.join(stored_name))
    }

    /// Read a previously stored file
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>, UploadError> {
        let path = self.resolve(stored_name)?;
        debug!("Loading stored attachment {}", path.display());

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => UploadError::NotFound(stored_name.to_string()),
            _ => UploadError::Io(e),
        })
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Reduce a client-supplied file name to a safe single path component
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    // Keep the tail so the extension survives
    let skip = cleaned.len().saturating_sub(MAX_NAME_LEN);
    cleaned[skip..].to_string()
}

/// `<unix-millis>-<random id>-<sanitized original>`
fn stored_name_for(original_name: &str) -> String {
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        sanitize_filename(original_name)
    )
}
