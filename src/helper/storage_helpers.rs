use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use actix_multipart::Multipart;
use actix_web::web::{self, BytesMut};
use chrono::Utc;
use futures_util::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid destination path: {0}")]
    InvalidPath(String),
    #[error("File is too large. Maximum size is {0}MB.")]
    TooLarge(u64),
    #[error("Unsupported file type: '{0}'.")]
    UnsupportedType(String),
    #[error("No file was uploaded.")]
    NoFile,
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Upload task failed: {0}")]
    Blocking(String),
}

/// File storage for uploaded documents: bytes in, public URL out.
pub trait ObjectStorage: Send + Sync {
    fn upload(&self, bytes: &[u8], destination: &str) -> Result<String, StorageError>;
}

/// Stores files under the media directory, which the server exposes at `/media`.
pub struct LocalMediaStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        LocalMediaStorage {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }
}

fn is_safe_relative(destination: &str) -> bool {
    let path = Path::new(destination);
    !destination.is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl ObjectStorage for LocalMediaStorage {
    fn upload(&self, bytes: &[u8], destination: &str) -> Result<String, StorageError> {
        if !is_safe_relative(destination) {
            return Err(StorageError::InvalidPath(destination.to_string()));
        }
        let final_path = self.root.join(destination);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&final_path, bytes)?;
        Ok(format!("{}/{}", self.public_prefix, destination))
    }
}

/// Maps an uploaded report's MIME type to the extension it is stored under.
pub fn report_extension_for(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("application/pdf", "pdf"),
        ("application/msword", "doc"),
        ("application/vnd.openxmlformats-officedocument.wordprocessingml.document", "docx"),
        ("application/vnd.ms-excel", "xls"),
        ("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", "xlsx"),
        ("application/vnd.ms-powerpoint", "ppt"),
        ("application/vnd.openxmlformats-officedocument.presentationml.presentation", "pptx"),
        ("application/zip", "zip"),
    ]
    .into_iter()
    .collect();
    map.get(mime_type).copied()
}

/// `reports/{millis}-{random}.{ext}`, unique enough that uploads never collide.
pub fn report_destination(extension: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("reports/{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}

/// A report file read from a multipart upload, not yet stored.
#[derive(Debug)]
pub struct ReportUpload {
    pub original_name: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Keeps only the final path component of a client-supplied file name.
pub fn display_file_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() {
        "report".to_string()
    } else {
        name.to_string()
    }
}

/// Reads the `file` field of a report upload, enforcing type and size limits.
pub async fn read_report_upload(mut payload: Multipart, max_bytes: u64) -> Result<ReportUpload, StorageError> {
    let mut upload: Option<ReportUpload> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| StorageError::Multipart(e.to_string()))?;
        if field.content_disposition().get_name() != Some("file") {
            // Drain fields we do not use.
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| StorageError::Multipart(e.to_string()))?;
            }
            continue;
        }

        let content_type = field.content_type().map(|m| m.essence_str().to_string()).unwrap_or_default();
        let extension = report_extension_for(&content_type)
            .ok_or_else(|| StorageError::UnsupportedType(content_type.clone()))?;
        let original_name = display_file_name(field.content_disposition().get_filename().unwrap_or(""));

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| StorageError::Multipart(e.to_string()))?;
            if (data.len() + chunk.len()) as u64 > max_bytes {
                return Err(StorageError::TooLarge(max_bytes / (1024 * 1024)));
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            return Err(StorageError::NoFile);
        }
        upload = Some(ReportUpload { original_name, extension, bytes: data.to_vec() });
    }

    upload.ok_or(StorageError::NoFile)
}

/// Stores an upload under `reports/` and returns `(file_url, file_name)`.
pub async fn store_report_upload(
    storage: std::sync::Arc<dyn ObjectStorage>,
    upload: ReportUpload,
) -> Result<(String, String), StorageError> {
    let destination = report_destination(upload.extension);
    let ReportUpload { original_name, bytes, .. } = upload;
    let url = web::block(move || storage.upload(&bytes, &destination))
        .await
        .map_err(|e| StorageError::Blocking(e.to_string()))??;
    Ok((url, original_name))
}
