//! File intake for uploaded study material
//!
//! Stores uploaded binaries and hands back a stable reference that the
//! workflow records on the request. Deletion is best-effort.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};

/// Opaque reference to stored file content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Storage for uploaded files
#[async_trait]
pub trait FileIntake: Send + Sync {
    /// Persist the upload and return its reference
    async fn store(&self, upload: Upload) -> Result<FileRef>;

    /// Remove a stored file; failures are logged, never returned
    async fn delete(&self, file_ref: &FileRef);
}

fn extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]{1,8}$").expect("static regex"))
}

/// Lowercase extension of a client-supplied file name, if it looks sane
pub fn sanitized_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    extension_pattern().is_match(&ext).then_some(ext)
}

/// Files on the local disk, served under a public URL prefix
pub struct LocalFileStore {
    root: PathBuf,
    public_prefix: String,
    max_size: usize,
    allowed_extensions: Vec<String>,
}

impl LocalFileStore {
    /// Create the store, making sure the upload directory exists
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .map_err(|e| AppError::Configuration {
                message: format!(
                    "Cannot create upload directory {}: {}",
                    config.upload_dir.display(),
                    e
                ),
            })?;

        Ok(Self {
            root: config.upload_dir.clone(),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
            max_size: config.max_file_size_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference back to its path under the upload directory
    fn resolve(&self, file_ref: &FileRef) -> Option<PathBuf> {
        let name = file_ref
            .as_str()
            .strip_prefix(&self.public_prefix)?
            .strip_prefix('/')?;

        // Only bare generated names are ours to touch
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[async_trait]
impl FileIntake for LocalFileStore {
    async fn store(&self, upload: Upload) -> Result<FileRef> {
        if upload.bytes.is_empty() {
            return Err(AppError::validation("file", "Uploaded file is empty"));
        }

        if upload.bytes.len() > self.max_size {
            return Err(AppError::PayloadTooLarge {
                size: upload.bytes.len(),
                limit: self.max_size,
            });
        }

        let ext = sanitized_extension(&upload.file_name)
            .filter(|ext| self.allowed_extensions.iter().any(|allowed| allowed == ext))
            .ok_or_else(|| {
                AppError::validation("file", format!("File type not allowed: {}", upload.file_name))
            })?;

        let file_name = format!(
            "{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        let path = self.root.join(&file_name);

        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| AppError::FileIntake {
                message: format!("Failed to write upload: {}", e),
            })?;

        debug!(path = %path.display(), size = upload.bytes.len(), "Upload stored");
        Ok(FileRef::new(format!("{}/{}", self.public_prefix, file_name)))
    }

    async fn delete(&self, file_ref: &FileRef) {
        let Some(path) = self.resolve(file_ref) else {
            warn!(file_ref = %file_ref.as_str(), "Refusing to delete unrecognised file reference");
            return;
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to release uploaded file");
        } else {
            debug!(path = %path.display(), "Released uploaded file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> LocalFileStore {
        let config = StorageConfig {
            upload_dir: std::env::temp_dir().join(format!("studyhub-test-{}", Uuid::new_v4())),
            max_file_size_bytes: 16,
            ..StorageConfig::default()
        };
        LocalFileStore::new(&config).await.unwrap()
    }

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload { file_name: name.to_string(), bytes: bytes.to_vec() }
    }

    #[test]
    fn test_sanitized_extension() {
        assert_eq!(sanitized_extension("unit1.PDF").as_deref(), Some("pdf"));
        assert_eq!(sanitized_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(sanitized_extension("noext"), None);
        assert_eq!(sanitized_extension("bad.p$f"), None);
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let store = temp_store().await;

        let file_ref = store.store(upload("notes.pdf", b"%PDF-1.4")).await.unwrap();
        assert!(file_ref.as_str().starts_with("/uploads/"));
        assert!(file_ref.as_str().ends_with(".pdf"));

        let path = store.resolve(&file_ref).unwrap();
        assert!(tokio::fs::metadata(&path).await.is_ok());

        store.delete(&file_ref).await;
        assert!(tokio::fs::metadata(&path).await.is_err());

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let store = temp_store().await;

        assert!(matches!(
            store.store(upload("empty.pdf", b"")).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            store.store(upload("big.pdf", &[0u8; 17])).await,
            Err(AppError::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            store.store(upload("run.exe", b"MZ")).await,
            Err(AppError::Validation { .. })
        ));

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_delete_ignores_foreign_refs() {
        let store = temp_store().await;
        assert!(store.resolve(&FileRef::new("/etc/passwd")).is_none());
        assert!(store.resolve(&FileRef::new("/uploads/../secret")).is_none());
        store.delete(&FileRef::new("/uploads/missing.pdf")).await;

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }
}
