//! I/O managers that acquire header text and raw element data

use crate::error::{DecodeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local file system
    FileSystem,
    /// HTTP(S) server
    Http,
}

impl StorageBackend {
    /// Parse storage backend from URL scheme
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(StorageBackend::FileSystem),
                "http" | "https" => Ok(StorageBackend::Http),
                _ => Err(DecodeError::InvalidUrl(format!("Unknown scheme: {}", scheme))),
            }
        } else {
            // Assume file system if no scheme
            Ok(StorageBackend::FileSystem)
        }
    }
}

/// Read-only access to the storage holding MetaIO headers and raw files
#[async_trait]
pub trait IOManager: Send + Sync {
    /// Read raw bytes from a path
    async fn fetch_bytes(&self, path: &str) -> Result<Bytes>;

    /// Read a UTF-8 text document from a path
    async fn fetch_text(&self, path: &str) -> Result<String> {
        let bytes = self.fetch_bytes(path).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    /// Get the backend type
    fn backend(&self) -> StorageBackend;
}

/// File system I/O manager
#[derive(Debug, Clone, Default)]
pub struct FileSystemIOManager {
    base_path: PathBuf,
}

impl FileSystemIOManager {
    /// Create a manager resolving relative paths against `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the full path for a relative path
    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[async_trait]
impl IOManager for FileSystemIOManager {
    async fn fetch_bytes(&self, path: &str) -> Result<Bytes> {
        let full_path = self.full_path(path);
        let data = fs::read(&full_path).await?;
        Ok(Bytes::from(data))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::FileSystem
    }
}

/// HTTP I/O manager; paths are absolute URLs
#[cfg(feature = "http-client")]
#[derive(Debug, Clone, Default)]
pub struct HttpIOManager {
    client: reqwest::Client,
}

#[cfg(feature = "http-client")]
impl HttpIOManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl IOManager for HttpIOManager {
    async fn fetch_bytes(&self, path: &str) -> Result<Bytes> {
        let response = self.client.get(path).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Http
    }
}

/// Parse URL and create the appropriate I/O manager
pub fn create_io_manager(url: &str) -> Result<Box<dyn IOManager>> {
    match StorageBackend::from_url(url)? {
        StorageBackend::FileSystem => Ok(Box::new(FileSystemIOManager::default())),
        #[cfg(feature = "http-client")]
        StorageBackend::Http => Ok(Box::new(HttpIOManager::new())),
        #[cfg(not(feature = "http-client"))]
        StorageBackend::Http => Err(DecodeError::Configuration(
            "HTTP backend requires the `http-client` feature".to_string(),
        )),
    }
}

/// Strip a `file://` scheme, leaving other locations untouched
pub fn local_path(url: &str) -> &str {
    url.strip_prefix("file://").unwrap_or(url)
}
