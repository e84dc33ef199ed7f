//! The file handed to the conversion endpoint.
//!
//! In a browser this is whatever was dropped on the drop zone or picked in
//! the file dialog. Here it is either bytes already in memory
//! ([`UploadFile::new`]) or a local path read in full
//! ([`UploadFile::from_path`]); uploads are never chunked.

use crate::error::BridgeError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

const OCTET_STREAM: &str = "application/octet-stream";

/// A file ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    file_name: String,
    bytes: Vec<u8>,
    mime: String,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime: OCTET_STREAM.to_string(),
        }
    }

    /// Override the part's content type (default `application/octet-stream`).
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    /// Read a local file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => BridgeError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => BridgeError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BridgeError::FileNotFound {
                path: path.to_path_buf(),
            })?
            .to_string();

        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}
