//! Client entry points: load the catalog, drive sessions, save results.
//!
//! [`ConverterClient`] owns a backend and the capability catalog. It does
//! not own sessions: callers open one per conversion attempt with
//! [`ConverterClient::open_session`], hand it back to
//! [`ConverterClient::submit`] to run an upload, and drop it (or reset it)
//! when done. Everything a session decides goes through its reducer; the
//! client only performs the effects that need I/O.

use crate::backend::{ConversionBackend, ConvertedFile, HttpBackend};
use crate::catalog::{CapabilityCatalog, CapabilityMap};
use crate::config::ClientConfig;
use crate::disposition::derive_filename;
use crate::error::BridgeError;
use crate::format::FormatId;
use crate::session::{
    Checkpoint, ConversionSession, DownloadArtifact, Effect, SessionEvent,
};
use crate::upload::UploadFile;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summary of a one-shot [`ConverterClient::convert_file`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub source: FormatId,
    pub target: FormatId,
    pub filename: String,
    pub bytes: usize,
    pub duration_ms: u64,
}

/// Drives conversions against a [`ConversionBackend`].
pub struct ConverterClient<B = HttpBackend> {
    backend: B,
    config: ClientConfig,
    catalog: CapabilityCatalog,
}

impl ConverterClient<HttpBackend> {
    /// A client talking HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self, BridgeError> {
        let backend = HttpBackend::new(&config)?;
        Ok(Self::with_backend(backend, config))
    }
}

impl<B: ConversionBackend> ConverterClient<B> {
    pub fn with_backend(backend: B, config: ClientConfig) -> Self {
        Self {
            backend,
            config,
            catalog: CapabilityCatalog::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    /// Fetch the capability map. See [`CapabilityCatalog::load`].
    pub async fn load_catalog(&mut self) -> Result<&CapabilityMap, BridgeError> {
        self.catalog.load(&self.backend).await
    }

    /// Start a session for `source → target`, validated against the catalog.
    pub fn open_session(
        &self,
        source: &FormatId,
        target: &FormatId,
    ) -> Result<ConversionSession, BridgeError> {
        let selection = self.catalog.select(source, target)?;
        debug!("Opening session {}", selection);
        Ok(ConversionSession::new(selection))
    }

    /// Upload `upload` through `session` and wait for the outcome.
    ///
    /// On success the session is Succeeded and its artifact is returned.
    /// On failure the session is Failed (intake shown again, message set)
    /// and the error is returned as well; the session may be retried with
    /// another call. Refused events (no selection, upload already running)
    /// leave the session untouched and return [`BridgeError::Session`].
    pub async fn submit<'s>(
        &self,
        session: &'s mut ConversionSession,
        upload: &UploadFile,
    ) -> Result<&'s DownloadArtifact, BridgeError> {
        let effects = session.dispatch(SessionEvent::FileProvided {
            file_name: upload.file_name().to_string(),
        })?;
        let target = effects
            .iter()
            .find_map(|e| match e {
                Effect::BeginUpload { target, .. } => Some(target.clone()),
                _ => None,
            })
            .ok_or_else(|| BridgeError::Internal("session did not begin an upload".into()))?;
        for effect in &effects {
            if let Effect::ReleaseArtifact(id) = effect {
                debug!("Released {}", id);
            }
        }

        let cb = self.config.progress_callback.as_ref();
        if let (Some(cb), Some(selection)) = (cb, session.selection()) {
            cb.on_upload_start(upload.file_name(), selection);
            cb.on_checkpoint(Checkpoint::RequestStarted);
        }

        let started = Instant::now();
        let reached = Mutex::new(Vec::new());
        let sink = |checkpoint: Checkpoint| {
            if let Some(cb) = cb {
                cb.on_checkpoint(checkpoint);
            }
            if let Ok(mut reached) = reached.lock() {
                reached.push(checkpoint);
            }
        };
        let outcome = self.backend.convert(upload, &target, &sink).await;

        let reached = reached
            .into_inner()
            .map_err(|_| BridgeError::Internal("checkpoint log poisoned".into()))?;
        for checkpoint in reached {
            session.dispatch(SessionEvent::Checkpoint(checkpoint))?;
        }

        match outcome {
            Ok(ConvertedFile {
                bytes,
                content_disposition,
            }) => {
                let filename = derive_filename(
                    content_disposition.as_deref(),
                    Some(&target),
                    &self.config.fallback_stem,
                );
                let size = bytes.len();
                session.dispatch(SessionEvent::ResponseOk {
                    bytes,
                    filename: filename.clone(),
                })?;
                info!(
                    "Converted '{}' → '{}' ({} bytes) in {}ms",
                    upload.file_name(),
                    filename,
                    size,
                    started.elapsed().as_millis()
                );
                if let Some(cb) = cb {
                    cb.on_checkpoint(Checkpoint::Complete);
                    cb.on_upload_complete(&filename, size);
                }
                session
                    .artifact()
                    .ok_or_else(|| BridgeError::Internal("artifact missing after success".into()))
            }
            Err(e) => {
                let message = e.to_string();
                let event = match &e {
                    BridgeError::ConversionRequest { .. } => SessionEvent::ResponseRejected {
                        message: message.clone(),
                    },
                    _ => SessionEvent::TransportFailed {
                        message: message.clone(),
                    },
                };
                session.dispatch(event)?;
                warn!("Conversion of '{}' failed: {}", upload.file_name(), message);
                if let Some(cb) = cb {
                    cb.on_upload_error(&message);
                }
                Err(e)
            }
        }
    }

    /// Write the session's artifact to `dest`.
    ///
    /// `dest` may be a directory (the derived filename is used inside it) or
    /// a file path. A path ending in a separator always names a directory and
    /// is created if missing. The write is atomic: a `.part` file is written first and
    /// renamed into place. The session stays Succeeded.
    pub async fn save_artifact(
        &self,
        session: &mut ConversionSession,
        dest: impl AsRef<Path>,
    ) -> Result<PathBuf, BridgeError> {
        let effects = session.dispatch(SessionEvent::Download)?;
        let filename = effects
            .into_iter()
            .find_map(|e| match e {
                Effect::SaveArtifact { filename, .. } => Some(filename),
                _ => None,
            })
            .ok_or_else(|| BridgeError::Internal("download produced no save effect".into()))?;
        let artifact = session
            .artifact()
            .ok_or_else(|| BridgeError::Internal("artifact missing on download".into()))?;

        let dest = dest.as_ref();
        let path = if names_directory(dest) {
            tokio::fs::create_dir_all(dest)
                .await
                .map_err(|source| BridgeError::OutputWriteFailed {
                    path: dest.to_path_buf(),
                    source,
                })?;
            dest.join(&filename)
        } else if tokio::fs::metadata(dest)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            dest.join(&filename)
        } else {
            dest.to_path_buf()
        };
        write_atomic(&path, artifact.bytes()).await?;
        info!("Saved {} to {}", artifact.id(), path.display());
        Ok(path)
    }

    /// Convert one local file end to end.
    ///
    /// Loads the catalog if needed, infers the source format from the file
    /// extension, validates the pair, uploads, and saves the result to
    /// `dest` (directory or file path).
    pub async fn convert_file(
        &mut self,
        input: impl AsRef<Path>,
        target: &FormatId,
        dest: impl AsRef<Path>,
    ) -> Result<ConversionReport, BridgeError> {
        let started = Instant::now();
        let input = input.as_ref();
        if self.catalog.map().is_none() {
            self.load_catalog().await?;
        }

        let source = self.catalog.source_for_path(input)?;
        let mut session = self.open_session(&source, target)?;
        let upload = UploadFile::from_path(input).await?;

        let (filename, bytes) = {
            let artifact = self.submit(&mut session, &upload).await?;
            (artifact.filename().to_string(), artifact.len())
        };
        let output = self.save_artifact(&mut session, dest).await?;
        session.dispatch(SessionEvent::Reset)?;

        Ok(ConversionReport {
            input: input.to_path_buf(),
            output,
            source,
            target: target.clone(),
            filename,
            bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Synchronous wrapper around [`ConverterClient::convert_file`] over HTTP.
///
/// Creates a temporary tokio runtime internally.
pub fn convert_file_sync(
    config: ClientConfig,
    input: impl AsRef<Path>,
    target: &FormatId,
    dest: impl AsRef<Path>,
) -> Result<ConversionReport, BridgeError> {
    let mut client = ConverterClient::new(config)?;
    tokio::runtime::Runtime::new()
        .map_err(|e| BridgeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(client.convert_file(input, target, dest))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BridgeError> {
    let write_err = |source| BridgeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }
    Ok(())
}

/// `out/` (or `out\` on Windows) is a directory even before it exists.
fn names_directory(dest: &Path) -> bool {
    dest.as_os_str()
        .to_str()
        .and_then(|s| s.chars().last())
        .is_some_and(std::path::is_separator)
}
