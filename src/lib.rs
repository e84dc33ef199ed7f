//! # formatbridge
//!
//! Client for a file-format conversion service.
//!
//! The service declares which source formats it can turn into which
//! targets, accepts a file upload for one such pair, and answers with the
//! converted file. This crate is everything on the client side of that
//! exchange: the capability catalog with search, a renderer-independent
//! state machine for one upload, and the HTTP plumbing between them.
//!
//! ## Flow
//!
//! ```text
//! GET capabilities ──▶ CapabilityCatalog ──search/render──▶ cards
//!                                                │ pick a target
//!                                                ▼
//!                      ConversionSession  Idle ──file──▶ Uploading
//!                                                          │
//!                      POST convert ◀──────────────────────┘
//!                            │
//!                            ├─ 2xx ──▶ Succeeded(artifact) ──▶ download
//!                            └─ else ─▶ Failed(message) ──▶ retry / reset
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formatbridge::{ClientConfig, ConverterClient, FormatId, UploadFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .build()?;
//!     let mut client = ConverterClient::new(config)?;
//!     client.load_catalog().await?;
//!
//!     let mut session = client.open_session(&FormatId::new(".json"), &FormatId::new(".md"))?;
//!     let upload = UploadFile::from_path("data.json").await?;
//!     let artifact = client.submit(&mut session, &upload).await?;
//!     eprintln!("got {} ({} bytes)", artifact.filename(), artifact.len());
//!     client.save_artifact(&mut session, ".").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formatbridge` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod catalog;
pub mod client;
pub mod config;
pub mod disposition;
pub mod error;
pub mod format;
pub mod progress;
pub mod session;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{rejection_message, ConversionBackend, ConvertedFile, HttpBackend};
pub use catalog::{CapabilityCatalog, CapabilityMap, CatalogEntry, CatalogView, TargetButton, ToolCard};
pub use client::{convert_file_sync, ConversionReport, ConverterClient};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use disposition::{derive_filename, filename_from_disposition};
pub use error::{BridgeError, SessionError};
pub use format::FormatId;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{
    ArtifactId, Checkpoint, ConversionSelection, ConversionSession, DownloadArtifact, Effect,
    SessionEvent, SessionState, SessionView,
};
pub use upload::UploadFile;
