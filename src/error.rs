//! Error types for the formatbridge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BridgeError`] — anything that stops an operation from completing:
//!   the capability map could not be fetched, the server rejected a
//!   conversion, the network dropped, a local file could not be read or
//!   written. Returned as `Err(BridgeError)` from the client entry points.
//!
//! * [`SessionError`] — an event the conversion session refused because it
//!   is not valid in the current state (a second upload while one is in
//!   flight, a download with nothing to download). The session is left
//!   untouched, so these are always recoverable.
//!
//! None of the conversion-flow failures are fatal: the caller may re-supply
//! a file and try again. Nothing is retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown when the server rejects a conversion without a usable `detail`.
pub const GENERIC_CONVERSION_FAILURE: &str = "Conversion failed";

/// All errors returned by the formatbridge client.
#[derive(Debug, Error)]
pub enum BridgeError {
    // ── Capability errors ─────────────────────────────────────────────────
    /// The capability endpoint could not be reached or answered non-2xx.
    #[error("Failed to load capabilities from '{url}': {reason}")]
    CapabilityLoad { url: String, reason: String },

    /// The capability endpoint answered, but the body is not a capability map.
    #[error("Malformed capability payload: {detail}")]
    CapabilityPayload { detail: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The conversion endpoint answered with a non-2xx status.
    ///
    /// `message` is the server's `detail` field, or
    /// [`GENERIC_CONVERSION_FAILURE`] when the body carried none.
    #[error("{message}")]
    ConversionRequest { status: u16, message: String },

    /// The request never produced a usable response (connection refused,
    /// body truncated, ...).
    #[error("{message}")]
    ConversionTransport { message: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file's extension is not a source the service converts from.
    #[error("No converter for '{source_format}' files")]
    UnsupportedSource { source_format: String },

    /// The source is known, but not convertible to the requested target.
    #[error("'{source_format}' cannot be converted to '{target}'. Supported targets: {supported}")]
    UnsupportedTarget {
        source_format: String,
        target: String,
        supported: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the downloaded artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Session errors ────────────────────────────────────────────────────
    /// The session refused an event.
    #[error(transparent)]
    Session(#[from] SessionError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the failure belongs to the conversion flow, i.e. the user
    /// gets the intake surface back with an inline message.
    pub fn is_conversion_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::ConversionRequest { .. } | BridgeError::ConversionTransport { .. }
        )
    }
}

/// An event the [`crate::session::ConversionSession`] refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A file arrived before both source and target were chosen.
    #[error("Choose a conversion before providing a file")]
    NoSelection,

    /// A file arrived (or a reset was asked for) while an upload is in flight.
    #[error("An upload is already in progress")]
    UploadInProgress,

    /// Download was invoked outside the succeeded state.
    #[error("There is no converted file to download")]
    NothingToDownload,

    /// A network outcome arrived while no upload was running.
    #[error("No upload is in progress")]
    NotUploading,
}
