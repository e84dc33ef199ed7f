//! Progress-callback trait for upload/conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to hear about
//! each upload as [`crate::client::ConverterClient::submit`] drives it.
//!
//! Progress is stage based, not byte based: the callback sees the fixed
//! [`Checkpoint`]s of the request in increasing order.
//!
//! # Example
//!
//! ```rust
//! use formatbridge::{Checkpoint, ClientConfig, ConversionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_checkpoint(&self, checkpoint: Checkpoint) {
//!         eprintln!("{}%", checkpoint.percent());
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::session::{Checkpoint, ConversionSelection};
use std::sync::Arc;

/// Called by the client as it drives an upload.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the session has accepted the file, before any I/O.
    fn on_upload_start(&self, file_name: &str, selection: &ConversionSelection) {
        let _ = (file_name, selection);
    }

    /// Called each time the upload passes a checkpoint.
    fn on_checkpoint(&self, checkpoint: Checkpoint) {
        let _ = checkpoint;
    }

    /// Called when the converted file has arrived.
    ///
    /// # Arguments
    /// * `filename` — the derived download filename
    /// * `bytes`    — size of the converted file
    fn on_upload_complete(&self, filename: &str, bytes: usize) {
        let _ = (filename, bytes);
    }

    /// Called when the upload failed; `message` is what the user is shown.
    fn on_upload_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        checkpoints: Mutex<Vec<Checkpoint>>,
        errors: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_checkpoint(&self, checkpoint: Checkpoint) {
            self.checkpoints.lock().unwrap().push(checkpoint);
        }

        fn on_upload_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let selection = ConversionSelection::new(".pdf".into(), ".png".into());
        cb.on_upload_start("a.pdf", &selection);
        cb.on_checkpoint(Checkpoint::BodyBuilt);
        cb.on_upload_complete("a.png", 42);
        cb.on_upload_error("boom");
    }

    #[test]
    fn arc_dyn_callback_records_events() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();
        cb.on_checkpoint(Checkpoint::RequestStarted);
        cb.on_checkpoint(Checkpoint::Complete);
        cb.on_upload_error("unsupported file");

        assert_eq!(
            *recorder.checkpoints.lock().unwrap(),
            vec![Checkpoint::RequestStarted, Checkpoint::Complete]
        );
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    }
}
