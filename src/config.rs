//! Client configuration.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via
//! its [`ClientConfigBuilder`]. The binary maps its flags and
//! `FORMATBRIDGE_*` environment variables onto the builder; library users
//! set only what they care about and rely on the defaults for the rest.

use crate::disposition::DEFAULT_FALLBACK_STEM;
use crate::error::BridgeError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Configuration for a [`crate::client::ConverterClient`].
///
/// # Example
/// ```rust
/// use formatbridge::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://converter.internal:8000")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.convert_url(), "http://converter.internal:8000/api/v1/convert");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Scheme, host and port of the conversion service. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Path prefix of the versioned API. Default: `/api/v1`.
    pub api_prefix: String,

    /// Whole-request timeout in seconds. Default: none.
    ///
    /// Conversions of large files can take a long time; with no timeout a
    /// request runs until the server answers or the connection drops.
    pub request_timeout_secs: Option<u64>,

    /// Stem of the download name used when the server does not supply one.
    /// The target extension is appended. Default: `converted-file`.
    pub fallback_stem: String,

    /// Receives upload progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            request_timeout_secs: None,
            fallback_stem: DEFAULT_FALLBACK_STEM.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("fallback_stem", &self.fallback_stem)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// `GET` endpoint listing supported conversions.
    pub fn capabilities_url(&self) -> String {
        self.endpoint("capabilities")
    }

    /// `POST` endpoint performing a conversion.
    pub fn convert_url(&self) -> String {
        self.endpoint("convert")
    }

    fn endpoint(&self, name: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{base}/{name}")
        } else {
            format!("{base}/{prefix}/{name}")
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().to_string();
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn fallback_stem(mut self, stem: impl Into<String>) -> Self {
        self.config.fallback_stem = stem.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, BridgeError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(BridgeError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(BridgeError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.fallback_stem.trim().is_empty() || c.fallback_stem.contains(['/', '\\']) {
            return Err(BridgeError::InvalidConfig(format!(
                "fallback filename stem must be a plain name, got '{}'",
                c.fallback_stem
            )));
        }
        Ok(self.config)
    }
}
