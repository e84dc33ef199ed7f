//! The conversion service as seen from the client: two endpoints.
//!
//! [`ConversionBackend`] is the seam between the state machine and the
//! network. [`HttpBackend`] talks to a real server with `reqwest`; tests
//! substitute in-memory fakes.
//!
//! ```text
//! GET  {base}/api/v1/capabilities  → {".pdf": [".docx", ...]} | {"conversions": {...}}
//! POST {base}/api/v1/convert       multipart: file, target_format
//!                                  → 200 bytes + content-disposition
//!                                  → 4xx/5xx {"detail": "..."}
//! ```

use crate::config::ClientConfig;
use crate::error::{BridgeError, GENERIC_CONVERSION_FAILURE};
use crate::format::FormatId;
use crate::session::Checkpoint;
use crate::upload::UploadFile;
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A successful conversion response, before the filename is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub bytes: Vec<u8>,
    /// Raw `content-disposition` header value, if the server sent one.
    pub content_disposition: Option<String>,
}

/// Receives upload checkpoints as the request progresses.
pub type CheckpointSink<'a> = &'a (dyn Fn(Checkpoint) + Send + Sync);

/// The two operations the conversion service offers.
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Raw body of the capability endpoint.
    ///
    /// Transport failures and non-2xx answers are
    /// [`BridgeError::CapabilityLoad`].
    async fn fetch_capabilities(&self) -> Result<Vec<u8>, BridgeError>;

    /// Upload `upload` for conversion to `target`.
    ///
    /// Non-2xx answers are [`BridgeError::ConversionRequest`]; everything
    /// that prevents a usable answer is [`BridgeError::ConversionTransport`].
    /// Implementations report [`Checkpoint::BodyBuilt`] and
    /// [`Checkpoint::ResponseReceived`] through `checkpoint` as they pass them.
    async fn convert(
        &self,
        upload: &UploadFile,
        target: &FormatId,
        checkpoint: CheckpointSink<'_>,
    ) -> Result<ConvertedFile, BridgeError>;
}

/// User-visible message for a rejected conversion.
///
/// Reads `detail` from a JSON error body. FastAPI validation failures put a
/// list of `{"msg": ...}` objects there; the first message is used. Anything
/// else yields [`GENERIC_CONVERSION_FAILURE`].
pub fn rejection_message(body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    let message = match detail {
        Some(Value::String(s)) => Some(s),
        Some(Value::Array(items)) => items.iter().find_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            other => other.get("msg").and_then(Value::as_str).map(str::to_string),
        }),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| GENERIC_CONVERSION_FAILURE.to_string())
}

// ── HTTP implementation ──────────────────────────────────────────────────

/// [`ConversionBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    capabilities_url: String,
    convert_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, BridgeError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("formatbridge/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| BridgeError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            capabilities_url: config.capabilities_url(),
            convert_url: config.convert_url(),
        })
    }

    pub fn capabilities_url(&self) -> &str {
        &self.capabilities_url
    }

    pub fn convert_url(&self) -> &str {
        &self.convert_url
    }
}

#[async_trait]
impl ConversionBackend for HttpBackend {
    async fn fetch_capabilities(&self) -> Result<Vec<u8>, BridgeError> {
        let url = &self.capabilities_url;
        debug!("GET {}", url);

        let load_err = |reason: String| BridgeError::CapabilityLoad {
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| load_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(load_err(format!("HTTP {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| load_err(e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn convert(
        &self,
        upload: &UploadFile,
        target: &FormatId,
        checkpoint: CheckpointSink<'_>,
    ) -> Result<ConvertedFile, BridgeError> {
        let transport = |e: reqwest::Error| BridgeError::ConversionTransport {
            message: e.to_string(),
        };

        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.file_name().to_string())
            .mime_str(upload.mime())
            .map_err(transport)?;
        let form = Form::new()
            .part("file", part)
            // Sent exactly as the capability map spelled it.
            .text("target_format", target.as_str().to_string());
        checkpoint(Checkpoint::BodyBuilt);

        info!(
            "POST {} ({} bytes, target {})",
            self.convert_url,
            upload.len(),
            target
        );
        let response = self
            .client
            .post(&self.convert_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        checkpoint(Checkpoint::ResponseReceived);

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = rejection_message(&body);
            warn!("Conversion rejected with HTTP {}: {}", status, message);
            return Err(BridgeError::ConversionRequest {
                status: status.as_u16(),
                message,
            });
        }

        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(transport)?;
        debug!("Received {} bytes", bytes.len());

        Ok(ConvertedFile {
            bytes: bytes.to_vec(),
            content_disposition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_used() {
        assert_eq!(
            rejection_message(br#"{"detail": "unsupported file"}"#),
            "unsupported file"
        );
    }

    #[test]
    fn validation_array_uses_first_msg() {
        let body = br#"{"detail": [{"loc": ["body", "file"], "msg": "field required", "type": "missing"}]}"#;
        assert_eq!(rejection_message(body), "field required");
    }

    #[test]
    fn missing_or_unparsable_detail_is_generic() {
        for body in [
            &b""[..],
            b"<html>502 Bad Gateway</html>",
            br#"{"error": "x"}"#,
            br#"{"detail": null}"#,
            br#"{"detail": "   "}"#,
            br#"{"detail": []}"#,
        ] {
            assert_eq!(rejection_message(body), GENERIC_CONVERSION_FAILURE);
        }
    }

    #[test]
    fn non_string_detail_is_stringified() {
        assert_eq!(rejection_message(br#"{"detail": {"code": 7}}"#), r#"{"code":7}"#);
    }

    #[test]
    fn urls_come_from_config() {
        let config = ClientConfig::builder()
            .base_url("http://converter.local:9000/")
            .build()
            .unwrap();
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(
            backend.capabilities_url(),
            "http://converter.local:9000/api/v1/capabilities"
        );
        assert_eq!(backend.convert_url(), "http://converter.local:9000/api/v1/convert");
    }
}
