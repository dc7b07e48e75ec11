//! Transport port and its HTTP adapter.
//!
//! The backend exposes named callable operations. Every operation takes a
//! JSON object and answers with a JSON object; the transport only moves
//! bytes and classifies failures. Token handling lives in the dispatcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::TransportError;
use crate::storage::BackendConfig;

/// Error code the backend puts in a `{ success: false }` body when the
/// access token it was given is expired or unknown.
pub const INVALID_TOKEN_CODE: &str = "invalid-token";

/// Something that can invoke a named backend operation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke `operation` with `payload` and return the response body.
    ///
    /// Implementations must report a rejected access token as
    /// [`TransportError::AuthRejected`]; every other failure maps to one of
    /// the remaining variants.
    async fn call(&self, operation: &str, payload: Value) -> Result<Value, TransportError>;
}

/// POSTs JSON to `{base_url}/{operation}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidRequest(format!("bad base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "base url '{base_url}' cannot carry a path"
            )));
        }
        // Url::join replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, operation: &str) -> Result<Url, TransportError> {
        let valid = !operation.is_empty()
            && operation
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TransportError::InvalidRequest(format!(
                "invalid operation name '{operation}'"
            )));
        }
        self.base_url
            .join(operation)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, operation: &str, payload: Value) -> Result<Value, TransportError> {
        let url = self.endpoint(operation)?;
        tracing::debug!(operation, "calling backend");

        let resp = self.http_client.post(url).json(&payload).send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::debug!(operation, status = status.as_u16(), "backend rejected token");
            return Err(TransportError::AuthRejected);
        }

        let text = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or(text);
            return Err(TransportError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?
        };
        classify_body(unwrap_envelope(body))
    }
}

/// Callable endpoints wrap their answer as `{"result": ...}` or
/// `{"data": ...}`. A body with any other shape is returned as-is.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.len() == 1 => {
            if let Some(inner) = map.remove("result").or_else(|| map.remove("data")) {
                inner
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

/// Turn a `{ success: false, code: "invalid-token" }` body into
/// [`TransportError::AuthRejected`]. Other bodies pass through.
pub fn classify_body(body: Value) -> Result<Value, TransportError> {
    let rejected = body.get("success").and_then(Value::as_bool) == Some(false)
        && body.get("code").and_then(Value::as_str) == Some(INVALID_TOKEN_CODE);
    if rejected {
        return Err(TransportError::AuthRejected);
    }
    Ok(body)
}

fn error_message(body: &Value) -> Option<String> {
    let candidate = body
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .or_else(|| body.get("message"))?;
    candidate.as_str().map(str::to_string)
}
