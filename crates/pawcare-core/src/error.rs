//! Core error types for pawcare-core.
//!
//! Every component boundary returns one of these enums; nothing escapes as a
//! panic. The umbrella [`CoreError`] exists for callers (the CLI) that want a
//! single error type.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pawcare-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session-related errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Authenticated call errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Recurrence validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Secret or key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No valid or refreshable credential. The user has to sign in again.
    #[error("session expired, sign in again")]
    SessionExpired,
}

/// Errors reported by the transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The backend rejected the access token as invalid or expired.
    #[error("access token rejected by backend")]
    AuthRejected,

    /// The request never produced a response (connect, timeout, TLS...).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-auth failure status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad endpoint or operation name).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Errors surfaced by [`crate::dispatch::AuthenticatedCallDispatcher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No credential could be obtained; no call was made.
    #[error("session-expired")]
    SessionExpired,

    /// The transport failed, or the backend rejected the token again after
    /// the single retry.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Stable machine-readable reason, matching the backend's `reason` field.
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::SessionExpired => "session-expired",
            DispatchError::Transport(TransportError::AuthRejected) => "auth-rejected",
            DispatchError::Transport(TransportError::Network(_)) => "network",
            DispatchError::Transport(TransportError::Server { .. }) => "server",
            DispatchError::Transport(TransportError::Decode(_)) => "decode",
            DispatchError::Transport(TransportError::InvalidRequest(_)) => "invalid-request",
        }
    }
}

impl From<SessionError> for DispatchError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionExpired => DispatchError::SessionExpired,
        }
    }
}

/// Recurrence rule validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A weekly schedule selected no weekdays.
    #[error("weekdays-required")]
    WeekdaysRequired,

    /// Weekday index outside 0 (Monday) ..= 6 (Sunday).
    #[error("invalid weekday index {0}, expected 0..=6")]
    InvalidWeekday(u8),

    /// A descriptor string does not follow the recurrence grammar.
    #[error("invalid recurrence descriptor '{descriptor}': {message}")]
    InvalidDescriptor { descriptor: String, message: String },
}

impl ValidationError {
    /// Short code shown next to the offending form field.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::WeekdaysRequired => "weekdays-required",
            ValidationError::InvalidWeekday(_) => "invalid-weekday",
            ValidationError::InvalidDescriptor { .. } => "invalid-descriptor",
        }
    }
}

/// Secret store and key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// OS keyring failure
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Failed to read or write a stored value
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value is not valid JSON
    #[error("stored value for '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Key contains characters that cannot be used as a file name
    #[error("invalid store key: {0}")]
    InvalidKey(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home or data directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
