use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access token, its expiry, and the refresh token that renews it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token: String,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        access_token_expiry: DateTime<Utc>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            access_token_expiry,
            refresh_token: refresh_token.into(),
        }
    }

    /// Only the refresh token is known, as after an app restart. Always due
    /// for refresh.
    pub(crate) fn refresh_only(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            access_token_expiry: DateTime::<Utc>::MIN_UTC,
            refresh_token: refresh_token.into(),
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.access_token_expiry.signed_duration_since(now)
    }

    /// True when the remaining validity is at or below `threshold`.
    pub fn needs_refresh(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= threshold
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// What a refresh call hands back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub access_token: String,
    /// Absent when the backend does not report one; the configured
    /// lifetime is used instead.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// A rotated refresh token, if the backend issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RefreshedToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
            refresh_token: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn rotating(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("rotates_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}
