//! Owner of the session credential.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use super::credential::{Credential, RefreshedToken};
use super::single_flight::SingleFlight;
use crate::error::{SessionError, StoreError};
use crate::storage::{SecretStore, REFRESH_TOKEN_KEY};

pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 60;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 900;

#[derive(Debug, Default)]
struct SessionState {
    credential: Option<Credential>,
    /// Bumped on every install and logout so a refresh started for an
    /// earlier session cannot overwrite a later one.
    epoch: u64,
}

/// Why a refresh is being attempted.
#[derive(Clone)]
enum Trigger {
    /// The token is close to expiry.
    Proactive,
    /// The backend rejected this access token.
    Rejected(String),
}

impl Trigger {
    fn label(&self) -> &'static str {
        match self {
            Trigger::Proactive => "near-expiry",
            Trigger::Rejected(_) => "rejected",
        }
    }
}

/// Keeps the session credential valid.
///
/// Callers never read the credential fields directly; they ask for a valid
/// access token and the manager refreshes when needed. However many callers
/// ask at once, at most one refresh call is ever in flight.
pub struct SessionTokenManager {
    state: Mutex<SessionState>,
    refresh: SingleFlight<Result<Credential, SessionError>>,
    secrets: Arc<dyn SecretStore>,
    threshold: Duration,
    default_ttl: Duration,
}

impl std::fmt::Debug for SessionTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenManager")
            .field("authenticated", &self.is_authenticated())
            .field("refresh", &self.refresh)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl SessionTokenManager {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            refresh: SingleFlight::new(),
            secrets,
            threshold: Duration::seconds(DEFAULT_REFRESH_THRESHOLD_SECS),
            default_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Lifetime given to refreshed tokens that come without an expiry.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().credential.is_some()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock()
            .credential
            .as_ref()
            .map(|c| c.access_token_expiry)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_in_flight()
    }

    /// Start a session with a credential obtained at login.
    pub fn install(&self, credential: Credential) -> Result<(), StoreError> {
        self.secrets.set(REFRESH_TOKEN_KEY, &credential.refresh_token)?;
        let mut state = self.lock();
        state.epoch += 1;
        state.credential = Some(credential);
        tracing::debug!("session credential installed");
        Ok(())
    }

    /// Drop the credential and forget the stored refresh token.
    pub fn logout(&self) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.credential = None;
        }
        tracing::debug!("session cleared");
        self.secrets.delete(REFRESH_TOKEN_KEY)
    }

    /// Resume a session from the stored refresh token, as at app start.
    pub async fn restore<F, Fut, E>(&self, refresh_fn: F) -> Result<Credential, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshedToken, E>>,
        E: Display,
    {
        let stored = match self.secrets.get(REFRESH_TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return Err(SessionError::SessionExpired),
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored refresh token");
                return Err(SessionError::SessionExpired);
            }
        };

        {
            let mut state = self.lock();
            if state.credential.is_none() {
                state.epoch += 1;
                state.credential = Some(Credential::refresh_only(stored));
            }
        }
        self.get_valid_access_token(refresh_fn).await
    }

    /// Return a credential that is valid for longer than the threshold,
    /// refreshing it first if needed.
    ///
    /// Never suspends when the current token is still fresh. Concurrent
    /// callers that find it stale all share the result of one refresh.
    pub async fn get_valid_access_token<F, Fut, E>(
        &self,
        refresh_fn: F,
    ) -> Result<Credential, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshedToken, E>>,
        E: Display,
    {
        {
            let state = self.lock();
            match state.credential.as_ref() {
                None => return Err(SessionError::SessionExpired),
                Some(c) if !c.needs_refresh(self.threshold, Utc::now()) => return Ok(c.clone()),
                Some(_) => {}
            }
        }
        self.coalesced_refresh(Trigger::Proactive, refresh_fn).await
    }

    /// Refresh regardless of remaining validity, because the backend rejected
    /// `rejected_access_token`. If another caller already replaced that token
    /// the replacement is returned without a new refresh.
    pub async fn force_refresh<F, Fut, E>(
        &self,
        rejected_access_token: &str,
        refresh_fn: F,
    ) -> Result<Credential, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshedToken, E>>,
        E: Display,
    {
        self.coalesced_refresh(Trigger::Rejected(rejected_access_token.to_string()), refresh_fn)
            .await
    }

    async fn coalesced_refresh<F, Fut, E>(
        &self,
        trigger: Trigger,
        refresh_fn: F,
    ) -> Result<Credential, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshedToken, E>>,
        E: Display,
    {
        self.refresh
            .run(|| self.refresh_now(trigger, refresh_fn))
            .await
            .unwrap_or(Err(SessionError::SessionExpired))
    }

    /// Body of a refresh flight. Only the flight leader runs this.
    async fn refresh_now<F, Fut, E>(
        &self,
        trigger: Trigger,
        refresh_fn: F,
    ) -> Result<Credential, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshedToken, E>>,
        E: Display,
    {
        let (current, epoch) = {
            let state = self.lock();
            let current = state
                .credential
                .clone()
                .ok_or(SessionError::SessionExpired)?;

            // The previous flight may have finished between our freshness
            // check and starting this one.
            let already_replaced = match &trigger {
                Trigger::Proactive => !current.needs_refresh(self.threshold, Utc::now()),
                Trigger::Rejected(token) => current.access_token != *token,
            };
            if already_replaced {
                return Ok(current);
            }
            (current, state.epoch)
        };

        tracing::debug!(reason = trigger.label(), "refreshing access token");
        let outcome = refresh_fn(current.refresh_token.clone()).await;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("session changed during refresh, discarding result");
            return state
                .credential
                .clone()
                .ok_or(SessionError::SessionExpired);
        }

        let refreshed = match outcome {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::warn!(error = %e, "access token refresh failed, session expired");
                state.credential = None;
                return Err(SessionError::SessionExpired);
            }
        };

        let expiry = refreshed
            .expires_at
            .unwrap_or_else(|| Utc::now() + self.default_ttl);
        if expiry <= current.access_token_expiry {
            tracing::warn!(
                %expiry,
                previous = %current.access_token_expiry,
                "refresh returned a token that does not outlive the previous one"
            );
            state.credential = None;
            return Err(SessionError::SessionExpired);
        }

        let refresh_token = match refreshed.refresh_token {
            Some(rotated) => {
                if let Err(e) = self.secrets.set(REFRESH_TOKEN_KEY, &rotated) {
                    tracing::warn!(error = %e, "could not persist rotated refresh token");
                }
                rotated
            }
            None => current.refresh_token,
        };

        let credential = Credential {
            access_token: refreshed.access_token,
            access_token_expiry: expiry,
            refresh_token,
        };
        state.credential = Some(credential.clone());
        tracing::debug!(expires_at = %expiry, "access token refreshed");
        Ok(credential)
    }
}
