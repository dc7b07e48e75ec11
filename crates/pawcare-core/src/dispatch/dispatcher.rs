//! Authenticated backend calls.
//!
//! Every call gets a valid access token from the [`SessionTokenManager`]. A
//! token the backend rejects triggers exactly one forced refresh and one
//! retry. Successful responses that carry an XP delta update the cached
//! profile and may raise a level-up event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::listener::{LevelUpListener, NoopLevelUpListener};
use super::transport::Transport;
use crate::error::{CoreError, DispatchError, TransportError};
use crate::progression::{ExperienceState, LevelCurve, LevelProgress, XpApplication};
use crate::session::{Credential, RefreshedToken, SessionTokenManager};
use crate::storage::{KeyValueStore, UserProfile};

pub const REFRESH_OPERATION: &str = "createAccessToken";
pub const LOGIN_OPERATION: &str = "loginUserAttempt";
pub const LOGOUT_OPERATION: &str = "logoutUserAttempt";

/// Response field holding the XP earned by a call.
pub const XP_GAINED_FIELD: &str = "xpGained";

// Upper bound for a backend-reported `expiresIn`.
const MAX_EXPIRES_IN_SECS: i64 = 10 * 365 * 24 * 3600;

/// Decoded outcome of a backend call.
///
/// `success: false` is the backend's own refusal (bad input, missing
/// entity...) and is not an error at this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub success: bool,
    pub message: Option<String>,
    pub xp_gained: Option<i64>,
    /// Set when `xp_gained` was applied to the user's experience.
    pub xp: Option<XpApplication>,
    pub body: Value,
}

impl CallResponse {
    pub fn from_body(body: Value) -> Self {
        let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let xp_gained = body
            .get(XP_GAINED_FIELD)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)));
        Self {
            success,
            message,
            xp_gained,
            xp: None,
            body,
        }
    }
}

/// Token-bearing part of a login or refresh reply.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenReply {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    /// Seconds until expiry, used when `expiresAt` is absent.
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenReply {
    fn decode(body: &Value) -> Result<Self, TransportError> {
        Self::deserialize(body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_at.or_else(|| {
            self.expires_in
                .map(|secs| now + Duration::seconds(secs.clamp(0, MAX_EXPIRES_IN_SECS)))
        })
    }
}

/// Wraps a [`Transport`] with session handling and XP bookkeeping.
pub struct AuthenticatedCallDispatcher {
    session: Arc<SessionTokenManager>,
    transport: Arc<dyn Transport>,
    profile_store: Arc<dyn KeyValueStore>,
    level_up: Arc<dyn LevelUpListener>,
    curve: LevelCurve,
    experience: Mutex<ExperienceState>,
}

impl AuthenticatedCallDispatcher {
    /// Starting XP is read from the cached profile, if any.
    pub fn new(
        session: Arc<SessionTokenManager>,
        transport: Arc<dyn Transport>,
        profile_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let cached_xp = match UserProfile::load(profile_store.as_ref()) {
            Ok(profile) => profile.map_or(0, |p| p.xp),
            Err(e) => {
                tracing::warn!(error = %e, "cached profile unreadable, starting from 0 XP");
                0
            }
        };
        Self {
            session,
            transport,
            profile_store,
            level_up: Arc::new(NoopLevelUpListener),
            curve: LevelCurve::default(),
            experience: Mutex::new(ExperienceState::new(cached_xp)),
        }
    }

    pub fn with_level_up_listener(mut self, listener: Arc<dyn LevelUpListener>) -> Self {
        self.level_up = listener;
        self
    }

    pub fn with_curve(mut self, curve: LevelCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn session(&self) -> &Arc<SessionTokenManager> {
        &self.session
    }

    pub fn experience(&self) -> ExperienceState {
        *self.lock_experience()
    }

    pub fn progress(&self) -> LevelProgress {
        self.experience().progress(&self.curve)
    }

    fn lock_experience(&self) -> MutexGuard<'_, ExperienceState> {
        self.experience
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Invoke `operation` with `payload` plus the current access token.
    ///
    /// `payload` should be a JSON object; `null` sends an empty object and
    /// any other value is sent under a `data` key.
    pub async fn dispatch(
        &self,
        operation: &str,
        payload: Value,
    ) -> Result<CallResponse, DispatchError> {
        let credential = self
            .session
            .get_valid_access_token(|rt| self.request_refresh(rt))
            .await?;

        let body = match self.send(operation, &payload, &credential.access_token).await {
            Err(TransportError::AuthRejected) => {
                tracing::debug!(operation, "access token rejected, refreshing before retry");
                let renewed = self
                    .session
                    .force_refresh(&credential.access_token, |rt| self.request_refresh(rt))
                    .await?;
                self.send(operation, &payload, &renewed.access_token).await?
            }
            result => result?,
        };

        let mut response = CallResponse::from_body(body);
        if response.success {
            if let Some(delta) = response.xp_gained {
                response.xp = self.award_xp(delta);
            }
        }
        Ok(response)
    }

    /// Sign in with email and password.
    ///
    /// A refusal from the backend comes back as `success: false`. On success
    /// the credential is installed and the profile cached.
    pub async fn login(&self, email: &str, password: &str) -> Result<CallResponse, CoreError> {
        let body = self
            .transport
            .call(
                LOGIN_OPERATION,
                json!({ "email": email, "password": password }),
            )
            .await
            .map_err(DispatchError::from)?;
        let response = CallResponse::from_body(body);
        if !response.success {
            tracing::info!(message = ?response.message, "login refused");
            return Ok(response);
        }

        let reply = TokenReply::decode(&response.body).map_err(DispatchError::from)?;
        let refresh_token = reply.refresh_token.clone().ok_or_else(|| {
            DispatchError::from(TransportError::Decode(
                "login reply carries no refreshToken".into(),
            ))
        })?;
        let now = Utc::now();
        let expiry = reply
            .expiry(now)
            .unwrap_or_else(|| now + self.session.default_ttl());
        self.session
            .install(Credential::new(reply.access_token, expiry, refresh_token))?;

        let profile = self.profile_from_login(email, &response.body);
        *self.lock_experience() = ExperienceState::new(profile.xp);
        if let Err(e) = profile.save(self.profile_store.as_ref()) {
            tracing::warn!(error = %e, "could not cache user profile");
        }
        tracing::info!("signed in");
        Ok(response)
    }

    fn profile_from_login(&self, email: &str, body: &Value) -> UserProfile {
        let previous = UserProfile::load(self.profile_store.as_ref())
            .ok()
            .flatten()
            .filter(|p| p.email == email);
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        UserProfile {
            id: text("id").unwrap_or_default(),
            email: email.to_string(),
            name: text("name").unwrap_or_default(),
            xp: body
                .get("xp")
                .and_then(Value::as_u64)
                .or_else(|| previous.as_ref().map(|p| p.xp))
                .unwrap_or(0),
            extra: Map::new(),
        }
    }

    /// Tell the backend the session is over, then forget it locally.
    ///
    /// The backend call is best effort; local state is cleared regardless.
    pub async fn logout(&self) -> Result<(), CoreError> {
        if self.session.is_authenticated() {
            match self.dispatch(LOGOUT_OPERATION, json!({})).await {
                Ok(response) if !response.success => {
                    tracing::warn!(message = ?response.message, "backend refused logout");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(reason = e.reason(), error = %e, "backend logout failed"),
            }
        }

        self.session.logout()?;
        UserProfile::clear(self.profile_store.as_ref())?;
        *self.lock_experience() = ExperienceState::default();
        tracing::info!("signed out");
        Ok(())
    }

    /// Resume the stored session, as at app start.
    pub async fn restore(&self) -> Result<(), DispatchError> {
        self.session
            .restore(|rt| self.request_refresh(rt))
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        operation: &str,
        payload: &Value,
        access_token: &str,
    ) -> Result<Value, TransportError> {
        self.transport
            .call(operation, with_access_token(payload, access_token))
            .await
    }

    async fn request_refresh(&self, refresh_token: String) -> Result<RefreshedToken, TransportError> {
        let body = self
            .transport
            .call(REFRESH_OPERATION, json!({ "refreshToken": refresh_token }))
            .await?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(TransportError::AuthRejected);
        }
        let reply = TokenReply::decode(&body)?;
        let expires_at = reply.expiry(Utc::now());
        Ok(RefreshedToken {
            access_token: reply.access_token,
            expires_at,
            refresh_token: reply.refresh_token,
        })
    }

    fn award_xp(&self, delta: i64) -> Option<XpApplication> {
        let applied = {
            let mut experience = self.lock_experience();
            let Some(applied) = experience.apply(&self.curve, delta) else {
                tracing::debug!(delta, "ignoring negative XP delta");
                return None;
            };
            // Stored under the lock so concurrent awards land in order.
            if let Err(e) = UserProfile::store_xp(self.profile_store.as_ref(), applied.new_xp) {
                tracing::warn!(error = %e, "could not persist XP");
            }
            applied
        };

        if let Some(level_up) = applied.level_up() {
            tracing::info!(
                old_level = level_up.old_level,
                new_level = level_up.new_level,
                "level up"
            );
            self.level_up.on_level_up(level_up);
        }
        Some(applied)
    }
}

fn with_access_token(payload: &Value, access_token: &str) -> Value {
    let mut map = match payload {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other.clone());
            map
        }
    };
    map.insert(
        "accessToken".to_string(),
        Value::String(access_token.to_string()),
    );
    Value::Object(map)
}
