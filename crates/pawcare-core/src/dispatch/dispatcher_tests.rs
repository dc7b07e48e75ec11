//! Tests for the authenticated call dispatcher, against scripted transports.

#[cfg(test)]
mod tests {
    use super::super::dispatcher::*;
    use super::super::listener::ChannelLevelUpListener;
    use super::super::transport::Transport;
    use crate::error::{DispatchError, TransportError};
    use crate::progression::LevelUp;
    use crate::session::{Credential, SessionTokenManager};
    use crate::storage::{
        KeyValueStore, MemoryKeyValueStore, MemorySecretStore, SecretStore, UserProfile,
        REFRESH_TOKEN_KEY, USER_PROFILE_KEY,
    };

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replies are queued per operation and handed out in order.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<HashMap<String, VecDeque<Result<Value, TransportError>>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn reply(&self, operation: &str, reply: Result<Value, TransportError>) -> &Self {
            self.replies
                .lock()
                .unwrap()
                .entry(operation.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        fn operations(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
        }

        fn payloads(&self, operation: &str) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(op, _)| op == operation)
                .map(|(_, payload)| payload.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn call(&self, operation: &str, payload: Value) -> Result<Value, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), payload));
            self.replies
                .lock()
                .unwrap()
                .get_mut(operation)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    Err(TransportError::Server {
                        status: 404,
                        message: format!("no scripted reply for {operation}"),
                    })
                })
        }
    }

    struct Fixture {
        transport: Arc<ScriptedTransport>,
        secrets: Arc<MemorySecretStore>,
        profiles: Arc<MemoryKeyValueStore>,
        dispatcher: AuthenticatedCallDispatcher,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(ScriptedTransport::default());
        let secrets = Arc::new(MemorySecretStore::new());
        let profiles = Arc::new(MemoryKeyValueStore::new());
        let session = Arc::new(SessionTokenManager::new(secrets.clone()));
        let dispatcher =
            AuthenticatedCallDispatcher::new(session, transport.clone(), profiles.clone());
        Fixture {
            transport,
            secrets,
            profiles,
            dispatcher,
        }
    }

    fn signed_in(f: &Fixture, access: &str, valid_for: Duration) {
        f.dispatcher
            .session()
            .install(Credential::new(access, Utc::now() + valid_for, "r1"))
            .unwrap();
    }

    fn refreshed(access: &str, refresh: &str) -> Result<Value, TransportError> {
        Ok(json!({"success": true, "accessToken": access, "refreshToken": refresh}))
    }

    #[tokio::test]
    async fn fresh_token_is_attached_to_payload() {
        let f = fixture();
        signed_in(&f, "a1", Duration::minutes(10));
        f.transport.reply("getPets", Ok(json!({"success": true, "pets": []})));

        let response = f
            .dispatcher
            .dispatch("getPets", json!({"owner": "u1"}))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.body["pets"], json!([]));
        assert_eq!(f.transport.operations(), vec!["getPets"]);
        assert_eq!(
            f.transport.payloads("getPets")[0],
            json!({"owner": "u1", "accessToken": "a1"})
        );
    }

    #[tokio::test]
    async fn no_session_makes_no_call() {
        let f = fixture();
        let err = f.dispatcher.dispatch("getPets", json!({})).await.unwrap_err();
        assert_eq!(err, DispatchError::SessionExpired);
        assert!(f.transport.operations().is_empty());
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_before_the_call() {
        let f = fixture();
        signed_in(&f, "a1", Duration::seconds(10));
        f.transport
            .reply(REFRESH_OPERATION, refreshed("a2", "r2"))
            .reply("getPets", Ok(json!({"success": true})));

        f.dispatcher.dispatch("getPets", json!({})).await.unwrap();

        assert_eq!(f.transport.operations(), vec![REFRESH_OPERATION, "getPets"]);
        assert_eq!(
            f.transport.payloads(REFRESH_OPERATION)[0],
            json!({"refreshToken": "r1"})
        );
        assert_eq!(f.transport.payloads("getPets")[0]["accessToken"], "a2");
        assert_eq!(
            f.secrets.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("r2")
        );
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_retried_once() {
        crate::logging::init_test();
        let f = fixture();
        signed_in(&f, "a1", Duration::minutes(10));
        f.transport
            .reply("addPet", Err(TransportError::AuthRejected))
            .reply(REFRESH_OPERATION, refreshed("a2", "r2"))
            .reply("addPet", Ok(json!({"success": true, "id": "p9"})));

        let response = f
            .dispatcher
            .dispatch("addPet", json!({"name": "Toby"}))
            .await
            .unwrap();

        assert_eq!(response.body["id"], "p9");
        assert_eq!(
            f.transport.operations(),
            vec!["addPet", REFRESH_OPERATION, "addPet"]
        );
        let sent = f.transport.payloads("addPet");
        assert_eq!(sent[0]["accessToken"], "a1");
        assert_eq!(sent[1], json!({"name": "Toby", "accessToken": "a2"}));
    }

    #[tokio::test]
    async fn second_rejection_is_surfaced() {
        let f = fixture();
        signed_in(&f, "a1", Duration::minutes(10));
        f.transport
            .reply("addPet", Err(TransportError::AuthRejected))
            .reply(REFRESH_OPERATION, refreshed("a2", "r2"))
            .reply("addPet", Err(TransportError::AuthRejected));

        let err = f.dispatcher.dispatch("addPet", json!({})).await.unwrap_err();

        assert_eq!(err, DispatchError::Transport(TransportError::AuthRejected));
        assert_eq!(err.reason(), "auth-rejected");
        assert_eq!(f.transport.payloads(REFRESH_OPERATION).len(), 1);
        assert_eq!(f.transport.payloads("addPet").len(), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        for failure in [
            TransportError::Network("connection reset".into()),
            TransportError::Server {
                status: 500,
                message: "internal".into(),
            },
        ] {
            let f = fixture();
            signed_in(&f, "a1", Duration::minutes(10));
            f.transport.reply("getPets", Err(failure.clone()));

            let err = f.dispatcher.dispatch("getPets", json!({})).await.unwrap_err();

            assert_eq!(err, DispatchError::Transport(failure));
            assert_eq!(f.transport.operations(), vec!["getPets"]);
        }
    }

    #[tokio::test]
    async fn refused_refresh_expires_the_session() {
        let f = fixture();
        signed_in(&f, "a1", Duration::minutes(10));
        f.transport
            .reply("getPets", Err(TransportError::AuthRejected))
            .reply(
                REFRESH_OPERATION,
                Ok(json!({"success": false, "message": "refresh token revoked"})),
            );

        let err = f.dispatcher.dispatch("getPets", json!({})).await.unwrap_err();

        assert_eq!(err, DispatchError::SessionExpired);
        assert!(!f.dispatcher.session().is_authenticated());
        assert_eq!(f.transport.payloads("getPets").len(), 1);
    }

    #[tokio::test]
    async fn xp_is_applied_persisted_and_announced() {
        let f = fixture();
        f.profiles
            .set(USER_PROFILE_KEY, &json!({"name": "Ana", "xp": 15}))
            .unwrap();
        let (listener, mut level_ups) = ChannelLevelUpListener::new();
        let session = f.dispatcher.session().clone();
        let dispatcher =
            AuthenticatedCallDispatcher::new(session, f.transport.clone(), f.profiles.clone())
                .with_level_up_listener(Arc::new(listener));
        assert_eq!(dispatcher.experience().cumulative_xp, 15);

        signed_in(&f, "a1", Duration::minutes(10));
        f.transport
            .reply("completeReminder", Ok(json!({"success": true, "xpGained": 10})));

        let response = dispatcher
            .dispatch("completeReminder", json!({"reminderId": "r7"}))
            .await
            .unwrap();

        let applied = response.xp.unwrap();
        assert_eq!(applied.new_xp, 25);
        assert!(applied.did_level_up);
        assert_eq!(dispatcher.experience().cumulative_xp, 25);
        assert_eq!(dispatcher.progress().level, 1);

        let stored = UserProfile::load(f.profiles.as_ref()).unwrap().unwrap();
        assert_eq!(stored.xp, 25);
        assert_eq!(stored.name, "Ana");

        assert_eq!(
            level_ups.try_recv().unwrap(),
            LevelUp {
                old_level: 0,
                new_level: 1
            }
        );
    }

    #[tokio::test]
    async fn xp_without_level_crossing_is_silent() {
        let f = fixture();
        let (listener, mut level_ups) = ChannelLevelUpListener::new();
        let session = f.dispatcher.session().clone();
        let dispatcher =
            AuthenticatedCallDispatcher::new(session, f.transport.clone(), f.profiles.clone())
                .with_level_up_listener(Arc::new(listener));
        signed_in(&f, "a1", Duration::minutes(10));
        f.transport
            .reply("completeReminder", Ok(json!({"success": true, "xpGained": 5})));

        let response = dispatcher
            .dispatch("completeReminder", json!({}))
            .await
            .unwrap();

        assert_eq!(response.xp.map(|a| a.did_level_up), Some(false));
        assert!(level_ups.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_or_negative_xp_responses_change_nothing() {
        let f = fixture();
        signed_in(&f, "a1", Duration::minutes(10));
        f.transport
            .reply(
                "completeReminder",
                Ok(json!({"success": false, "message": "already done", "xpGained": 50})),
            )
            .reply("completeReminder", Ok(json!({"success": true, "xpGained": -5})));

        let refused = f
            .dispatcher
            .dispatch("completeReminder", json!({}))
            .await
            .unwrap();
        assert!(!refused.success);
        assert_eq!(refused.message.as_deref(), Some("already done"));
        assert_eq!(refused.xp, None);

        let negative = f
            .dispatcher
            .dispatch("completeReminder", json!({}))
            .await
            .unwrap();
        assert_eq!(negative.xp, None);

        assert_eq!(f.dispatcher.experience().cumulative_xp, 0);
        assert_eq!(f.profiles.get(USER_PROFILE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn login_installs_credential_and_caches_profile() {
        let f = fixture();
        f.transport.reply(
            LOGIN_OPERATION,
            Ok(json!({
                "success": true,
                "name": "Ana",
                "accessToken": "a1",
                "refreshToken": "r1",
                "xp": 44
            })),
        );

        let response = f.dispatcher.login("ana@example.com", "pw").await.unwrap();

        assert!(response.success);
        assert!(f.dispatcher.session().is_authenticated());
        assert_eq!(
            f.secrets.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("r1")
        );
        let profile = UserProfile::load(f.profiles.as_ref()).unwrap().unwrap();
        assert_eq!(profile.email, "ana@example.com");
        assert_eq!(profile.name, "Ana");
        assert_eq!(f.dispatcher.progress().level, 2);
        assert_eq!(
            f.transport.payloads(LOGIN_OPERATION)[0],
            json!({"email": "ana@example.com", "password": "pw"})
        );

        let expiry = f.dispatcher.session().expires_at().unwrap();
        let ttl = expiry - Utc::now();
        assert!(ttl > Duration::minutes(14) && ttl <= Duration::minutes(15));
    }

    #[tokio::test]
    async fn refused_login_leaves_no_session() {
        let f = fixture();
        f.transport.reply(
            LOGIN_OPERATION,
            Ok(json!({"success": false, "message": "wrong password"})),
        );

        let response = f.dispatcher.login("ana@example.com", "bad").await.unwrap();

        assert!(!response.success);
        assert!(!f.dispatcher.session().is_authenticated());
        assert_eq!(f.secrets.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_if_backend_fails() {
        let f = fixture();
        signed_in(&f, "a1", Duration::minutes(10));
        f.profiles
            .set(USER_PROFILE_KEY, &json!({"name": "Ana", "xp": 30}))
            .unwrap();
        f.transport.reply(
            LOGOUT_OPERATION,
            Err(TransportError::Network("offline".into())),
        );

        f.dispatcher.logout().await.unwrap();

        assert_eq!(f.transport.operations(), vec![LOGOUT_OPERATION]);
        assert_eq!(
            f.transport.payloads(LOGOUT_OPERATION)[0],
            json!({"accessToken": "a1"})
        );
        assert!(!f.dispatcher.session().is_authenticated());
        assert_eq!(f.secrets.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(f.profiles.get(USER_PROFILE_KEY).unwrap(), None);
        assert_eq!(f.dispatcher.experience().cumulative_xp, 0);
    }

    #[tokio::test]
    async fn restore_uses_the_stored_refresh_token() {
        let f = fixture();
        f.secrets.set(REFRESH_TOKEN_KEY, "stored").unwrap();
        f.transport
            .reply(REFRESH_OPERATION, refreshed("a5", "r5"))
            .reply("getPets", Ok(json!({"success": true})));

        f.dispatcher.restore().await.unwrap();
        f.dispatcher.dispatch("getPets", json!({})).await.unwrap();

        assert_eq!(
            f.transport.payloads(REFRESH_OPERATION)[0],
            json!({"refreshToken": "stored"})
        );
        assert_eq!(f.transport.payloads("getPets")[0]["accessToken"], "a5");
    }

    #[tokio::test]
    async fn restore_without_stored_token_is_session_expired() {
        let f = fixture();
        assert_eq!(
            f.dispatcher.restore().await,
            Err(DispatchError::SessionExpired)
        );
        assert!(f.transport.operations().is_empty());
    }

    /// Accepts only the newest access token and issues a new one per refresh.
    #[derive(Default)]
    struct RotatingBackend {
        current: Mutex<String>,
        refreshes: AtomicUsize,
        served: AtomicUsize,
    }

    #[async_trait]
    impl Transport for RotatingBackend {
        async fn call(&self, operation: &str, payload: Value) -> Result<Value, TransportError> {
            if operation == REFRESH_OPERATION {
                let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                let token = format!("a{}", n + 1);
                *self.current.lock().unwrap() = token.clone();
                return Ok(json!({"success": true, "accessToken": token}));
            }
            let current = self.current.lock().unwrap().clone();
            if payload["accessToken"] != current.as_str() {
                return Err(TransportError::AuthRejected);
            }
            self.served.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"success": true}))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rejections_share_one_refresh() {
        let backend = Arc::new(RotatingBackend::default());
        *backend.current.lock().unwrap() = "revoked-elsewhere".into();
        let session = Arc::new(SessionTokenManager::new(Arc::new(MemorySecretStore::new())));
        session
            .install(Credential::new("a1", Utc::now() + Duration::minutes(10), "r1"))
            .unwrap();
        let dispatcher = Arc::new(AuthenticatedCallDispatcher::new(
            session,
            backend.clone(),
            Arc::new(MemoryKeyValueStore::new()),
        ));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.spawn(async move { dispatcher.dispatch("getPets", json!({"page": i})).await });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.unwrap().unwrap().success);
        }

        assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(backend.served.load(Ordering::SeqCst), 8);
    }
}
