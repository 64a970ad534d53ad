//! Observable authentication state
//!
//! Subscribers get a [`watch::Receiver`] and see every change, including the
//! reset that follows a lost session.

use std::sync::Arc;
use tokio::sync::watch;

use crate::client::ClientError;
use crate::client::api::{ApiClient, SessionListener};
use crate::core::models::{LoginRequest, RegisterRequest, UserResponse};

/// Snapshot of the authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<UserResponse>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct ResetOnExpiry(Arc<watch::Sender<AuthState>>);

impl SessionListener for ResetOnExpiry {
    fn session_expired(&self) {
        self.0.send_modify(|state| {
            state.user = None;
            state.is_authenticated = false;
            state.is_loading = false;
        });
    }
}

/// Message shown to the user for a failed action
fn describe(error: &ClientError) -> String {
    match error {
        ClientError::Validation(errors) => errors
            .errors()
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| error.to_string()),
        _ => error.to_string(),
    }
}

/// Authentication store backed by an [`ApiClient`]
#[derive(Clone)]
pub struct AuthStore {
    api: ApiClient,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthStore {
    pub fn new(api: ApiClient) -> Self {
        let state = Arc::new(watch::Sender::new(AuthState::default()));
        api.add_session_listener(Arc::new(ResetOnExpiry(state.clone())));

        Self { api, state }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn begin(&self) {
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });
    }

    fn finish(&self, result: Result<UserResponse, ClientError>) -> Result<UserResponse, ClientError> {
        match &result {
            Ok(user) => self.state.send_modify(|state| {
                state.user = Some(user.clone());
                state.is_authenticated = true;
                state.is_loading = false;
            }),
            Err(e) => {
                let message = describe(e);
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(message);
                });
            }
        }
        result
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserResponse, ClientError> {
        self.begin();
        let result = self
            .api
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .map(|response| response.user);

        if let Ok(user) = &result {
            tracing::info!(user_id = %user.id, "Logged in");
        }
        self.finish(result)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserResponse, ClientError> {
        self.begin();
        let result = self
            .api
            .register(&RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            })
            .await
            .map(|response| response.user);

        self.finish(result)
    }

    /// Log out; local state is cleared even when the server call fails
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            tracing::warn!(error = %e, "Logout request failed, clearing session locally");
        }
        self.state.send_replace(AuthState::default());
    }

    /// Restore the user of stored tokens, clearing them if the server rejects them
    pub async fn check_auth(&self) {
        if !self.api.tokens().has_tokens() {
            return;
        }

        self.begin();
        match self.api.me().await {
            Ok(user) => {
                self.state.send_modify(|state| {
                    state.user = Some(user);
                    state.is_authenticated = true;
                    state.is_loading = false;
                });
            }
            Err(e) => {
                tracing::debug!(error = %e, "Stored session is no longer valid");
                self.api.tokens().clear();
                self.state.send_replace(AuthState::default());
            }
        }
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|state| state.error = None);
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use crate::client::api::fake_server::{PASSWORD, spawn};
    use crate::client::tokens::tests::pair;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_login_updates_subscribers() {
        let (client, fake) = spawn().await;
        let store = AuthStore::new(client);
        let mut rx = store.subscribe();

        let user = store.login("Ada@Example.com ", PASSWORD).await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.is_authenticated);
        assert!(!state.is_loading);
        assert_eq!(state.user.map(|u| u.id), Some(fake.user.id));
        assert_eq!(user.id, fake.user.id);
    }

    #[tokio::test]
    async fn test_login_failure_sets_error() {
        let (client, _fake) = spawn().await;
        let store = AuthStore::new(client);

        let result = store.login("ada@example.com", "wrong-password").await;

        assert!(result.is_err());
        let state = store.state();
        assert!(!state.is_authenticated);
        assert!(!state.is_loading);
        assert!(state.error.is_some());

        store.clear_error();
        assert!(store.state().error.is_none());
    }

    #[tokio::test]
    async fn test_local_validation_message() {
        let (client, fake) = spawn().await;
        let store = AuthStore::new(client);

        let result = store.register("bad-email", PASSWORD, "Ada").await;

        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert!(store.state().error.is_some());
        assert_eq!(fake.issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_even_on_server_error() {
        let (client, _fake) = spawn().await;
        let store = AuthStore::new(client);
        store.login("ada@example.com", PASSWORD).await.unwrap();

        // The fake answers logout with a 500
        store.logout().await;

        assert_eq!(store.state(), AuthState::default());
        assert!(!store.api().tokens().has_tokens());
    }

    #[tokio::test]
    async fn test_check_auth_without_tokens_is_noop() {
        let (client, fake) = spawn().await;
        let store = AuthStore::new(client);

        store.check_auth().await;

        assert_eq!(fake.me_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.state(), AuthState::default());
    }

    #[tokio::test]
    async fn test_check_auth_restores_user() {
        let (client, fake) = spawn().await;
        client.login(&crate::client::api::fake_server::credentials()).await.unwrap();
        let store = AuthStore::new(client);

        store.check_auth().await;

        let state = store.state();
        assert!(state.is_authenticated);
        assert_eq!(state.user.map(|u| u.id), Some(fake.user.id));
    }

    #[tokio::test]
    async fn test_check_auth_clears_rejected_tokens() {
        let (client, fake) = spawn().await;
        client.tokens().set_tokens(&pair("garbage", "refresh-unknown"));
        fake.refresh_ok.store(false, Ordering::SeqCst);
        let store = AuthStore::new(client);

        store.check_auth().await;

        assert!(!store.api().tokens().has_tokens());
        assert!(!store.state().is_authenticated);
    }

    #[tokio::test]
    async fn test_lost_session_resets_state() {
        let (client, fake) = spawn().await;
        let store = AuthStore::new(client);
        store.login("ada@example.com", PASSWORD).await.unwrap();
        fake.revoked.store(true, Ordering::SeqCst);

        let _ = store.api().me().await;

        let state = store.state();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
    }
}
