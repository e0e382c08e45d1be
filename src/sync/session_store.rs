use crate::api::PropertyApi;
use crate::errors::ApiError;
use crate::models::{User, UserPatch};
use crate::storage::{Persistence, TokenStore, SESSION_STATE_KEY};
use crate::sync::{FetchOutcome, StalenessPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the session stands. Any state may move again on the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Nothing has been asked of the backend yet
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub status: SessionStatus,
    pub last_user_fetched: Option<DateTime<Utc>>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    is_authenticated: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    last_user_fetched: Option<DateTime<Utc>>,
}

impl From<PersistedSession> for SessionState {
    fn from(saved: PersistedSession) -> Self {
        let status = if saved.is_authenticated {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unknown
        };
        Self {
            user: saved.user,
            is_authenticated: saved.is_authenticated,
            status,
            last_user_fetched: saved.last_user_fetched,
            loading: false,
            error: None,
        }
    }
}

/// Cached "who am I" for the stored bearer token
pub struct SessionStore {
    api: Arc<dyn PropertyApi>,
    tokens: TokenStore,
    persistence: Arc<dyn Persistence>,
    policy: StalenessPolicy,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(
        api: Arc<dyn PropertyApi>,
        tokens: TokenStore,
        persistence: Arc<dyn Persistence>,
        policy: StalenessPolicy,
    ) -> Self {
        let initial = rehydrate(persistence.as_ref());
        let (state, _) = watch::channel(initial);
        Self {
            api,
            tokens,
            persistence,
            policy,
            state,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Serve the cached user when fresh, otherwise ask the backend.
    pub async fn ensure_user(&self, force: bool) -> FetchOutcome {
        if !force {
            let cached = {
                let state = self.state.borrow();
                state.user.is_some() && self.policy.is_fresh(state.last_user_fetched)
            };
            if cached {
                debug!("Serving session from cache");
                return FetchOutcome::CacheHit;
            }
        }

        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.api.current_user().await {
            Ok(user) => {
                let now = self.policy.now();
                info!("Authenticated as {}", user.email);
                self.update(|s| {
                    s.user = Some(user);
                    s.is_authenticated = true;
                    s.status = SessionStatus::Authenticated;
                    s.last_user_fetched = Some(now);
                    s.loading = false;
                });
                FetchOutcome::Fetched { count: 1 }
            }
            Err(e) => {
                warn!("Session check failed: {}", e);
                if e.is_unauthorized() {
                    self.tokens.clear();
                }
                let message = e.user_message("Failed to authenticate session");
                self.update(|s| {
                    s.user = None;
                    s.is_authenticated = false;
                    s.status = SessionStatus::Unauthenticated;
                    s.error = Some(message);
                    s.loading = false;
                });
                FetchOutcome::Failed(e.kind())
            }
        }
    }

    /// Forget the credential and the cached user. No network call.
    pub fn logout(&self) {
        self.tokens.clear();
        self.update(|s| {
            s.user = None;
            s.is_authenticated = false;
            s.status = SessionStatus::Unauthenticated;
            s.last_user_fetched = None;
            s.error = None;
        });
        info!("Logged out");
    }

    /// Some request came back 401: drop the session but keep any error text.
    pub fn handle_rejection(&self) {
        self.tokens.clear();
        self.update(|s| {
            s.user = None;
            s.is_authenticated = false;
            s.status = SessionStatus::Unauthenticated;
            s.last_user_fetched = None;
        });
        warn!("Credential rejected, session cleared");
    }

    /// Merge `patch` into the cached user without a round trip.
    pub fn update_user(&self, patch: UserPatch) {
        self.update(|s| match s.user.as_mut() {
            Some(user) => user.apply(patch),
            None => debug!("No cached user, ignoring profile update"),
        });
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    /// Apply `change` and persist under the same watch lock.
    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut SessionState),
    {
        self.state.send_modify(|state| {
            change(state);
            let saved = PersistedSession {
                user: state.user.clone(),
                is_authenticated: state.is_authenticated,
                last_user_fetched: state.last_user_fetched,
            };
            let result = serde_json::to_string(&saved)
                .map_err(ApiError::from)
                .and_then(|json| self.persistence.store(SESSION_STATE_KEY, &json));
            if let Err(e) = result {
                warn!("Could not persist session state: {}", e);
            }
        });
    }
}

fn rehydrate(persistence: &dyn Persistence) -> SessionState {
    match persistence.load(SESSION_STATE_KEY) {
        Ok(Some(json)) => match serde_json::from_str::<PersistedSession>(&json) {
            Ok(saved) => saved.into(),
            Err(e) => {
                warn!("Ignoring unreadable session state: {}", e);
                SessionState::default()
            }
        },
        Ok(None) => SessionState::default(),
        Err(e) => {
            warn!("Could not load session state: {}", e);
            SessionState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPersistence;

    #[test]
    fn rehydrated_login_is_authenticated_otherwise_unknown() {
        let persistence = MemoryPersistence::new();
        persistence
            .store(
                SESSION_STATE_KEY,
                r#"{"user":{"_id":"u1","name":"Asha","email":"a@x.io"},"isAuthenticated":true,"lastUserFetched":1700000000000}"#,
            )
            .unwrap();
        let state = rehydrate(&persistence);
        assert_eq!(state.status, SessionStatus::Authenticated);
        assert_eq!(state.user.unwrap().name, "Asha");

        persistence
            .store(SESSION_STATE_KEY, r#"{"user":null,"isAuthenticated":false}"#)
            .unwrap();
        assert_eq!(rehydrate(&persistence).status, SessionStatus::Unknown);
    }
}
