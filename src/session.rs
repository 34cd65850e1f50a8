//! Authentication state
//!
//! Logging in or out empties the data cache so records read under one
//! session are never served to the next.

use crate::cache::DataCache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Who the application is acting for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AuthState {
    Anonymous,
    Authenticated {
        token: String,
        since: DateTime<Utc>,
    },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { token, .. } => Some(token),
            AuthState::Anonymous => None,
        }
    }
}

/// Current authentication state, observable through one watch channel
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<watch::Sender<AuthState>>,
    cache: DataCache,
}

impl Session {
    pub fn new(cache: DataCache) -> Self {
        let (state, _) = watch::channel(AuthState::Anonymous);
        Self {
            state: Arc::new(state),
            cache,
        }
    }

    /// Switch to an authenticated session and drop every cached entry
    ///
    /// The token is taken as given; checking it is the server's job.
    pub async fn login(&self, token: impl Into<String>) {
        let event = self.cache.clear_for_session().await;
        info!("Session started, cleared {} cached entries", event.keys.len());

        self.state.send_replace(AuthState::Authenticated {
            token: token.into(),
            since: Utc::now(),
        });
    }

    /// Return to the anonymous state and drop every cached entry
    pub async fn logout(&self) {
        let event = self.cache.clear_for_session().await;
        info!("Session ended, cleared {} cached entries", event.keys.len());

        self.state.send_replace(AuthState::Anonymous);
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheKey};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_login_and_logout_clear_cache() {
        let cache = DataCache::new(CacheConfig::default());
        let session = Session::new(cache.clone());
        let key = CacheKey::table("event");

        cache.set(key.clone(), json!([1]), Duration::from_secs(60)).await;
        session.login("jwt-token").await;
        assert!(session.is_authenticated());
        assert_eq!(session.state().token(), Some("jwt-token"));
        assert_eq!(cache.get(&key).await, None);

        cache.set(key.clone(), json!([2]), Duration::from_secs(60)).await;
        session.logout().await;
        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let session = Session::new(DataCache::default());
        let mut rx = session.subscribe();
        assert!(!rx.borrow().is_authenticated());

        session.login("t").await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
    }
}
