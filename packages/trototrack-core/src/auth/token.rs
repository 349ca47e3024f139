//! Sources of the bearer token attached to authorized requests.

use crate::auth::credentials::load_credentials;
use crate::scan::AuthToken;
use async_trait::async_trait;
use tokio::sync::watch;

/// Supplies the current token. Read once per outgoing request, never cached.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn current_token(&self) -> AuthToken;
}

/// A token that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(AuthToken);

impl StaticToken {
    pub fn new(token: AuthToken) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn current_token(&self) -> AuthToken {
        self.0.clone()
    }
}

/// Token published by whoever owns the session (login, refresh, logout).
#[derive(Debug, Clone)]
pub struct WatchTokenSource {
    rx: watch::Receiver<AuthToken>,
}

/// Write side of a [`WatchTokenSource`].
#[derive(Debug)]
pub struct TokenPublisher {
    tx: watch::Sender<AuthToken>,
}

impl WatchTokenSource {
    pub fn channel(initial: AuthToken) -> (TokenPublisher, WatchTokenSource) {
        let (tx, rx) = watch::channel(initial);
        (TokenPublisher { tx }, WatchTokenSource { rx })
    }
}

impl TokenPublisher {
    pub fn publish(&self, token: AuthToken) {
        // send_replace keeps working after every receiver is gone
        self.tx.send_replace(token);
    }
}

#[async_trait]
impl TokenSource for WatchTokenSource {
    async fn current_token(&self) -> AuthToken {
        let token = self.rx.borrow().clone();
        token
    }
}

/// Reads the token from the credential store on every call.
#[derive(Debug, Clone, Default)]
pub struct StoredCredentials;

#[async_trait]
impl TokenSource for StoredCredentials {
    async fn current_token(&self) -> AuthToken {
        match load_credentials().await {
            Ok(creds) => creds.map(|c| c.access_token),
            Err(e) => {
                tracing::warn!("Failed to load stored credentials: {}", e);
                None
            }
        }
    }
}
