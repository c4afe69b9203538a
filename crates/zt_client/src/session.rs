//! Explicit session context: who we are and which keypair opens our mail.
//! Passed to every component instead of being looked up ambiently.

use std::sync::Arc;

use tracing::warn;

use zt_crypto::{Keypair, PublicKeyBytes};
use zt_store::KeyStore;

use crate::error::SyncError;

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    username: String,
    keypair: Option<Keypair>,
}

impl SessionContext {
    pub fn new(username: impl Into<String>, keypair: Option<Keypair>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                username: username.into(),
                keypair,
            }),
        }
    }

    /// Load the identity's keypair from the key store. A missing key is not
    /// an error: the session can still send, and inbound messages render as
    /// unreadable.
    pub async fn open(keystore: &KeyStore, username: &str) -> Result<Self, SyncError> {
        let keypair = keystore.load_keypair(username).await?;
        if keypair.is_none() {
            warn!(target: "zt_client", event = "session_without_key", user = %username);
        }
        Ok(Self::new(username, keypair))
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    pub fn keypair(&self) -> Result<&Keypair, SyncError> {
        self.inner
            .keypair
            .as_ref()
            .ok_or_else(|| SyncError::KeyNotFound(self.inner.username.clone()))
    }

    pub fn public_key(&self) -> Option<PublicKeyBytes> {
        self.inner.keypair.as_ref().map(|k| k.public)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("username", &self.inner.username)
            .field("has_key", &self.inner.keypair.is_some())
            .finish()
    }
}
