//! Username -> public key, fetched on demand and cached for the session.
//!
//! Cached entries are never re-fetched or invalidated. A rotated key on the
//! server is not noticed until the next session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use zt_crypto::PublicKeyBytes;

use crate::error::TransportError;
use crate::transport::Transport;

pub struct PublicKeyDirectory {
    transport: Arc<dyn Transport>,
    cache: Mutex<HashMap<String, PublicKeyBytes>>,
}

impl PublicKeyDirectory {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self, username: &str) -> Option<PublicKeyBytes> {
        self.cache.lock().get(username).copied()
    }

    /// Cache hit, or fetch-and-cache. A key that does not decode is reported
    /// as `TransportError::Decode` and is not cached.
    pub async fn resolve(&self, username: &str) -> Result<PublicKeyBytes, TransportError> {
        if let Some(pk) = self.cached(username) {
            return Ok(pk);
        }

        let resp = self.transport.get_public_key(username).await?;
        let pk = PublicKeyBytes::from_b64(&resp.public_key)
            .map_err(|e| TransportError::Decode(format!("public key for {username}: {e}")))?;

        // First writer wins so concurrent resolvers agree on one entry.
        let pk = *self
            .cache
            .lock()
            .entry(username.to_string())
            .or_insert(pk);
        debug!(target: "zt_client", event = "public_key_cached", user = %username);
        Ok(pk)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
