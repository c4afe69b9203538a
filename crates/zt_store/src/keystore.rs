//! Private key custody, keyed by username so several identities can share
//! one device.

use std::sync::Arc;

use tracing::{info, warn};
use zeroize::Zeroizing;

use zt_crypto::{Keypair, SecretKeyBytes};

use crate::error::StoreError;
use crate::kv::KeyValueStore;

const KEY_PREFIX: &str = "private_key:";

#[derive(Clone)]
pub struct KeyStore {
    kv: Arc<dyn KeyValueStore>,
}

impl KeyStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn slot(username: &str) -> Result<String, StoreError> {
        if username.trim().is_empty() {
            return Err(StoreError::InvalidUsername(username.to_string()));
        }
        Ok(format!("{KEY_PREFIX}{username}"))
    }

    /// Fresh keypair from the OS CSPRNG. Entropy failure aborts registration.
    pub fn generate_keypair() -> Result<Keypair, StoreError> {
        Ok(Keypair::generate()?)
    }

    pub async fn persist_private_key(
        &self,
        username: &str,
        secret: &SecretKeyBytes,
    ) -> Result<(), StoreError> {
        let slot = Self::slot(username)?;
        let encoded = Zeroizing::new(secret.to_b64());
        self.kv.put(&slot, &encoded).await?;
        info!(target: "zt_store", event = "private_key_persisted", user = %username);
        Ok(())
    }

    /// `Ok(None)` when nothing is stored for this username. Callers treat
    /// that as "cannot decrypt", not as a failure of the store.
    pub async fn load_private_key(
        &self,
        username: &str,
    ) -> Result<Option<SecretKeyBytes>, StoreError> {
        let slot = Self::slot(username)?;
        let Some(encoded) = self.kv.get(&slot).await? else {
            return Ok(None);
        };
        let encoded = Zeroizing::new(encoded);
        match SecretKeyBytes::from_b64(&encoded) {
            Ok(secret) => Ok(Some(secret)),
            Err(e) => {
                warn!(target: "zt_store", event = "private_key_corrupt", user = %username, error = %e);
                Err(StoreError::CorruptKey(username.to_string()))
            }
        }
    }

    pub async fn load_keypair(&self, username: &str) -> Result<Option<Keypair>, StoreError> {
        Ok(self
            .load_private_key(username)
            .await?
            .map(Keypair::from_secret))
    }

    /// Generate and persist a keypair for a new identity. Refuses to replace
    /// an existing key; pass `overwrite` to do so deliberately.
    pub async fn register(&self, username: &str, overwrite: bool) -> Result<Keypair, StoreError> {
        let slot = Self::slot(username)?;
        if !overwrite && self.kv.get(&slot).await?.is_some() {
            return Err(StoreError::KeyExists(username.to_string()));
        }
        let keypair = Self::generate_keypair()?;
        self.persist_private_key(username, keypair.secret()).await?;
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::kv::MemoryStore;

    fn memory_keystore() -> (Arc<MemoryStore>, KeyStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), KeyStore::new(kv))
    }

    #[tokio::test]
    async fn missing_key_is_none_not_error() {
        let (_, ks) = memory_keystore();
        assert!(ks.load_private_key("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn identities_are_isolated_by_username() {
        let (_, ks) = memory_keystore();
        let alice = ks.register("alice", false).await.unwrap();
        let bob = ks.register("bob", false).await.unwrap();

        let a = ks.load_keypair("alice").await.unwrap().unwrap();
        let b = ks.load_keypair("bob").await.unwrap().unwrap();
        assert_eq!(a.public, alice.public);
        assert_eq!(b.public, bob.public);
        assert_ne!(a.public, b.public);
    }

    #[tokio::test]
    async fn register_refuses_to_clobber() {
        let (_, ks) = memory_keystore();
        let first = ks.register("alice", false).await.unwrap();
        assert!(matches!(
            ks.register("alice", false).await,
            Err(StoreError::KeyExists(_))
        ));
        let second = ks.register("alice", true).await.unwrap();
        assert_ne!(first.public, second.public);
    }

    #[tokio::test]
    async fn empty_username_is_rejected() {
        let (_, ks) = memory_keystore();
        assert!(matches!(
            ks.load_private_key(" ").await,
            Err(StoreError::InvalidUsername(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_blob_is_reported() {
        let (kv, ks) = memory_keystore();
        kv.put("private_key:alice", "not+a/valid=key").await.unwrap();
        assert!(matches!(
            ks.load_private_key("alice").await,
            Err(StoreError::CorruptKey(_))
        ));
    }

    #[tokio::test]
    async fn sqlite_backed_key_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");

        let public = {
            let store = SqliteStore::open(&path).await.unwrap();
            let ks = KeyStore::new(Arc::new(store.clone()));
            let kp = ks.register("carol", false).await.unwrap();
            store.pool.close().await;
            kp.public
        };

        let ks = KeyStore::new(Arc::new(SqliteStore::open(&path).await.unwrap()));
        let kp = ks.load_keypair("carol").await.unwrap().unwrap();
        assert_eq!(kp.public, public);
    }
}
