//! The decrypted-key cache (spec §4.B: "memoizes decrypted private keys by key-id with no TTL").

use std::sync::Arc;

use dashmap::DashMap;
use tuf_core::crypto::{KeyId, PrivateKey, PublicKey};

use crate::store::KeyDbStore;
use crate::Result;

/// Wraps a [`KeyDbStore`] and memoizes decrypted private keys by key-id.
///
/// Invalidation occurs only on [`Cache::remove_key`]. The cache is process-local: consistency
/// across multiple signer processes is eventual, via re-read on miss (spec §4.B).
pub struct Cache<S> {
    store: Arc<S>,
    decrypted: DashMap<KeyId, Arc<PrivateKey>>,
}

impl<S: KeyDbStore> Cache<S> {
    /// Wrap `store` with a fresh, empty cache.
    pub fn new(store: Arc<S>) -> Self {
        Cache {
            store,
            decrypted: DashMap::new(),
        }
    }

    /// Create a new key and persist it through the wrapped store. Not cached here; the next
    /// `get_private_key` populates the cache on first use.
    pub async fn add_key(
        &self,
        role: &str,
        gun: &str,
        passphrase_alias: &str,
        private_key: &PrivateKey,
        pkcs8_der: &[u8],
    ) -> Result<()> {
        self.store
            .add_key(role, gun, passphrase_alias, private_key, pkcs8_der)
            .await
    }

    /// The public material and role for `key_id`.
    pub async fn get_key(&self, key_id: &KeyId) -> Result<(PublicKey, String)> {
        self.store.get_key(key_id).await
    }

    /// The decrypted private key for `key_id`, served from cache on a hit.
    pub async fn get_private_key(&self, key_id: &KeyId) -> Result<Arc<PrivateKey>> {
        if let Some(cached) = self.decrypted.get(key_id) {
            return Ok(cached.clone());
        }
        let (key, _role) = self.store.get_private_key(key_id).await?;
        let key = Arc::new(key);
        self.decrypted.insert(key_id.clone(), key.clone());
        Ok(key)
    }

    /// Remove `key_id` from both the cache and the wrapped store.
    pub async fn remove_key(&self, key_id: &KeyId) -> Result<()> {
        self.store.remove_key(key_id).await?;
        self.decrypted.remove(key_id);
        Ok(())
    }

    /// Mark `key_id` active in the wrapped store.
    pub async fn mark_active(&self, key_id: &KeyId) -> Result<()> {
        self.store.mark_active(key_id).await
    }

    /// `Ok(())` if the wrapped store is reachable.
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }

    /// The most-recently-used key recorded for `(gun, role)`, if any.
    pub async fn most_recent_key(&self, gun: &str, role: &str) -> Result<Option<crate::KeyRecord>> {
        self.store.most_recent_key(gun, role).await
    }

    /// All keys recorded for `(gun, role)`.
    pub async fn keys_for(&self, gun: &str, role: &str) -> Result<Vec<crate::KeyRecord>> {
        self.store.keys_for(gun, role).await
    }

    /// The number of decrypted keys currently memoized. Exposed for tests that assert on
    /// cache-hit behavior.
    pub fn cached_len(&self) -> usize {
        self.decrypted.len()
    }
}
