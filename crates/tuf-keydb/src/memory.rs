//! An in-memory `KeyDbStore`, used by tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tuf_core::crypto::{KeyId, PrivateKey, PublicKey, SignatureScheme};

use crate::encryption;
use crate::error::Error;
use crate::model::KeyRecord;
use crate::passphrase::PassphraseRetriever;
use crate::store::KeyDbStore;
use crate::Result;

struct StoredRecord {
    record: KeyRecord,
    encrypted_private: Vec<u8>,
}

/// An in-memory, process-local implementation of [`KeyDbStore`].
pub struct InMemoryKeyDbStore<R> {
    records: DashMap<KeyId, StoredRecord>,
    retriever: R,
}

impl<R: PassphraseRetriever> InMemoryKeyDbStore<R> {
    /// Construct an empty store using `retriever` to resolve wrapping passphrases.
    pub fn new(retriever: R) -> Self {
        InMemoryKeyDbStore {
            records: DashMap::new(),
            retriever,
        }
    }
}

#[async_trait]
impl<R: PassphraseRetriever> KeyDbStore for InMemoryKeyDbStore<R> {
    async fn add_key(
        &self,
        role: &str,
        gun: &str,
        passphrase_alias: &str,
        private_key: &PrivateKey,
        pkcs8_der: &[u8],
    ) -> Result<()> {
        let key_id = private_key.key_id().clone();
        if self.records.contains_key(&key_id) {
            return Ok(());
        }

        let passphrase = self.retriever.retrieve(passphrase_alias, 0)?;
        let encrypted_private = encryption::wrap(&passphrase, pkcs8_der)?;

        let record = KeyRecord {
            key_id: key_id.clone(),
            algorithm: private_key.public().scheme(),
            gun: gun.to_string(),
            role: role.to_string(),
            public_key: private_key.public().clone(),
            encrypted_private: encrypted_private.clone(),
            passphrase_alias: passphrase_alias.to_string(),
            created_at: Utc::now(),
            active_at: None,
        };
        self.records.insert(key_id, StoredRecord { record, encrypted_private });
        Ok(())
    }

    async fn get_key(&self, key_id: &KeyId) -> Result<(PublicKey, String)> {
        self.records
            .get(key_id)
            .map(|r| (r.record.public_key.clone(), r.record.role.clone()))
            .ok_or_else(|| Error::NotFound(key_id.to_string()))
    }

    async fn get_private_key(&self, key_id: &KeyId) -> Result<(PrivateKey, String)> {
        let stored = self
            .records
            .get(key_id)
            .ok_or_else(|| Error::NotFound(key_id.to_string()))?;
        let passphrase = self.retriever.retrieve(&stored.record.passphrase_alias, 0)?;
        let plaintext = encryption::unwrap(&passphrase, &stored.encrypted_private, key_id.value())?;
        let scheme = stored.record.algorithm;
        let role = stored.record.role.clone();
        drop(stored);
        let private_key = PrivateKey::from_pkcs8(&plaintext, scheme)?;
        Ok((private_key, role))
    }

    async fn remove_key(&self, key_id: &KeyId) -> Result<()> {
        self.records.remove(key_id);
        Ok(())
    }

    async fn mark_active(&self, key_id: &KeyId) -> Result<()> {
        let mut stored = self
            .records
            .get_mut(key_id)
            .ok_or_else(|| Error::NotFound(key_id.to_string()))?;
        if stored.record.active_at.is_none() {
            stored.record.active_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn most_recent_key(&self, gun: &str, role: &str) -> Result<Option<KeyRecord>> {
        let mut candidates = self.keys_for(gun, role).await?;
        candidates.sort_by(|a, b| {
            let a_key = a.active_at.unwrap_or(a.created_at);
            let b_key = b.active_at.unwrap_or(b.created_at);
            b_key.cmp(&a_key).then_with(|| b.key_id.cmp(&a.key_id))
        });
        Ok(candidates.into_iter().next())
    }

    async fn keys_for(&self, gun: &str, role: &str) -> Result<Vec<KeyRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.record.gun == gun && r.record.role == role)
            .map(|r| r.record.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
