//! Picks between `tuf-keydb`'s in-memory and Postgres backends at startup, so `tuf-signerd` can
//! run against either without the rest of the crate being generic over the concrete store type.

use async_trait::async_trait;
use tuf_core::crypto::{KeyId, PrivateKey, PublicKey};
use tuf_keydb::memory::InMemoryKeyDbStore;
use tuf_keydb::passphrase::EnvPassphraseRetriever;
use tuf_keydb::postgres::PostgresKeyDbStore;
use tuf_keydb::{KeyDbStore, KeyRecord, Result};

/// Either backend, selected once at startup by [`crate::config::SignerConfig::database_url`].
pub enum AnyKeyDbStore {
    /// `InMemoryKeyDbStore`, used when no `database_url` is configured (dev mode, tests).
    Memory(InMemoryKeyDbStore<EnvPassphraseRetriever>),
    /// `PostgresKeyDbStore`, used in production.
    Postgres(PostgresKeyDbStore<EnvPassphraseRetriever>),
}

impl AnyKeyDbStore {
    /// Construct the in-memory backend.
    pub fn memory(retriever: EnvPassphraseRetriever) -> Self {
        AnyKeyDbStore::Memory(InMemoryKeyDbStore::new(retriever))
    }

    /// Connect to Postgres.
    pub async fn connect_postgres(
        database_url: &str,
        retriever: EnvPassphraseRetriever,
    ) -> Result<Self> {
        Ok(AnyKeyDbStore::Postgres(
            PostgresKeyDbStore::connect(database_url, 10, retriever).await?,
        ))
    }
}

#[async_trait]
impl KeyDbStore for AnyKeyDbStore {
    async fn add_key(
        &self,
        role: &str,
        gun: &str,
        passphrase_alias: &str,
        private_key: &PrivateKey,
        pkcs8_der: &[u8],
    ) -> Result<()> {
        match self {
            AnyKeyDbStore::Memory(s) => s.add_key(role, gun, passphrase_alias, private_key, pkcs8_der).await,
            AnyKeyDbStore::Postgres(s) => {
                s.add_key(role, gun, passphrase_alias, private_key, pkcs8_der).await
            }
        }
    }

    async fn get_key(&self, key_id: &KeyId) -> Result<(PublicKey, String)> {
        match self {
            AnyKeyDbStore::Memory(s) => s.get_key(key_id).await,
            AnyKeyDbStore::Postgres(s) => s.get_key(key_id).await,
        }
    }

    async fn get_private_key(&self, key_id: &KeyId) -> Result<(PrivateKey, String)> {
        match self {
            AnyKeyDbStore::Memory(s) => s.get_private_key(key_id).await,
            AnyKeyDbStore::Postgres(s) => s.get_private_key(key_id).await,
        }
    }

    async fn remove_key(&self, key_id: &KeyId) -> Result<()> {
        match self {
            AnyKeyDbStore::Memory(s) => s.remove_key(key_id).await,
            AnyKeyDbStore::Postgres(s) => s.remove_key(key_id).await,
        }
    }

    async fn mark_active(&self, key_id: &KeyId) -> Result<()> {
        match self {
            AnyKeyDbStore::Memory(s) => s.mark_active(key_id).await,
            AnyKeyDbStore::Postgres(s) => s.mark_active(key_id).await,
        }
    }

    async fn most_recent_key(&self, gun: &str, role: &str) -> Result<Option<KeyRecord>> {
        match self {
            AnyKeyDbStore::Memory(s) => s.most_recent_key(gun, role).await,
            AnyKeyDbStore::Postgres(s) => s.most_recent_key(gun, role).await,
        }
    }

    async fn keys_for(&self, gun: &str, role: &str) -> Result<Vec<KeyRecord>> {
        match self {
            AnyKeyDbStore::Memory(s) => s.keys_for(gun, role).await,
            AnyKeyDbStore::Postgres(s) => s.keys_for(gun, role).await,
        }
    }

    async fn health_check(&self) -> Result<()> {
        match self {
            AnyKeyDbStore::Memory(s) => s.health_check().await,
            AnyKeyDbStore::Postgres(s) => s.health_check().await,
        }
    }
}
