//! Picks between `tuf-metastore`'s in-memory and Postgres backends at startup, so `tuf-trustd`
//! can run against either without the rest of the crate being generic over the concrete store
//! type (mirrors `tuf_signer::backend::AnyKeyDbStore`, the same pattern one layer down the
//! dependency graph).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tuf_core::metadata::MetadataPath;
use tuf_metastore::memory::InMemoryMetaStore;
use tuf_metastore::postgres::PostgresMetaStore;
use tuf_metastore::{ChangeRecord, Gun, MetaStore, MetaUpdate, Result};

/// Either backend, selected once at startup by [`crate::config::TrustConfig::database_url`].
pub enum AnyMetaStore {
    /// `InMemoryMetaStore`, used when no `database_url` is configured (dev mode, tests).
    Memory(InMemoryMetaStore),
    /// `PostgresMetaStore`, used in production.
    Postgres(PostgresMetaStore),
}

impl AnyMetaStore {
    /// Construct the in-memory backend.
    pub fn memory() -> Self {
        AnyMetaStore::Memory(InMemoryMetaStore::new())
    }

    /// Connect to Postgres.
    pub async fn connect_postgres(database_url: &str) -> Result<Self> {
        Ok(AnyMetaStore::Postgres(
            PostgresMetaStore::connect(database_url, 10).await?,
        ))
    }
}

#[async_trait]
impl MetaStore for AnyMetaStore {
    async fn bootstrap(&self) -> Result<()> {
        match self {
            AnyMetaStore::Memory(s) => s.bootstrap().await,
            AnyMetaStore::Postgres(s) => s.bootstrap().await,
        }
    }

    async fn update_current(&self, gun: &Gun, update: MetaUpdate) -> Result<()> {
        match self {
            AnyMetaStore::Memory(s) => s.update_current(gun, update).await,
            AnyMetaStore::Postgres(s) => s.update_current(gun, update).await,
        }
    }

    async fn update_many(&self, gun: &Gun, updates: Vec<MetaUpdate>) -> Result<()> {
        match self {
            AnyMetaStore::Memory(s) => s.update_many(gun, updates).await,
            AnyMetaStore::Postgres(s) => s.update_many(gun, updates).await,
        }
    }

    async fn get_current(&self, gun: &Gun, role: &MetadataPath) -> Result<(DateTime<Utc>, Vec<u8>)> {
        match self {
            AnyMetaStore::Memory(s) => s.get_current(gun, role).await,
            AnyMetaStore::Postgres(s) => s.get_current(gun, role).await,
        }
    }

    async fn get_checksum(&self, gun: &Gun, role: &MetadataPath, checksum_hex: &str) -> Result<Vec<u8>> {
        match self {
            AnyMetaStore::Memory(s) => s.get_checksum(gun, role, checksum_hex).await,
            AnyMetaStore::Postgres(s) => s.get_checksum(gun, role, checksum_hex).await,
        }
    }

    async fn get_version(&self, gun: &Gun, role: &MetadataPath, version: u32) -> Result<Vec<u8>> {
        match self {
            AnyMetaStore::Memory(s) => s.get_version(gun, role, version).await,
            AnyMetaStore::Postgres(s) => s.get_version(gun, role, version).await,
        }
    }

    async fn delete(&self, gun: &Gun) -> Result<()> {
        match self {
            AnyMetaStore::Memory(s) => s.delete(gun).await,
            AnyMetaStore::Postgres(s) => s.delete(gun).await,
        }
    }

    async fn get_changes(
        &self,
        since_id: Option<i64>,
        page_size: u32,
        filter_gun: Option<&Gun>,
        reversed: bool,
    ) -> Result<Vec<ChangeRecord>> {
        match self {
            AnyMetaStore::Memory(s) => s.get_changes(since_id, page_size, filter_gun, reversed).await,
            AnyMetaStore::Postgres(s) => {
                s.get_changes(since_id, page_size, filter_gun, reversed).await
            }
        }
    }

    async fn health_check(&self) -> Result<()> {
        match self {
            AnyMetaStore::Memory(s) => s.health_check().await,
            AnyMetaStore::Postgres(s) => s.health_check().await,
        }
    }
}
