//! An in-memory `MetaStore`, used by the trust server's test suite and for local development
//! without a Postgres instance.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use ring::digest::{digest, SHA256};
use tokio::sync::Mutex;
use tuf_core::metadata::MetadataPath;

use crate::change::{ChangeCategory, ChangeRecord};
use crate::error::Error;
use crate::model::{Gun, MetaUpdate};
use crate::store::{MetaStore, DEFAULT_CHANGE_PAGE_SIZE};
use crate::Result;

#[derive(Clone)]
struct StoredVersion {
    created_at: DateTime<Utc>,
    bytes: Vec<u8>,
    sha256_hex: String,
}

#[derive(Default)]
struct RoleHistory {
    versions: BTreeMap<u32, StoredVersion>,
}

impl RoleHistory {
    fn current_version(&self) -> Option<u32> {
        self.versions.keys().next_back().copied()
    }
}

#[derive(Default)]
struct GunState {
    roles: HashMap<String, RoleHistory>,
}

#[derive(Default)]
struct Inner {
    guns: HashMap<String, GunState>,
    journal: Vec<ChangeRecord>,
    next_id: i64,
}

fn sha256_hex(bytes: &[u8]) -> String {
    HEXLOWER.encode(digest(&SHA256, bytes).as_ref())
}

/// An in-memory, process-local implementation of [`MetaStore`]. All operations are guarded by a
/// single async mutex: correct, but not a model for the concurrency the Postgres backend affords
/// disjoint (gun, role) pairs.
pub struct InMemoryMetaStore {
    inner: Mutex<Inner>,
}

impl InMemoryMetaStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        InMemoryMetaStore {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for InMemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn append_change(
        &mut self,
        gun: &Gun,
        category: ChangeCategory,
        role: String,
        version: u32,
        sha256_hex: String,
    ) {
        self.next_id += 1;
        self.journal.push(ChangeRecord {
            id: self.next_id,
            created_at: Utc::now(),
            gun: gun.clone(),
            category,
            role,
            version,
            sha256_hex,
        });
    }

    fn check_update(&self, gun: &Gun, update: &MetaUpdate) -> Result<()> {
        let current = self
            .guns
            .get(gun.as_str())
            .and_then(|g| g.roles.get(update.role.to_string().as_str()))
            .and_then(|h| h.current_version());
        let ok = match current {
            Some(v) => update.version > v,
            None => true,
        };
        if !ok {
            return Err(Error::VersionConflict {
                gun: gun.as_str().to_string(),
                role: update.role.to_string(),
                attempted: update.version,
                current,
            });
        }
        Ok(())
    }

    fn apply_update(&mut self, gun: &Gun, update: MetaUpdate) {
        let sha = sha256_hex(&update.bytes);
        let gun_state = self.guns.entry(gun.as_str().to_string()).or_default();
        let history = gun_state.roles.entry(update.role.to_string()).or_default();
        history.versions.insert(
            update.version,
            StoredVersion {
                created_at: Utc::now(),
                bytes: update.bytes,
                sha256_hex: sha.clone(),
            },
        );
        self.append_change(
            gun,
            ChangeCategory::Update,
            update.role.to_string(),
            update.version,
            sha,
        );
    }
}

#[async_trait]
impl MetaStore for InMemoryMetaStore {
    async fn bootstrap(&self) -> Result<()> {
        Ok(())
    }

    async fn update_current(&self, gun: &Gun, update: MetaUpdate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.check_update(gun, &update)?;
        inner.apply_update(gun, update);
        Ok(())
    }

    async fn update_many(&self, gun: &Gun, updates: Vec<MetaUpdate>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for update in &updates {
            inner.check_update(gun, update)?;
        }
        for update in updates {
            inner.apply_update(gun, update);
        }
        Ok(())
    }

    async fn get_current(&self, gun: &Gun, role: &MetadataPath) -> Result<(DateTime<Utc>, Vec<u8>)> {
        let inner = self.inner.lock().await;
        let version = inner
            .guns
            .get(gun.as_str())
            .and_then(|g| g.roles.get(role.to_string().as_str()))
            .and_then(|h| h.versions.values().next_back())
            .ok_or_else(|| Error::NotFound(format!("{}/{}", gun, role.to_string())))?;
        Ok((version.created_at, version.bytes.clone()))
    }

    async fn get_checksum(
        &self,
        gun: &Gun,
        role: &MetadataPath,
        checksum_hex: &str,
    ) -> Result<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner
            .guns
            .get(gun.as_str())
            .and_then(|g| g.roles.get(role.to_string().as_str()))
            .and_then(|h| h.versions.values().find(|v| v.sha256_hex == checksum_hex))
            .map(|v| v.bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("{}/{}@{}", gun, role.to_string(), checksum_hex)))
    }

    async fn get_version(&self, gun: &Gun, role: &MetadataPath, version: u32) -> Result<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner
            .guns
            .get(gun.as_str())
            .and_then(|g| g.roles.get(role.to_string().as_str()))
            .and_then(|h| h.versions.get(&version))
            .map(|v| v.bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("{}/{}@v{}", gun, role.to_string(), version)))
    }

    async fn delete(&self, gun: &Gun) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.guns.remove(gun.as_str());
        inner.append_change(gun, ChangeCategory::Deletion, String::new(), 0, String::new());
        Ok(())
    }

    async fn get_changes(
        &self,
        since_id: Option<i64>,
        page_size: u32,
        filter_gun: Option<&Gun>,
        reversed: bool,
    ) -> Result<Vec<ChangeRecord>> {
        let page_size = if page_size == 0 {
            DEFAULT_CHANGE_PAGE_SIZE
        } else {
            page_size
        } as usize;

        let inner = self.inner.lock().await;
        let matches = |r: &&ChangeRecord| -> bool {
            filter_gun.map(|g| &r.gun == g).unwrap_or(true)
        };

        let records: Vec<ChangeRecord> = if reversed {
            let upper = since_id.unwrap_or(i64::MAX);
            inner
                .journal
                .iter()
                .rev()
                .filter(|r| r.id < upper)
                .filter(matches)
                .take(page_size)
                .cloned()
                .collect()
        } else {
            let lower = since_id.unwrap_or(0);
            inner
                .journal
                .iter()
                .filter(|r| r.id > lower)
                .filter(matches)
                .take(page_size)
                .cloned()
                .collect()
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuf_core::metadata::MetadataPath;

    fn gun(s: &str) -> Gun {
        Gun::new(s).unwrap()
    }

    fn path(s: &str) -> MetadataPath {
        MetadataPath::new(s.to_string()).unwrap()
    }

    #[tokio::test]
    async fn monotonic_version_enforced() {
        let store = InMemoryMetaStore::new();
        let g = gun("example/foo");
        store
            .update_current(&g, MetaUpdate::new(path("targets"), 1, b"v1".to_vec()))
            .await
            .unwrap();

        let err = store
            .update_current(&g, MetaUpdate::new(path("targets"), 1, b"v1-again".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionConflict { .. }));

        let (_, bytes) = store.get_current(&g, &path("targets")).await.unwrap();
        assert_eq!(bytes, b"v1".to_vec());
    }

    #[tokio::test]
    async fn update_many_is_all_or_nothing() {
        let store = InMemoryMetaStore::new();
        let g = gun("example/foo");
        store
            .update_current(&g, MetaUpdate::new(path("targets"), 1, b"v1".to_vec()))
            .await
            .unwrap();

        let err = store
            .update_many(
                &g,
                vec![
                    MetaUpdate::new(path("root"), 1, b"root-v1".to_vec()),
                    MetaUpdate::new(path("targets"), 1, b"targets-v1-again".to_vec()),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionConflict { .. }));

        // root must not have been written since the batch failed atomically.
        assert!(matches!(
            store.get_current(&g, &path("root")).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn checksum_and_version_reads_are_byte_exact() {
        let store = InMemoryMetaStore::new();
        let g = gun("example/foo");
        store
            .update_current(&g, MetaUpdate::new(path("targets"), 1, b"hello".to_vec()))
            .await
            .unwrap();
        let checksum = sha256_hex(b"hello");

        let by_checksum = store.get_checksum(&g, &path("targets"), &checksum).await.unwrap();
        assert_eq!(by_checksum, b"hello".to_vec());

        let by_version = store.get_version(&g, &path("targets"), 1).await.unwrap();
        assert_eq!(by_version, b"hello".to_vec());
    }

    #[tokio::test]
    async fn change_feed_pages_in_order() {
        let store = InMemoryMetaStore::new();
        let g = gun("example/foo");
        for (role, version) in [("root", 1u32), ("targets", 1), ("snapshot", 1)] {
            store
                .update_current(&g, MetaUpdate::new(path(role), version, role.as_bytes().to_vec()))
                .await
                .unwrap();
        }

        let first_page = store.get_changes(None, 2, None, false).await.unwrap();
        assert_eq!(first_page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);

        let second_page = store
            .get_changes(Some(first_page.last().unwrap().id), 100, None, false)
            .await
            .unwrap();
        assert_eq!(second_page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn delete_emits_one_deletion_record() {
        let store = InMemoryMetaStore::new();
        let g = gun("example/foo");
        store
            .update_current(&g, MetaUpdate::new(path("root"), 1, b"root".to_vec()))
            .await
            .unwrap();
        store.delete(&g).await.unwrap();

        assert!(matches!(
            store.get_current(&g, &path("root")).await.unwrap_err(),
            Error::NotFound(_)
        ));

        let changes = store.get_changes(None, 100, None, false).await.unwrap();
        let deletion = changes.last().unwrap();
        assert_eq!(deletion.category, ChangeCategory::Deletion);
        assert_eq!(deletion.role, "");
    }
}
