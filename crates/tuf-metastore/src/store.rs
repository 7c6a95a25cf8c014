//! The `MetaStore` trait (spec §4.A).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tuf_core::metadata::MetadataPath;

use crate::change::ChangeRecord;
use crate::model::{Gun, MetaUpdate};
use crate::Result;

/// The page size used when `GetChanges` is called with `pageSize == 0` (spec §4.F).
pub const DEFAULT_CHANGE_PAGE_SIZE: u32 = 100;

/// Abstract persistent storage for TUF metadata per (GUN, role, version) and the change journal
/// (spec §4.A). Implementations must serialize concurrent writes to the same (gun, role) and may
/// leave disjoint (gun, role) pairs unserialized.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Idempotent schema/index creation.
    async fn bootstrap(&self) -> Result<()>;

    /// Write a single role if its version strictly increases the current version for
    /// `(gun, update.role)`. Appends one `ChangeRecord` on success. Atomic over
    /// (bytes, current-pointer, journal).
    async fn update_current(&self, gun: &Gun, update: MetaUpdate) -> Result<()>;

    /// Write a set of roles atomically. Fails with `VersionConflict` if any element would not
    /// strictly increase its role's version; in that case none of the updates are applied.
    /// Appends exactly one `ChangeRecord` per updated role (`category = update`) on success.
    async fn update_many(&self, gun: &Gun, updates: Vec<MetaUpdate>) -> Result<()>;

    /// The highest-version bytes currently stored for `(gun, role)`.
    async fn get_current(&self, gun: &Gun, role: &MetadataPath) -> Result<(DateTime<Utc>, Vec<u8>)>;

    /// The bytes of a historical version selected by the hex sha256 of its bytes.
    async fn get_checksum(
        &self,
        gun: &Gun,
        role: &MetadataPath,
        checksum_hex: &str,
    ) -> Result<Vec<u8>>;

    /// The bytes of a historical version selected by explicit integer version.
    async fn get_version(&self, gun: &Gun, role: &MetadataPath, version: u32) -> Result<Vec<u8>>;

    /// Remove all roles for `gun`; appends one `ChangeRecord` with `category = deletion` and
    /// `role = ""` at the end of the journal.
    async fn delete(&self, gun: &Gun) -> Result<()>;

    /// Iterate the change journal.
    ///
    /// `since_id = None` means "from the beginning" if `!reversed`, or "from the end" if
    /// `reversed`. `page_size = 0` defaults to [`DEFAULT_CHANGE_PAGE_SIZE`]. `filter_gun = None`
    /// means no filter. `reversed` returns decreasing-id records strictly before `since_id`;
    /// otherwise increasing-id records strictly after `since_id`. The result is contiguous in
    /// journal order with no gaps.
    async fn get_changes(
        &self,
        since_id: Option<i64>,
        page_size: u32,
        filter_gun: Option<&Gun>,
        reversed: bool,
    ) -> Result<Vec<ChangeRecord>>;

    /// Returns `Ok(())` if the backend is reachable and the schema is present.
    async fn health_check(&self) -> Result<()> {
        self.bootstrap().await
    }
}
