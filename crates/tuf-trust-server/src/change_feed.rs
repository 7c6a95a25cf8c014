//! The change feed (spec §4.F): pagination over `MetaStore`'s change journal.
//!
//! This module owns only query parsing and the `page_size` default/cap; the ordering and
//! contiguity contract itself lives in `MetaStore::get_changes` (spec §4.A), since a backend's
//! transaction boundary is what actually guarantees "no gaps within a single call."

use serde_derive::{Deserialize, Serialize};
use tuf_metastore::{ChangeRecord, Gun, MetaStore};

use crate::error::ApiError;

/// Query parameters for both the per-GUN and global change-feed endpoints (spec §6: `change_id`,
/// `records`, `reversed`). The original Notary sources show two shapes for this query
/// (`records` vs `page_size`, with/without `reversed`); this implementation picks `change_id` /
/// `records` / `reversed`, matching spec.md §6's HTTP surface table verbatim (see `DESIGN.md`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeFeedQuery {
    /// The sequence id to page from. Absent means "from the beginning" (`!reversed`) or "from
    /// the end" (`reversed`).
    pub change_id: Option<String>,
    /// Maximum records to return. `0` or absent defaults to the configured page size.
    pub records: Option<i64>,
    /// Return records in decreasing sequence-id order strictly before `change_id`.
    #[serde(default)]
    pub reversed: bool,
}

/// A change-feed page as returned over HTTP.
#[derive(Debug, Serialize)]
pub struct ChangeFeedPage {
    pub records: Vec<ChangeRecord>,
}

fn parse_since_id(change_id: &Option<String>) -> Result<Option<i64>, ApiError> {
    match change_id {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::InvalidInput(format!("change_id is not an integer: {s:?}"))),
    }
}

/// Clamp a caller-supplied page size to `[0, i32::MAX]`, defaulting `0`/absent to
/// `default_page_size` (spec §4.F: "capped at 32-bit signed").
fn resolve_page_size(records: Option<i64>, default_page_size: u32) -> Result<u32, ApiError> {
    match records {
        None => Ok(default_page_size),
        Some(n) if n < 0 => Err(ApiError::InvalidInput("records must not be negative".into())),
        Some(0) => Ok(default_page_size),
        Some(n) => Ok(n.min(i32::MAX as i64) as u32),
    }
}

/// List a page of changes for `filter_gun` (or the whole journal if `None`), per `query`.
pub async fn list_changes(
    store: &impl MetaStore,
    query: &ChangeFeedQuery,
    filter_gun: Option<&Gun>,
    default_page_size: u32,
) -> Result<ChangeFeedPage, ApiError> {
    let since_id = parse_since_id(&query.change_id)?;
    let page_size = resolve_page_size(query.records, default_page_size)?;

    let records = store
        .get_changes(since_id, page_size, filter_gun, query.reversed)
        .await?;

    Ok(ChangeFeedPage { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuf_metastore::memory::InMemoryMetaStore;
    use tuf_metastore::MetaUpdate;

    async fn seeded_store() -> InMemoryMetaStore {
        let store = InMemoryMetaStore::new();
        let gun = Gun::new("example/foo").unwrap();
        for v in 1..=3u32 {
            let path = tuf_core::metadata::MetadataPath::new("targets".to_string()).unwrap();
            store
                .update_current(&gun, MetaUpdate::new(path, v, format!("v{v}").into_bytes()))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn default_page_size_applies_when_records_is_zero_or_absent() {
        let store = seeded_store().await;
        let query = ChangeFeedQuery { change_id: None, records: Some(0), reversed: false };
        let page = list_changes(&store, &query, None, 2).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, 1);
        assert_eq!(page.records[1].id, 2);
    }

    #[tokio::test]
    async fn paging_after_an_id_resumes_where_it_left_off() {
        let store = seeded_store().await;
        let query = ChangeFeedQuery {
            change_id: Some("2".to_string()),
            records: Some(100),
            reversed: false,
        };
        let page = list_changes(&store, &query, None, 100).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, 3);
    }

    #[tokio::test]
    async fn negative_records_is_rejected() {
        let store = seeded_store().await;
        let query = ChangeFeedQuery { change_id: None, records: Some(-1), reversed: false };
        let result = list_changes(&store, &query, None, 100).await;
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn malformed_change_id_is_rejected() {
        let store = seeded_store().await;
        let query = ChangeFeedQuery {
            change_id: Some("not-a-number".to_string()),
            records: None,
            reversed: false,
        };
        let result = list_changes(&store, &query, None, 100).await;
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }
}
