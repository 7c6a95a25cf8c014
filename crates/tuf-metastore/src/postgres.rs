//! A Postgres-backed `MetaStore` (spec §6 persisted state layout: `tuf_files`, `current_tuf`,
//! `change_category`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use ring::digest::{digest, SHA256};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tuf_core::metadata::MetadataPath;

use crate::change::{ChangeCategory, ChangeRecord};
use crate::error::Error;
use crate::lock::{gun_key, gun_role_key, StripeLock};
use crate::model::{Gun, MetaUpdate};
use crate::store::{MetaStore, DEFAULT_CHANGE_PAGE_SIZE};
use crate::Result;

fn sha256_hex(bytes: &[u8]) -> String {
    HEXLOWER.encode(digest(&SHA256, bytes).as_ref())
}

/// A `MetaStore` backed by a Postgres connection pool.
///
/// Writes take an in-process stripe lock (spec §5) keyed on `(gun, role)` for the duration of
/// the read-current/compare/write transaction, since the version-monotonicity check and the
/// write it gates are not expressible as a single conditional Postgres statement without a
/// serializable transaction.
pub struct PostgresMetaStore {
    pool: PgPool,
    locks: StripeLock,
}

impl PostgresMetaStore {
    /// Connect to `database_url`, establishing a bounded connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(PostgresMetaStore {
            pool,
            locks: StripeLock::new(),
        })
    }

    /// Wrap an already-constructed pool (used by callers that share one pool across stores).
    pub fn from_pool(pool: PgPool) -> Self {
        PostgresMetaStore {
            pool,
            locks: StripeLock::new(),
        }
    }

    async fn current_version(&self, gun: &Gun, role: &str) -> Result<Option<u32>> {
        let row = sqlx::query(
            "SELECT version FROM current_tuf WHERE gun = $1 AND role = $2",
        )
        .bind(gun.as_str())
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<i32, _>("version") as u32))
    }

    async fn append_change(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        gun: &Gun,
        category: ChangeCategory,
        role: &str,
        version: u32,
        sha256_hex: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO change_category (created_at, gun, category, role, version, sha256)
             VALUES (now(), $1, $2, $3, $4, $5)",
        )
        .bind(gun.as_str())
        .bind(category.as_str())
        .bind(role)
        .bind(version as i32)
        .bind(sha256_hex)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn write_one(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        gun: &Gun,
        update: &MetaUpdate,
    ) -> Result<()> {
        let role = update.role.to_string();
        let sha = sha256_hex(&update.bytes);

        sqlx::query(
            "INSERT INTO tuf_files (gun, role, version, sha256, data, created_at)
             VALUES ($1, $2, $3, $4, $5, now())
             ON CONFLICT (gun, role, version) DO NOTHING",
        )
        .bind(gun.as_str())
        .bind(&role)
        .bind(update.version as i32)
        .bind(&sha)
        .bind(&update.bytes)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO current_tuf (gun, role, version)
             VALUES ($1, $2, $3)
             ON CONFLICT (gun, role) DO UPDATE SET version = excluded.version",
        )
        .bind(gun.as_str())
        .bind(&role)
        .bind(update.version as i32)
        .execute(&mut **tx)
        .await?;

        Self::append_change(tx, gun, ChangeCategory::Update, &role, update.version, &sha).await
    }
}

#[async_trait]
impl MetaStore for PostgresMetaStore {
    async fn bootstrap(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tuf_files (
                gun TEXT NOT NULL,
                role TEXT NOT NULL,
                version INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                data BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (gun, role, version)
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS current_tuf (
                gun TEXT NOT NULL,
                role TEXT NOT NULL,
                version INTEGER NOT NULL,
                PRIMARY KEY (gun, role)
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS change_category (
                id BIGSERIAL PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL,
                gun TEXT NOT NULL,
                category TEXT NOT NULL,
                role TEXT NOT NULL,
                version INTEGER NOT NULL,
                sha256 TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS change_category_gun_idx ON change_category (gun)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_current(&self, gun: &Gun, update: MetaUpdate) -> Result<()> {
        let _guard = self.locks.lock(&gun_role_key(gun.as_str(), &update.role.to_string())).await;

        let current = self.current_version(gun, &update.role.to_string()).await?;
        if current.map(|v| update.version <= v).unwrap_or(false) {
            return Err(Error::VersionConflict {
                gun: gun.as_str().to_string(),
                role: update.role.to_string(),
                attempted: update.version,
                current,
            });
        }

        let mut tx = self.pool.begin().await?;
        Self::write_one(&mut tx, gun, &update).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_many(&self, gun: &Gun, updates: Vec<MetaUpdate>) -> Result<()> {
        // Lock every targeted role, in a stable order, to avoid deadlocking against a concurrent
        // batch that targets an overlapping set of roles in a different order.
        let mut roles: Vec<String> = updates.iter().map(|u| u.role.to_string()).collect();
        roles.sort();
        roles.dedup();
        let mut guards = Vec::with_capacity(roles.len());
        for role in &roles {
            guards.push(self.locks.lock(&gun_role_key(gun.as_str(), role)).await);
        }

        for update in &updates {
            let current = self.current_version(gun, &update.role.to_string()).await?;
            if current.map(|v| update.version <= v).unwrap_or(false) {
                return Err(Error::VersionConflict {
                    gun: gun.as_str().to_string(),
                    role: update.role.to_string(),
                    attempted: update.version,
                    current,
                });
            }
        }

        let mut tx = self.pool.begin().await?;
        for update in &updates {
            Self::write_one(&mut tx, gun, update).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_current(&self, gun: &Gun, role: &MetadataPath) -> Result<(DateTime<Utc>, Vec<u8>)> {
        let row = sqlx::query(
            "SELECT f.created_at, f.data
             FROM tuf_files f
             JOIN current_tuf c ON c.gun = f.gun AND c.role = f.role AND c.version = f.version
             WHERE f.gun = $1 AND f.role = $2",
        )
        .bind(gun.as_str())
        .bind(role.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}", gun, role.to_string())))?;
        Ok((row.get("created_at"), row.get("data")))
    }

    async fn get_checksum(
        &self,
        gun: &Gun,
        role: &MetadataPath,
        checksum_hex: &str,
    ) -> Result<Vec<u8>> {
        let row = sqlx::query(
            "SELECT data FROM tuf_files WHERE gun = $1 AND role = $2 AND sha256 = $3",
        )
        .bind(gun.as_str())
        .bind(role.to_string())
        .bind(checksum_hex)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}@{}", gun, role.to_string(), checksum_hex)))?;
        Ok(row.get("data"))
    }

    async fn get_version(&self, gun: &Gun, role: &MetadataPath, version: u32) -> Result<Vec<u8>> {
        let row = sqlx::query(
            "SELECT data FROM tuf_files WHERE gun = $1 AND role = $2 AND version = $3",
        )
        .bind(gun.as_str())
        .bind(role.to_string())
        .bind(version as i32)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}@v{}", gun, role.to_string(), version)))?;
        Ok(row.get("data"))
    }

    async fn delete(&self, gun: &Gun) -> Result<()> {
        let _guard = self.locks.lock(&gun_key(gun.as_str())).await;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tuf_files WHERE gun = $1")
            .bind(gun.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM current_tuf WHERE gun = $1")
            .bind(gun.as_str())
            .execute(&mut *tx)
            .await?;
        Self::append_change(&mut tx, gun, ChangeCategory::Deletion, "", 0, "").await?;
        tx.commit().await?;
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
        } as i64;

        let rows = if reversed {
            let upper = since_id.unwrap_or(i64::MAX);
            sqlx::query(
                "SELECT id, created_at, gun, category, role, version, sha256
                 FROM change_category
                 WHERE id < $1 AND ($2::text IS NULL OR gun = $2)
                 ORDER BY id DESC
                 LIMIT $3",
            )
            .bind(upper)
            .bind(filter_gun.map(|g| g.as_str()))
            .bind(page_size)
            .fetch_all(&self.pool)
            .await?
        } else {
            let lower = since_id.unwrap_or(0);
            sqlx::query(
                "SELECT id, created_at, gun, category, role, version, sha256
                 FROM change_category
                 WHERE id > $1 AND ($2::text IS NULL OR gun = $2)
                 ORDER BY id ASC
                 LIMIT $3",
            )
            .bind(lower)
            .bind(filter_gun.map(|g| g.as_str()))
            .bind(page_size)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter()
            .map(|row| {
                let category: String = row.get("category");
                Ok(ChangeRecord {
                    id: row.get("id"),
                    created_at: row.get("created_at"),
                    gun: Gun::new(row.get::<String, _>("gun"))?,
                    category: category.parse()?,
                    role: row.get("role"),
                    version: row.get::<i32, _>("version") as u32,
                    sha256_hex: row.get("sha256"),
                })
            })
            .collect()
    }
}
