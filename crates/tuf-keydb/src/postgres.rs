//! A Postgres-backed `KeyDbStore` (spec §6 `private_keys` table).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tuf_core::crypto::{KeyId, PrivateKey, PublicKey, SignatureScheme};

use crate::encryption;
use crate::error::Error;
use crate::model::KeyRecord;
use crate::passphrase::PassphraseRetriever;
use crate::store::KeyDbStore;
use crate::Result;

/// A `KeyDbStore` backed by a Postgres connection pool.
pub struct PostgresKeyDbStore<R> {
    pool: PgPool,
    retriever: R,
}

impl<R: PassphraseRetriever> PostgresKeyDbStore<R> {
    /// Connect to `database_url`, establishing a bounded connection pool.
    pub async fn connect(database_url: &str, max_connections: u32, retriever: R) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(PostgresKeyDbStore { pool, retriever })
    }

    /// Wrap an already-constructed pool.
    pub fn from_pool(pool: PgPool, retriever: R) -> Self {
        PostgresKeyDbStore { pool, retriever }
    }

    /// Idempotent schema creation for the `private_keys` table.
    pub async fn bootstrap(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS private_keys (
                key_id TEXT PRIMARY KEY,
                encryption_alg TEXT NOT NULL,
                keywrap_alg TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                passphrase_alias TEXT NOT NULL,
                gun TEXT NOT NULL,
                role TEXT NOT NULL,
                public BYTEA NOT NULL,
                private_encrypted BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                active_at TIMESTAMPTZ
             )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS private_keys_gun_role_idx ON private_keys (gun, role)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<KeyRecord> {
        let algorithm: String = row.get("algorithm");
        let algorithm: SignatureScheme = algorithm
            .parse()
            .map_err(|_| Error::StorageFailure(format!("unknown algorithm {:?}", algorithm)))?;
        let public_bytes: Vec<u8> = row.get("public");
        Ok(KeyRecord {
            key_id: KeyId::from_string(row.get::<String, _>("key_id")),
            algorithm,
            gun: row.get("gun"),
            role: row.get("role"),
            public_key: PublicKey::new(algorithm, public_bytes),
            encrypted_private: row.get("private_encrypted"),
            passphrase_alias: row.get("passphrase_alias"),
            created_at: row.get("created_at"),
            active_at: row.get::<Option<DateTime<Utc>>, _>("active_at"),
        })
    }
}

#[async_trait]
impl<R: PassphraseRetriever + Send + Sync> KeyDbStore for PostgresKeyDbStore<R> {
    async fn add_key(
        &self,
        role: &str,
        gun: &str,
        passphrase_alias: &str,
        private_key: &PrivateKey,
        pkcs8_der: &[u8],
    ) -> Result<()> {
        let passphrase = self.retriever.retrieve(passphrase_alias, 0)?;
        let encrypted_private = encryption::wrap(&passphrase, pkcs8_der)?;

        sqlx::query(
            "INSERT INTO private_keys
                (key_id, encryption_alg, keywrap_alg, algorithm, passphrase_alias, gun, role,
                 public, private_encrypted, created_at, active_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), NULL)
             ON CONFLICT (key_id) DO NOTHING",
        )
        .bind(private_key.key_id().value())
        .bind("aes-256-gcm")
        .bind("pbkdf2-hmac-sha256")
        .bind(private_key.public().scheme().to_string())
        .bind(passphrase_alias)
        .bind(gun)
        .bind(role)
        .bind(private_key.public().as_bytes())
        .bind(&encrypted_private)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_key(&self, key_id: &KeyId) -> Result<(PublicKey, String)> {
        let row = sqlx::query("SELECT algorithm, public, role FROM private_keys WHERE key_id = $1")
            .bind(key_id.value())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(key_id.to_string()))?;
        let algorithm: String = row.get("algorithm");
        let algorithm: SignatureScheme = algorithm
            .parse()
            .map_err(|_| Error::StorageFailure(format!("unknown algorithm {:?}", algorithm)))?;
        Ok((PublicKey::new(algorithm, row.get("public")), row.get("role")))
    }

    async fn get_private_key(&self, key_id: &KeyId) -> Result<(PrivateKey, String)> {
        let row = sqlx::query(
            "SELECT algorithm, private_encrypted, passphrase_alias, role FROM private_keys WHERE key_id = $1",
        )
        .bind(key_id.value())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(key_id.to_string()))?;

        let algorithm: String = row.get("algorithm");
        let algorithm: SignatureScheme = algorithm
            .parse()
            .map_err(|_| Error::StorageFailure(format!("unknown algorithm {:?}", algorithm)))?;
        let alias: String = row.get("passphrase_alias");
        let encrypted: Vec<u8> = row.get("private_encrypted");
        let role: String = row.get("role");

        let passphrase = self.retriever.retrieve(&alias, 0)?;
        let plaintext = encryption::unwrap(&passphrase, &encrypted, key_id.value())?;
        let private_key = PrivateKey::from_pkcs8(&plaintext, algorithm)?;
        Ok((private_key, role))
    }

    async fn remove_key(&self, key_id: &KeyId) -> Result<()> {
        sqlx::query("DELETE FROM private_keys WHERE key_id = $1")
            .bind(key_id.value())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_active(&self, key_id: &KeyId) -> Result<()> {
        sqlx::query(
            "UPDATE private_keys SET active_at = now() WHERE key_id = $1 AND active_at IS NULL",
        )
        .bind(key_id.value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn most_recent_key(&self, gun: &str, role: &str) -> Result<Option<KeyRecord>> {
        let row = sqlx::query(
            "SELECT key_id, algorithm, gun, role, public, private_encrypted, passphrase_alias,
                    created_at, active_at
             FROM private_keys
             WHERE gun = $1 AND role = $2
             ORDER BY COALESCE(active_at, created_at) DESC, key_id DESC
             LIMIT 1",
        )
        .bind(gun)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::row_to_record(&r)).transpose()
    }

    async fn keys_for(&self, gun: &str, role: &str) -> Result<Vec<KeyRecord>> {
        let rows = sqlx::query(
            "SELECT key_id, algorithm, gun, role, public, private_encrypted, passphrase_alias,
                    created_at, active_at
             FROM private_keys
             WHERE gun = $1 AND role = $2
             ORDER BY created_at DESC",
        )
        .bind(gun)
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
