//! The `KeyDbStore` trait (spec §4.B).

use async_trait::async_trait;
use tuf_core::crypto::{KeyId, PrivateKey, PublicKey};

use crate::Result;

/// Persistent key store keyed by key-id (spec §4.B).
#[async_trait]
pub trait KeyDbStore: Send + Sync {
    /// Write the encrypted private key, public key, algorithm, role, gun, and passphrase-alias
    /// for a newly generated key. `pkcs8_der` is the key's PKCS#8 encoding, captured at
    /// generation time (see [`tuf_core::crypto::PrivateKey::generate`]) since it cannot be
    /// re-derived from a live `PrivateKey` handle. Idempotent: if a record with the same key-id
    /// already exists, this succeeds without modifying it.
    async fn add_key(
        &self,
        role: &str,
        gun: &str,
        passphrase_alias: &str,
        private_key: &PrivateKey,
        pkcs8_der: &[u8],
    ) -> Result<()>;

    /// The public material and role for `key_id`, without touching the private key.
    async fn get_key(&self, key_id: &KeyId) -> Result<(PublicKey, String)>;

    /// Decrypt and return the private key for `key_id`, using the passphrase resolved from the
    /// record's configured alias. Fails with `WrongPassphrase` if decryption fails.
    async fn get_private_key(&self, key_id: &KeyId) -> Result<(PrivateKey, String)>;

    /// Delete the record for `key_id`.
    async fn remove_key(&self, key_id: &KeyId) -> Result<()>;

    /// Set `active_at` to now if it is currently null; otherwise a no-op.
    async fn mark_active(&self, key_id: &KeyId) -> Result<()>;

    /// The most-recently-used (by `active_at`, else `created_at`) key recorded for
    /// `(gun, role)`, if any (spec §4.E `GetOrCreate`/`Rotate` read the key list by this
    /// ordering; this query is the shared primitive both use).
    async fn most_recent_key(&self, gun: &str, role: &str) -> Result<Option<crate::KeyRecord>>;

    /// All keys recorded for `(gun, role)`, most-recently-created first.
    async fn keys_for(&self, gun: &str, role: &str) -> Result<Vec<crate::KeyRecord>>;

    /// `Ok(())` if the backend is reachable and the schema is present.
    async fn health_check(&self) -> Result<()>;
}
