//! The persisted key record (spec §3 `Key`, §6 `private_keys` table).

use chrono::{DateTime, Utc};
use tuf_core::crypto::{KeyId, PublicKey, SignatureScheme};

/// Everything the store knows about one key.
///
/// Invariant enforced by the owning [`crate::KeyDbStore`], not this struct: within a (gun, role)
/// pair, at most one `KeyRecord` may have `active_at.is_some()`.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    /// The canonical fingerprint of the public key.
    pub key_id: KeyId,
    /// The signing algorithm.
    pub algorithm: SignatureScheme,
    /// The GUN this key was created for.
    pub gun: String,
    /// The role this key was created for (`"snapshot"` or `"timestamp"` for server-managed
    /// keys; the signer also accepts arbitrary role names for generality).
    pub role: String,
    /// The public key material.
    pub public_key: PublicKey,
    /// The passphrase-wrapped private key bytes (see [`crate::encryption`]).
    pub encrypted_private: Vec<u8>,
    /// Which configured alias the wrapping passphrase was resolved from.
    pub passphrase_alias: String,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this key first signed a published artifact, if ever (spec §3 lifecycle).
    pub active_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Whether this key has never been used to sign a published artifact.
    pub fn is_pending(&self) -> bool {
        self.active_at.is_none()
    }
}
