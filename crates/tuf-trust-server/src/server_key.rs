//! The server-key policy layer between the trust server and the signing service (spec §4.E).
//!
//! State per (gun, role) — the list of historical keys and their created-at/active-at timestamps
//! — lives entirely in `tuf-signer`'s key database; this type never keeps its own index. It asks
//! the signer, over [`tuf_signer::client::SignerClient`], for "every key on record for this
//! (gun, role)" and applies the `GetOrCreate`/`Rotate`/tie-break policy to the answer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tuf_core::crypto::SignatureScheme;
use tuf_signer::client::{RemoteKeyInfo, SignerClient};

use crate::error::ApiError;

/// Roles the server key manager governs (spec §4.E: `role ∈ {snapshot, timestamp}`).
pub const MANAGED_ROLES: &[&str] = &["snapshot", "timestamp"];

/// Rejects a role the server key manager does not govern (spec §4.D.3 `InvalidRole`).
pub fn require_managed_role(role: &str) -> Result<(), ApiError> {
    if MANAGED_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(ApiError::InvalidRole(role.to_string()))
    }
}

/// Policy layer implementing `GetOrCreate`/`Rotate` (spec §4.E) over a [`SignerClient`].
pub struct ServerKeyManager<C> {
    client: Arc<C>,
    rotate_once_per: Duration,
}

impl<C: SignerClient> ServerKeyManager<C> {
    /// Construct a manager backed by `client`, enforcing `rotate_once_per` between successive
    /// pending-key creations for the same (gun, role).
    pub fn new(client: Arc<C>, rotate_once_per: Duration) -> Self {
        ServerKeyManager { client, rotate_once_per }
    }

    /// **GetOrCreate**: if a key exists for (gun, role), return the most-recently-used one
    /// (by `active_at` if set, else `created_at`); otherwise create one with `desired_algorithm`.
    pub async fn get_or_create(
        &self,
        gun: &str,
        role: &str,
        desired_algorithm: SignatureScheme,
    ) -> Result<RemoteKeyInfo, ApiError> {
        require_managed_role(role)?;
        let keys = self.client.keys_for_role(gun, role).await?;
        if let Some(existing) = most_recently_used(&keys) {
            return Ok(existing.clone());
        }

        self.client.create_key(role, gun, desired_algorithm).await?;
        self.refetch_newest(gun, role).await
    }

    /// **Rotate**: fails with `CannotRotateYet` if a pending key created within
    /// `rotate_once_per` already exists; otherwise creates a new pending key.
    pub async fn rotate(
        &self,
        gun: &str,
        role: &str,
        desired_algorithm: SignatureScheme,
    ) -> Result<RemoteKeyInfo, ApiError> {
        require_managed_role(role)?;
        let keys = self.client.keys_for_role(gun, role).await?;
        let now = Utc::now();
        if keys
            .iter()
            .any(|k| k.is_pending() && within_window(k.created_at, now, self.rotate_once_per))
        {
            return Err(ApiError::CannotRotateYet);
        }

        self.client.create_key(role, gun, desired_algorithm).await?;
        self.refetch_newest(gun, role).await
    }

    async fn refetch_newest(&self, gun: &str, role: &str) -> Result<RemoteKeyInfo, ApiError> {
        let keys = self.client.keys_for_role(gun, role).await?;
        most_recently_used(&keys).cloned().ok_or_else(|| {
            ApiError::StorageFailure
        })
    }
}

fn within_window(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(created_at) < window
}

/// "Most recently used" ordering (spec §4.E): by `active_at` if set, else `created_at`.
/// Ties (e.g. two pending keys created in the same instant) are broken by the lexicographically
/// larger key-id, for deterministic tests.
fn most_recently_used(keys: &[RemoteKeyInfo]) -> Option<&RemoteKeyInfo> {
    keys.iter().max_by(|a, b| {
        let a_ts = a.active_at.unwrap_or(a.created_at);
        let b_ts = b.active_at.unwrap_or(b.created_at);
        a_ts.cmp(&b_ts).then_with(|| a.key_id.to_string().cmp(&b.key_id.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tuf_core::crypto::{KeyId, PrivateKey, PublicKey, Signature};
    use tuf_signer::Result as SignerResult;

    /// An in-process `SignerClient` double backed by a plain `Vec`, for exercising
    /// `ServerKeyManager` without a real gRPC server (spec §9's testability requirement).
    #[derive(Default)]
    struct FakeSignerClient {
        keys: Mutex<Vec<RemoteKeyInfo>>,
    }

    #[async_trait]
    impl SignerClient for FakeSignerClient {
        async fn create_key(&self, _role: &str, _gun: &str, scheme: SignatureScheme) -> SignerResult<PublicKey> {
            let (private_key, _der) = PrivateKey::generate(scheme).unwrap();
            let public_key = private_key.public().clone();
            self.keys.lock().unwrap().push(RemoteKeyInfo {
                key_id: public_key.key_id().clone(),
                public_key: public_key.clone(),
                created_at: Utc::now(),
                active_at: None,
            });
            Ok(public_key)
        }

        async fn get_key_info(&self, key_id: &KeyId) -> SignerResult<(PublicKey, String)> {
            let keys = self.keys.lock().unwrap();
            keys.iter()
                .find(|k| &k.key_id == key_id)
                .map(|k| (k.public_key.clone(), "snapshot".to_string()))
                .ok_or_else(|| tuf_signer::Error::KeyNotFound(key_id.to_string()))
        }

        async fn delete_key(&self, key_id: &KeyId) -> SignerResult<()> {
            self.keys.lock().unwrap().retain(|k| &k.key_id != key_id);
            Ok(())
        }

        async fn sign(&self, _key_id: &KeyId, _payload: &[u8]) -> SignerResult<Signature> {
            unimplemented!("not exercised by ServerKeyManager tests")
        }

        async fn keys_for_role(&self, _gun: &str, _role: &str) -> SignerResult<Vec<RemoteKeyInfo>> {
            Ok(self.keys.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let client = Arc::new(FakeSignerClient::default());
        let manager = ServerKeyManager::new(client, Duration::hours(24));

        let first = manager.get_or_create("example/foo", "timestamp", SignatureScheme::Ed25519).await.unwrap();
        let second = manager.get_or_create("example/foo", "timestamp", SignatureScheme::Ed25519).await.unwrap();

        assert_eq!(first.key_id, second.key_id);
    }

    #[tokio::test]
    async fn rotate_twice_within_window_fails_second_call() {
        let client = Arc::new(FakeSignerClient::default());
        let manager = ServerKeyManager::new(client, Duration::hours(24));

        let first = manager.rotate("example/foo", "timestamp", SignatureScheme::Ed25519).await.unwrap();
        let second = manager.rotate("example/foo", "timestamp", SignatureScheme::Ed25519).await;

        assert!(matches!(second, Err(ApiError::CannotRotateYet)));

        let current = manager.get_or_create("example/foo", "timestamp", SignatureScheme::Ed25519).await.unwrap();
        assert_eq!(current.key_id, first.key_id);
    }

    #[tokio::test]
    async fn invalid_role_is_rejected() {
        let client = Arc::new(FakeSignerClient::default());
        let manager = ServerKeyManager::new(client, Duration::hours(24));

        let result = manager.get_or_create("example/foo", "root", SignatureScheme::Ed25519).await;
        assert!(matches!(result, Err(ApiError::InvalidRole(_))));
    }
}
