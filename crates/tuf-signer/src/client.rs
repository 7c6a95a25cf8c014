//! The client-side view of the signing service used by `tuf-trust-server`'s `ServerKeyManager`
//! (spec §4.E) to create keys and request signatures without depending on `tuf-keydb` directly.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tonic::transport::Channel;
use tuf_core::crypto::{KeyId, PublicKey, Signature, SignatureScheme};

use crate::proto::key_management_client::KeyManagementClient;
use crate::proto::signer_client::SignerClient as RawSignerClient;
use crate::proto::{
    Algorithm, CreateKeyRequest, GetKeysForRoleRequest, KeyIdRequest, PublicKeyInfo, SignRequest,
};
use crate::Result;

/// A key as reported by [`SignerClient::keys_for_role`]: enough of [`tuf_keydb::KeyRecord`] for
/// `ServerKeyManager` (trust-server component E) to apply the `GetOrCreate`/`Rotate`/tie-break
/// policy (spec §4.E) without the trust server keeping its own key index.
#[derive(Debug, Clone)]
pub struct RemoteKeyInfo {
    /// The key's id.
    pub key_id: KeyId,
    /// The key's public material and algorithm.
    pub public_key: PublicKey,
    /// When the key was created.
    pub created_at: DateTime<Utc>,
    /// When the key first signed a published artifact, if ever.
    pub active_at: Option<DateTime<Utc>>,
}

impl RemoteKeyInfo {
    /// Whether this key has never signed a published artifact.
    pub fn is_pending(&self) -> bool {
        self.active_at.is_none()
    }
}

fn info_to_remote_key(info: PublicKeyInfo) -> Result<RemoteKeyInfo> {
    let scheme = match crate::proto::Algorithm::from_i32(info.algorithm) {
        Some(crate::proto::Algorithm::Ed25519) => SignatureScheme::Ed25519,
        Some(crate::proto::Algorithm::Ecdsa) => SignatureScheme::Ecdsa,
        Some(crate::proto::Algorithm::Rsa) => SignatureScheme::Rsa,
        _ => return Err(crate::Error::InvalidInput("unknown algorithm in response".into())),
    };
    let active_at = if info.active_at_unix > 0 {
        Some(Utc.timestamp_opt(info.active_at_unix, 0).single().unwrap_or_else(Utc::now))
    } else {
        None
    };
    Ok(RemoteKeyInfo {
        key_id: KeyId::from_string(info.key_id),
        public_key: PublicKey::new(scheme, info.public_key),
        created_at: Utc
            .timestamp_opt(info.created_at_unix, 0)
            .single()
            .unwrap_or_else(Utc::now),
        active_at,
    })
}

fn scheme_to_algorithm(scheme: SignatureScheme) -> Algorithm {
    match scheme {
        SignatureScheme::Ed25519 => Algorithm::Ed25519,
        SignatureScheme::Ecdsa => Algorithm::Ecdsa,
        SignatureScheme::Rsa => Algorithm::Rsa,
    }
}

/// What `ServerKeyManager` needs from the signing service: create a key for a (gun, role), and
/// sign a payload with a key it already created. Abstracted as a trait so tests can substitute an
/// in-process double instead of standing up a real gRPC server.
#[async_trait]
pub trait SignerClient: Send + Sync {
    /// Generate a new keypair for `role`/`gun` and return its public half.
    async fn create_key(&self, role: &str, gun: &str, scheme: SignatureScheme) -> Result<PublicKey>;

    /// The public material for an existing key, or `KeyNotFound`.
    async fn get_key_info(&self, key_id: &KeyId) -> Result<(PublicKey, String)>;

    /// Delete a key. Idempotent.
    async fn delete_key(&self, key_id: &KeyId) -> Result<()>;

    /// Sign `payload` with the named key, marking it active (spec §3 lifecycle, §4.C `Sign`).
    async fn sign(&self, key_id: &KeyId, payload: &[u8]) -> Result<Signature>;

    /// Every key on record for `(gun, role)`, most-recently-created first (spec §4.E).
    async fn keys_for_role(&self, gun: &str, role: &str) -> Result<Vec<RemoteKeyInfo>>;
}

/// A `SignerClient` backed by a real gRPC channel to a `tuf-signerd` process.
#[derive(Clone)]
pub struct GrpcSignerClient {
    key_management: KeyManagementClient<Channel>,
    signer: RawSignerClient<Channel>,
}

impl GrpcSignerClient {
    /// Connect to a signer endpoint, e.g. `"https://signer.internal:7899"`. TLS/mTLS
    /// configuration is supplied by the caller via `channel`'s builder before this is called.
    pub fn new(channel: Channel) -> Self {
        GrpcSignerClient {
            key_management: KeyManagementClient::new(channel.clone()),
            signer: RawSignerClient::new(channel),
        }
    }
}

#[async_trait]
impl SignerClient for GrpcSignerClient {
    async fn create_key(&self, role: &str, gun: &str, scheme: SignatureScheme) -> Result<PublicKey> {
        let mut client = self.key_management.clone();
        let response = client
            .create_key(CreateKeyRequest {
                role: role.to_string(),
                algorithm: scheme_to_algorithm(scheme) as i32,
                gun: gun.to_string(),
            })
            .await
            .map_err(crate::Error::from)?
            .into_inner();
        Ok(PublicKey::new(scheme, response.public_key))
    }

    async fn get_key_info(&self, key_id: &KeyId) -> Result<(PublicKey, String)> {
        let mut client = self.key_management.clone();
        let response = client
            .get_key_info(KeyIdRequest { key_id: key_id.to_string() })
            .await
            .map_err(crate::Error::from)?
            .into_inner();
        let scheme = match crate::proto::Algorithm::from_i32(response.algorithm) {
            Some(crate::proto::Algorithm::Ed25519) => SignatureScheme::Ed25519,
            Some(crate::proto::Algorithm::Ecdsa) => SignatureScheme::Ecdsa,
            Some(crate::proto::Algorithm::Rsa) => SignatureScheme::Rsa,
            _ => return Err(crate::Error::InvalidInput("unknown algorithm in response".into())),
        };
        Ok((PublicKey::new(scheme, response.public_key), response.role))
    }

    async fn delete_key(&self, key_id: &KeyId) -> Result<()> {
        let mut client = self.key_management.clone();
        client
            .delete_key(KeyIdRequest { key_id: key_id.to_string() })
            .await
            .map_err(crate::Error::from)?;
        Ok(())
    }

    async fn sign(&self, key_id: &KeyId, payload: &[u8]) -> Result<Signature> {
        let mut client = self.signer.clone();
        let response = client
            .sign(SignRequest { key_id: key_id.to_string(), payload: payload.to_vec() })
            .await
            .map_err(crate::Error::from)?
            .into_inner();

        // The wire response carries key-id/method/signature separately; reconstruct a typed
        // `Signature` the same way `tuf_core::crypto::PrivateKey::sign` would have produced it.
        reconstruct_signature(response.key_id, response.method, response.signature)
    }

    async fn keys_for_role(&self, gun: &str, role: &str) -> Result<Vec<RemoteKeyInfo>> {
        let mut client = self.key_management.clone();
        let response = client
            .get_keys_for_role(GetKeysForRoleRequest { gun: gun.to_string(), role: role.to_string() })
            .await
            .map_err(crate::Error::from)?
            .into_inner();

        response.keys.into_iter().map(info_to_remote_key).collect()
    }
}

fn reconstruct_signature(key_id: String, method: String, value: Vec<u8>) -> Result<Signature> {
    let scheme: SignatureScheme = method.parse().map_err(crate::Error::from)?;
    Ok(Signature::from_parts(KeyId::from_string(key_id), scheme, value))
}
