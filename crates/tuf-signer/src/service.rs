//! Server-side implementation of the `KeyManagement`, `Signer`, and `Health` gRPC services
//! (spec §4.C).
//!
//! All three services share one `Arc<tuf_keydb::Cache<S>>` so that a `Sign` call benefits from
//! the same decrypted-key cache a prior `CreateKey` populated.

use std::sync::Arc;

use chrono::Utc;
use tonic::{Request, Response, Status};
use tuf_core::crypto::{KeyId, PrivateKey, SignatureScheme};
use tuf_keydb::{Cache, KeyDbStore, KeyRecord};

use crate::proto::health_server::Health;
use crate::proto::key_management_server::KeyManagement;
use crate::proto::signer_server::Signer;
use crate::proto::{
    Algorithm, CreateKeyRequest, DeleteKeyResponse, GetKeysForRoleRequest, GetKeysForRoleResponse,
    HealthCheckRequest, HealthCheckResponse, KeyIdRequest, PublicKeyInfo, SignRequest, SignResponse,
};

fn record_to_info(record: &KeyRecord) -> PublicKeyInfo {
    PublicKeyInfo {
        key_id: record.key_id.to_string(),
        role: record.role.clone(),
        algorithm: algorithm_from_scheme(record.algorithm) as i32,
        public_key: record.public_key.as_bytes().to_vec(),
        gun: record.gun.clone(),
        created_at_unix: record.created_at.timestamp(),
        active_at_unix: record.active_at.map(|t| t.timestamp()).unwrap_or(0),
    }
}

fn scheme_from_algorithm(alg: i32) -> Result<SignatureScheme, Status> {
    match Algorithm::from_i32(alg) {
        Some(Algorithm::Ed25519) => Ok(SignatureScheme::Ed25519),
        Some(Algorithm::Ecdsa) => Ok(SignatureScheme::Ecdsa),
        Some(Algorithm::Rsa) => Ok(SignatureScheme::Rsa),
        _ => Err(Status::invalid_argument("unspecified or unknown algorithm")),
    }
}

fn algorithm_from_scheme(scheme: SignatureScheme) -> Algorithm {
    match scheme {
        SignatureScheme::Ed25519 => Algorithm::Ed25519,
        SignatureScheme::Ecdsa => Algorithm::Ecdsa,
        SignatureScheme::Rsa => Algorithm::Rsa,
    }
}

/// `KeyManagement` + `Signer` service implementation, generic over the backing `KeyDbStore` so
/// the same code path serves both the in-memory store (dev-mode, tests) and the Postgres store.
pub struct SignerServiceImpl<S> {
    cache: Arc<Cache<S>>,
}

impl<S: KeyDbStore> SignerServiceImpl<S> {
    /// Wrap a key-database cache to expose it over gRPC.
    pub fn new(cache: Arc<Cache<S>>) -> Self {
        SignerServiceImpl { cache }
    }
}

impl<S: KeyDbStore> Clone for SignerServiceImpl<S> {
    fn clone(&self) -> Self {
        SignerServiceImpl { cache: self.cache.clone() }
    }
}

#[tonic::async_trait]
impl<S: KeyDbStore + 'static> KeyManagement for SignerServiceImpl<S> {
    async fn create_key(
        &self,
        request: Request<CreateKeyRequest>,
    ) -> Result<Response<PublicKeyInfo>, Status> {
        let req = request.into_inner();
        let scheme = scheme_from_algorithm(req.algorithm)?;
        if req.role.is_empty() {
            return Err(Status::invalid_argument("role must not be empty"));
        }

        let (private_key, pkcs8_der) =
            PrivateKey::generate(scheme).map_err(crate::Error::from)?;

        // The passphrase alias is the role name: snapshot and timestamp keys are wrapped under
        // distinct passphrases, matching `serverKey`'s per-role key lifecycle (spec §4.E).
        self.cache
            .add_key(&req.role, &req.gun, &req.role, &private_key, &pkcs8_der)
            .await
            .map_err(crate::Error::from)?;

        Ok(Response::new(PublicKeyInfo {
            key_id: private_key.key_id().to_string(),
            role: req.role,
            algorithm: algorithm_from_scheme(scheme) as i32,
            public_key: private_key.public().as_bytes().to_vec(),
            gun: req.gun,
            created_at_unix: Utc::now().timestamp(),
            active_at_unix: 0,
        }))
    }

    async fn get_key_info(
        &self,
        request: Request<KeyIdRequest>,
    ) -> Result<Response<PublicKeyInfo>, Status> {
        let req = request.into_inner();
        let key_id = KeyId::from_string(req.key_id.clone());
        let (public_key, role) = self
            .cache
            .get_key(&key_id)
            .await
            .map_err(crate::Error::from)?;

        Ok(Response::new(PublicKeyInfo {
            key_id: req.key_id,
            role,
            algorithm: algorithm_from_scheme(public_key.scheme()) as i32,
            public_key: public_key.as_bytes().to_vec(),
            gun: String::new(),
            created_at_unix: 0,
            active_at_unix: 0,
        }))
    }

    async fn get_keys_for_role(
        &self,
        request: Request<GetKeysForRoleRequest>,
    ) -> Result<Response<GetKeysForRoleResponse>, Status> {
        let req = request.into_inner();
        let records = self
            .cache
            .keys_for(&req.gun, &req.role)
            .await
            .map_err(crate::Error::from)?;

        Ok(Response::new(GetKeysForRoleResponse {
            keys: records.iter().map(record_to_info).collect(),
        }))
    }

    async fn delete_key(
        &self,
        request: Request<KeyIdRequest>,
    ) -> Result<Response<DeleteKeyResponse>, Status> {
        let req = request.into_inner();
        let key_id = KeyId::from_string(req.key_id);
        // Idempotent: removing an already-absent key is not an error (spec §4.C).
        self.cache.remove_key(&key_id).await.map_err(crate::Error::from)?;
        Ok(Response::new(DeleteKeyResponse {}))
    }
}

#[tonic::async_trait]
impl<S: KeyDbStore + 'static> Signer for SignerServiceImpl<S> {
    async fn sign(&self, request: Request<SignRequest>) -> Result<Response<SignResponse>, Status> {
        let req = request.into_inner();
        let key_id = KeyId::from_string(req.key_id.clone());

        let private_key = self
            .cache
            .get_private_key(&key_id)
            .await
            .map_err(crate::Error::from)?;

        let signature = private_key.sign(&req.payload).map_err(crate::Error::from)?;

        // The first signature made with a key transitions it from pending to active (spec §3
        // `Key` lifecycle). `mark_active` is idempotent, so we do not need to check first.
        self.cache.mark_active(&key_id).await.map_err(crate::Error::from)?;

        Ok(Response::new(SignResponse {
            key_id: req.key_id,
            method: signature.scheme().to_string(),
            signature: signature.value().to_vec(),
        }))
    }
}

/// The logical service names recognized by [`HealthServiceImpl::check`], matching the two gRPC
/// services this crate exposes.
const KNOWN_SERVICES: &[&str] = &["", "tuf.signer.v1.KeyManagement", "tuf.signer.v1.Signer"];

/// `Health` service implementation (spec §4.C "A separate `Health` service reports per-logical-
/// service serving status").
pub struct HealthServiceImpl<S> {
    cache: Arc<Cache<S>>,
}

impl<S: KeyDbStore> HealthServiceImpl<S> {
    /// Construct a health service backed by the same cache (and therefore the same underlying
    /// store) the other services use.
    pub fn new(cache: Arc<Cache<S>>) -> Self {
        HealthServiceImpl { cache }
    }
}

#[tonic::async_trait]
impl<S: KeyDbStore + 'static> Health for HealthServiceImpl<S> {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        use crate::proto::health_check_response::ServingStatus;

        let service = request.into_inner().service;
        if !KNOWN_SERVICES.contains(&service.as_str()) {
            return Ok(Response::new(HealthCheckResponse {
                status: ServingStatus::ServiceUnknown as i32,
            }));
        }

        let status = match self.cache.health_check().await {
            Ok(()) => ServingStatus::Serving,
            Err(_) => ServingStatus::NotServing,
        };

        Ok(Response::new(HealthCheckResponse { status: status as i32 }))
    }
}
