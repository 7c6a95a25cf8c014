//! Exercises `SignerServiceImpl`/`HealthServiceImpl` directly against an in-memory key store,
//! without a real gRPC transport.

use std::sync::Arc;

use tonic::Request;
use tuf_core::crypto::SignatureScheme;
use tuf_keydb::memory::InMemoryKeyDbStore;
use tuf_keydb::passphrase::EnvPassphraseRetriever;
use tuf_keydb::Cache;
use tuf_signer::proto::health_server::Health;
use tuf_signer::proto::key_management_server::KeyManagement;
use tuf_signer::proto::signer_server::Signer;
use tuf_signer::proto::{
    Algorithm, CreateKeyRequest, DeleteKeyResponse, HealthCheckRequest, KeyIdRequest, SignRequest,
};
use tuf_signer::service::{HealthServiceImpl, SignerServiceImpl};

fn service_with_env(
    prefix: &str,
) -> SignerServiceImpl<InMemoryKeyDbStore<EnvPassphraseRetriever>> {
    let retriever = EnvPassphraseRetriever::new(prefix);
    let store = InMemoryKeyDbStore::new(retriever);
    let cache = Arc::new(Cache::new(Arc::new(store)));
    SignerServiceImpl::new(cache)
}

#[tokio::test]
async fn create_key_then_sign_round_trips() {
    std::env::set_var("TUF_SIGNER_TEST_SNAPSHOT", "correct horse battery staple");
    let service = service_with_env("TUF_SIGNER_TEST_");

    let created = service
        .create_key(Request::new(CreateKeyRequest {
            role: "snapshot".into(),
            algorithm: Algorithm::Ed25519 as i32,
            gun: "library/nginx".into(),
        }))
        .await
        .expect("create_key should succeed")
        .into_inner();

    assert_eq!(created.role, "snapshot");
    assert_eq!(created.gun, "library/nginx");
    assert!(!created.key_id.is_empty());

    let signed = service
        .sign(Request::new(SignRequest {
            key_id: created.key_id.clone(),
            payload: b"some canonical json payload".to_vec(),
        }))
        .await
        .expect("sign should succeed")
        .into_inner();

    assert_eq!(signed.key_id, created.key_id);
    assert_eq!(signed.method, "ed25519");
    assert!(!signed.signature.is_empty());
}

#[tokio::test]
async fn sign_with_unknown_key_id_returns_not_found() {
    let service = service_with_env("TUF_SIGNER_TEST2_");

    let result = service
        .sign(Request::new(SignRequest {
            key_id: "deadbeef".into(),
            payload: b"payload".to_vec(),
        }))
        .await;

    let status = result.expect_err("unknown key-id must fail");
    assert_eq!(status.code(), tonic::Code::NotFound);
}

#[tokio::test]
async fn delete_key_is_idempotent() {
    let service = service_with_env("TUF_SIGNER_TEST3_");

    let first = service
        .delete_key(Request::new(KeyIdRequest { key_id: "never-created".into() }))
        .await
        .expect("deleting an absent key is not an error");
    assert_eq!(first.into_inner(), DeleteKeyResponse {});

    let second = service
        .delete_key(Request::new(KeyIdRequest { key_id: "never-created".into() }))
        .await
        .expect("deleting twice is still not an error");
    assert_eq!(second.into_inner(), DeleteKeyResponse {});
}

#[tokio::test]
async fn health_check_reports_serving_for_known_services() {
    let retriever = EnvPassphraseRetriever::new("TUF_SIGNER_TEST4_");
    let store = InMemoryKeyDbStore::new(retriever);
    let cache = Arc::new(Cache::new(Arc::new(store)));
    let health = HealthServiceImpl::new(cache);

    use tuf_signer::proto::health_check_response::ServingStatus;

    let response = health
        .check(Request::new(HealthCheckRequest { service: "tuf.signer.v1.Signer".into() }))
        .await
        .expect("health check should succeed")
        .into_inner();
    assert_eq!(response.status, ServingStatus::Serving as i32);

    let unknown = health
        .check(Request::new(HealthCheckRequest { service: "some.other.Service".into() }))
        .await
        .expect("health check should succeed")
        .into_inner();
    assert_eq!(unknown.status, ServingStatus::ServiceUnknown as i32);
}
