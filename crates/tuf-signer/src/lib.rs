//! The signing service (spec component C): an authenticated remote key-management and signing
//! RPC backed by `tuf-keydb`'s encrypted store and decrypted-key cache.
//!
//! This crate owns the wire protocol (a `tonic` gRPC service generated from `proto/signer.proto`
//! and `proto/health.proto`) and exposes both the server implementation (`service`, used by the
//! `tuf-signerd` binary) and a thin client (`client`) that `tuf-trust-server`'s `ServerKeyManager`
//! uses to create keys and request signatures without depending on `tuf-keydb` directly.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod service;

/// Generated protobuf/gRPC types and service traits for `tuf.signer.v1`.
pub mod proto {
    tonic::include_proto!("tuf.signer.v1");
}

pub use error::Error;

/// The result type used throughout this crate.
pub type Result<T> = ::std::result::Result<T, Error>;
