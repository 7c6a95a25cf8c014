//! Shared data model for the trust-metadata service: TUF metadata types, cryptographic
//! primitives, canonical JSON, and the serde shims that bridge the two.
//!
//! This crate has no knowledge of HTTP, gRPC, or any storage backend. It is linked by
//! `tuf-metastore`, `tuf-keydb`, `tuf-signer`, and `tuf-trust-server` alike so that every
//! component agrees on the same wire format and the same notion of a validly signed,
//! unexpired, threshold-satisfying piece of metadata.

pub mod crypto;
pub mod error;
pub mod interchange;
pub mod metadata;
mod shims;

pub use error::Error;

/// The result type used throughout this crate and its dependents.
pub type Result<T> = ::std::result::Result<T, Error>;
