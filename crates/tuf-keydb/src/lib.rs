//! Encrypted storage of private keys keyed by key-id, with pending/active lifecycle and an
//! in-process decrypted-key cache (spec component B).
//!
//! Every private key byte persisted through this crate is encrypted with a passphrase obtained
//! via a configured [`PassphraseRetriever`]; the cleartext private key is never written to a
//! backing store (spec §3 invariant).

pub mod cache;
pub mod encryption;
pub mod error;
pub mod memory;
pub mod model;
pub mod passphrase;
pub mod postgres;
mod store;

pub use cache::Cache;
pub use error::Error;
pub use model::KeyRecord;
pub use passphrase::PassphraseRetriever;
pub use store::KeyDbStore;

/// The result type used throughout this crate.
pub type Result<T> = ::std::result::Result<T, Error>;
