//! Error taxonomy for the key store (spec §7: `WrongPassphrase`, `NotFound`, `StorageFailure`).

use thiserror::Error;

/// Errors returned by [`crate::KeyDbStore`] and [`crate::Cache`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The key-id is not known to the store.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The passphrase resolved for this key's alias failed to decrypt the stored private key.
    #[error("wrong passphrase for key {0}")]
    WrongPassphrase(String),

    /// The passphrase retriever could not produce a passphrase.
    #[error("passphrase retrieval failed for alias {alias}: {reason}")]
    PassphraseUnavailable {
        /// The passphrase alias that failed to resolve.
        alias: String,
        /// Why the retriever failed.
        reason: String,
    },

    /// A cryptographic operation (generation, encryption, decryption) failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The backend failed in a way that should not be surfaced with detail to callers.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Error {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("row not found".into()),
            other => Error::StorageFailure(other.to_string()),
        }
    }
}

impl From<tuf_core::Error> for Error {
    fn from(err: tuf_core::Error) -> Error {
        Error::Crypto(err.to_string())
    }
}
