//! Error taxonomy for the signing service (spec §7: `KeyNotFound`, `SigningError`).

use thiserror::Error;
use tonic::Status;

/// Errors produced by [`crate::service`] and surfaced to RPC callers through [`crate::client`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The requested key-id is not known to the signer.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Signing or key-generation failed for a reason other than an unknown key.
    #[error("signing error: {0}")]
    SigningError(String),

    /// An argument was structurally invalid (bad role name, unsupported algorithm, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The underlying key store failed in a way that should not be surfaced with detail.
    #[error("storage failure")]
    StorageFailure,

    /// The RPC transport itself failed (connect, TLS handshake, deadline).
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tuf_keydb::Error> for Error {
    fn from(err: tuf_keydb::Error) -> Error {
        match err {
            tuf_keydb::Error::NotFound(id) => Error::KeyNotFound(id),
            tuf_keydb::Error::WrongPassphrase(_) => Error::SigningError("wrong passphrase".into()),
            tuf_keydb::Error::PassphraseUnavailable { .. } => Error::StorageFailure,
            tuf_keydb::Error::Crypto(reason) => Error::SigningError(reason),
            tuf_keydb::Error::StorageFailure(_) => Error::StorageFailure,
        }
    }
}

impl From<tuf_core::Error> for Error {
    fn from(err: tuf_core::Error) -> Error {
        Error::SigningError(err.to_string())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Status {
        match err {
            Error::KeyNotFound(id) => Status::not_found(format!("key not found: {}", id)),
            Error::SigningError(reason) => Status::internal(format!("signing error: {}", reason)),
            Error::InvalidInput(reason) => Status::invalid_argument(reason),
            Error::StorageFailure => Status::unavailable("signer storage unavailable"),
            Error::Transport(reason) => Status::unavailable(reason),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Error {
        use tonic::Code;
        match status.code() {
            Code::NotFound => Error::KeyNotFound(status.message().to_string()),
            Code::InvalidArgument => Error::InvalidInput(status.message().to_string()),
            Code::Unavailable => Error::Transport(status.message().to_string()),
            _ => Error::SigningError(status.message().to_string()),
        }
    }
}
