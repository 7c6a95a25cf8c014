//! Error taxonomy for the trust server (spec §7), mapped onto `actix_web::ResponseError` at the
//! HTTP edge so handlers can propagate with `?` and let the framework pick the status code.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_derive::Serialize;
use thiserror::Error;

/// The errors a trust-server operation can fail with (spec §7 taxonomy).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request input: bad role name, bad query parameter, unparseable body.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The role named in the request is not recognized or not permitted for this operation.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// A TUF validation rule was violated; `detail` names the specific rule (spec §4.D.1).
    #[error("validation failure: {detail}")]
    ValidationFailure {
        /// Machine-readable description of the rule that was violated.
        detail: String,
    },

    /// The submitted version did not strictly increase the current version for a (gun, role).
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// The requested GUN, role, version, checksum, or key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Passed through from ingress; the core never originates this.
    #[error("unauthorized")]
    Unauthorized,

    /// Passed through from ingress; the core never originates this.
    #[error("forbidden")]
    Forbidden,

    /// The signing service does not recognize the given key-id.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The signing service failed to produce a signature.
    #[error("signing error")]
    SigningError,

    /// The server attempted to rotate a key before `rotateOncePer` elapsed (spec §4.E).
    #[error("cannot rotate yet")]
    CannotRotateYet,

    /// A backing store failed; detail is logged but never returned to the caller.
    #[error("storage failure")]
    StorageFailure,

    /// The signing service was unreachable while generating a snapshot or timestamp.
    #[error("signing unavailable")]
    SigningUnavailable,

    /// The request's deadline elapsed before the operation completed.
    #[error("timeout")]
    Timeout,
}

/// The JSON body returned alongside non-2xx responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::InvalidRole(_) => "INVALID_ROLE",
            ApiError::ValidationFailure { .. } => "VALIDATION_FAILURE",
            ApiError::VersionConflict(_) => "VERSION_CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::KeyNotFound(_) => "KEY_NOT_FOUND",
            ApiError::SigningError => "SIGNING_ERROR",
            ApiError::CannotRotateYet => "CANNOT_ROTATE_YET",
            ApiError::StorageFailure => "STORAGE_FAILURE",
            ApiError::SigningUnavailable => "SIGNING_UNAVAILABLE",
            ApiError::Timeout => "TIMEOUT",
        }
    }

    /// The detail message returned to the caller. Storage faults are opaque (spec §7
    /// "details are logged but not returned"); everything else preserves its detail.
    fn public_message(&self) -> String {
        match self {
            ApiError::StorageFailure => "internal storage error".to_string(),
            ApiError::SigningError => "the signing service failed to produce a signature".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::InvalidRole(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailure { .. } => StatusCode::BAD_REQUEST,
            ApiError::VersionConflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) | ApiError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::CannotRotateYet => StatusCode::CONFLICT,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::StorageFailure | ApiError::SigningError | ApiError::SigningUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, ApiError::StorageFailure) {
            log::warn!("storage failure: {}", self);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.code(),
            message: self.public_message(),
        })
    }
}

impl From<tuf_metastore::Error> for ApiError {
    fn from(err: tuf_metastore::Error) -> ApiError {
        match err {
            tuf_metastore::Error::VersionConflict { gun, role, attempted, current } => {
                ApiError::VersionConflict(format!(
                    "{}/{}: attempted {}, current {:?}",
                    gun, role, attempted, current
                ))
            }
            tuf_metastore::Error::NotFound(detail) => ApiError::NotFound(detail),
            tuf_metastore::Error::InvalidInput(detail) => ApiError::InvalidInput(detail),
            tuf_metastore::Error::StorageFailure(_) => ApiError::StorageFailure,
        }
    }
}

impl From<tuf_core::Error> for ApiError {
    fn from(err: tuf_core::Error) -> ApiError {
        ApiError::ValidationFailure { detail: err.to_string() }
    }
}

impl From<tuf_signer::Error> for ApiError {
    fn from(err: tuf_signer::Error) -> ApiError {
        match err {
            tuf_signer::Error::KeyNotFound(id) => ApiError::KeyNotFound(id),
            tuf_signer::Error::SigningError(_) => ApiError::SigningError,
            tuf_signer::Error::InvalidInput(detail) => ApiError::InvalidInput(detail),
            tuf_signer::Error::StorageFailure => ApiError::StorageFailure,
            tuf_signer::Error::Transport(_) => ApiError::SigningUnavailable,
        }
    }
}
