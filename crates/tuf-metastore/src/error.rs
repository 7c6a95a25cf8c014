//! Error taxonomy for the metadata store (spec §7: `VersionConflict`, `NotFound`,
//! `StorageFailure`).

use thiserror::Error;

/// Errors returned by [`crate::MetaStore`] implementations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The caller attempted to write a version that did not strictly increase the current
    /// version for the (gun, role), either because the submitted version was not greater or
    /// because a concurrent writer committed first.
    #[error("version conflict for {gun}/{role}: attempted {attempted}, current {current:?}")]
    VersionConflict {
        /// The GUN the conflicting write targeted.
        gun: String,
        /// The role the conflicting write targeted.
        role: String,
        /// The version the caller attempted to write.
        attempted: u32,
        /// The version currently stored, if any.
        current: Option<u32>,
    },

    /// The requested (gun, role[, version|checksum]) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An argument was structurally invalid (empty GUN, negative page size, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

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
