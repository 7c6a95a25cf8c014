//! Abstract persistent storage for TUF metadata and the change journal (spec component A).
//!
//! The rest of the trust-metadata service depends only on the [`MetaStore`] trait; this crate
//! ships two implementations: [`memory::InMemoryMetaStore`] for tests and local development, and
//! [`postgres::PostgresMetaStore`] for production, matching the `current_tuf` / `tuf_files` /
//! `change_category` tables described in the spec's persisted-state layout.

pub mod change;
pub mod error;
mod lock;
pub mod memory;
pub mod model;
pub mod postgres;
mod store;

pub use change::{ChangeCategory, ChangeRecord};
pub use error::Error;
pub use model::{Gun, MetaUpdate};
pub use store::MetaStore;

/// The result type used throughout this crate.
pub type Result<T> = ::std::result::Result<T, Error>;
