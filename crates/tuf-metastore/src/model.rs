//! Shared value types for the metadata store (spec §3: GUN, MetaUpdate).

use std::fmt;

use tuf_core::metadata::MetadataPath;

use crate::error::Error;
use crate::Result;

/// A Globally Unique Name: the namespace for one trust collection.
///
/// GUNs are opaque, non-empty UTF-8 strings (spec §3). Prefix-policy enforcement
/// (`ingress.repoPrefixes`) happens at the ingress, outside this crate; the store only rejects
/// the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Gun(String);

impl Gun {
    /// Construct a `Gun`, rejecting the empty string.
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(Error::InvalidInput("GUN cannot be empty".into()));
        }
        Ok(Gun(s))
    }

    /// The string value of this GUN.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Gun> for String {
    fn from(g: Gun) -> String {
        g.0
    }
}

/// A (role, version, bytes) triple staged for atomic write (spec §3 `MetaUpdate`).
///
/// `bytes` is the byte-exact `SignedMetadata` payload as received from the client or produced by
/// the server; it is never re-serialized before being persisted or returned.
#[derive(Debug, Clone)]
pub struct MetaUpdate {
    /// The role this update targets. Delegated-targets roles use the `targets/<path>` shape.
    pub role: MetadataPath,
    /// The version claimed by this update. Must be strictly greater than the role's current
    /// version for the write to succeed.
    pub version: u32,
    /// The byte-exact `SignedMetadata` payload.
    pub bytes: Vec<u8>,
}

impl MetaUpdate {
    /// Construct a new update.
    pub fn new(role: MetadataPath, version: u32, bytes: Vec<u8>) -> Self {
        MetaUpdate { role, version, bytes }
    }
}
