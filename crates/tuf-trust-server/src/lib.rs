//! The trust server (spec components D/E/F): the HTTP-facing atomic-update pipeline over a
//! `MetaStore`, the server-key policy layer in front of `tuf-signer`, and the change feed.
//!
//! `trust_server::TrustServer` is the seam between the two: it has no knowledge of HTTP, and
//! `http` is a thin actix-web layer translating requests into calls against it. `tuf-trustd`
//! wires the two together at startup; `tuf-adminctl` is a separate developer CLI that only
//! speaks the HTTP surface `http` exposes.

pub mod backend;
pub mod change_feed;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod server_key;
pub mod trust_pinning;
pub mod trust_server;
pub mod validation;

pub use error::ApiError;
pub use trust_server::TrustServer;
