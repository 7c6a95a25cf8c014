//! Layered configuration for the `tuf-trustd` binary (spec §6 **[AMBIENT]** config/CLI).
//!
//! Loaded with the `config` crate from a TOML file, overridable by `TUF_TRUSTD_*` environment
//! variables, matching the layering convention `SPEC_FULL.md` §6 asks for.

use std::collections::HashMap;

use serde_derive::Deserialize;

/// Top-level configuration for the trust server daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustConfig {
    /// The address the HTTP listener binds to, e.g. `"0.0.0.0:4443"`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Postgres connection string for the metadata store. When absent, the daemon runs with an
    /// in-memory `MetaStore`, suitable for local development and the test suite.
    #[serde(default)]
    pub database_url: Option<String>,

    /// The `tuf-signerd` gRPC endpoint this server calls to create keys and request signatures.
    #[serde(default = "default_signer_endpoint")]
    pub signer_endpoint: String,

    /// `trust-pinning` policy consulted during root validation (spec §6).
    #[serde(default)]
    pub trust_pinning: TrustPinningConfig,

    /// `serverKey.rotateOncePer` (spec §4.E), in seconds.
    #[serde(default = "default_rotate_once_per_secs")]
    pub rotate_once_per_secs: i64,

    /// `changefeed.defaultPageSize` (spec §4.F).
    #[serde(default = "default_change_page_size")]
    pub change_feed_default_page_size: u32,

    /// `ingress.repoPrefixes`: allowed GUN prefixes. Empty means allow all.
    #[serde(default)]
    pub repo_prefixes: Vec<String>,

    /// Log level passed to `fern`/`log`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// TOFU trust-pinning configuration (spec §6, **[SUPPLEMENT]** policy object).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustPinningConfig {
    /// If set, root validation never consults trust pinning (accepts any well-formed root).
    #[serde(default)]
    pub disable_tofu: bool,

    /// Per-GUN CA bundle paths used to validate root certificate chains.
    #[serde(default)]
    pub ca: HashMap<String, String>,

    /// Per-GUN pinned certificate-id lists.
    #[serde(default)]
    pub certs: HashMap<String, Vec<String>>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:4443".to_string()
}

fn default_signer_endpoint() -> String {
    "https://127.0.0.1:7899".to_string()
}

fn default_rotate_once_per_secs() -> i64 {
    24 * 60 * 60
}

fn default_change_page_size() -> u32 {
    tuf_metastore::DEFAULT_CHANGE_PAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TrustConfig {
    /// Load configuration from `path`, layered with `TUF_TRUSTD_*` environment overrides. Falls
    /// back to built-in defaults if `path` does not exist.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("listen_addr", default_listen_addr())?
            .set_default("signer_endpoint", default_signer_endpoint())?
            .set_default("rotate_once_per_secs", default_rotate_once_per_secs())?
            .set_default("change_feed_default_page_size", default_change_page_size())?
            .set_default("log_level", default_log_level())?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TUF_TRUSTD").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        TrustConfig {
            listen_addr: default_listen_addr(),
            database_url: None,
            signer_endpoint: default_signer_endpoint(),
            trust_pinning: TrustPinningConfig::default(),
            rotate_once_per_secs: default_rotate_once_per_secs(),
            change_feed_default_page_size: default_change_page_size(),
            repo_prefixes: Vec::new(),
            log_level: default_log_level(),
        }
    }
}
