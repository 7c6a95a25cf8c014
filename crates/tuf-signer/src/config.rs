//! Layered configuration for the `tuf-signerd` binary (spec §6 **[AMBIENT]** config/CLI).
//!
//! Loaded with the `config` crate from a TOML file, overridable by `TUF_SIGNERD_*` environment
//! variables, matching the layering convention `SPEC_FULL.md` §6 asks for.

use serde_derive::Deserialize;

/// Top-level configuration for the signer daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    /// The address the gRPC listener binds to, e.g. `"0.0.0.0:7899"`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Paths to the server certificate, private key, and client-CA bundle used for the mutually
    /// authenticated TLS channel (spec §6 "mutually-authenticated TLS channel").
    #[serde(default)]
    pub tls: TlsConfig,

    /// Prefix used by the default [`tuf_keydb::passphrase::EnvPassphraseRetriever`] to resolve
    /// per-alias passphrases from the environment.
    #[serde(default = "default_passphrase_env_prefix")]
    pub passphrase_env_prefix: String,

    /// Postgres connection string for the key database. When absent, the daemon runs with an
    /// in-memory `KeyDbStore`, suitable for local development and the test suite.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Log level passed to `fern`/`log` (`"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// TLS material for the mutually-authenticated gRPC channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// PEM-encoded server certificate chain.
    pub cert_path: Option<String>,
    /// PEM-encoded server private key.
    pub key_path: Option<String>,
    /// PEM-encoded CA bundle used to authenticate client certificates.
    pub client_ca_path: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:7899".to_string()
}

fn default_passphrase_env_prefix() -> String {
    "TUF_SIGNER_".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SignerConfig {
    /// Load configuration from `path`, layered with `TUF_SIGNERD_*` environment overrides.
    /// Falls back to built-in defaults if `path` does not exist.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("listen_addr", default_listen_addr())?
            .set_default("passphrase_env_prefix", default_passphrase_env_prefix())?
            .set_default("log_level", default_log_level())?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TUF_SIGNERD").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        SignerConfig {
            listen_addr: default_listen_addr(),
            tls: TlsConfig::default(),
            passphrase_env_prefix: default_passphrase_env_prefix(),
            database_url: None,
            log_level: default_log_level(),
        }
    }
}
