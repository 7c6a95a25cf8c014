//! The pluggable passphrase-resolution seam (spec §4.B: "the store holds a
//! `passphraseRetriever` function ... supplied at construction").

use crate::error::Error;
use crate::Result;

/// Maps a passphrase alias and an attempt number to a passphrase.
///
/// `attempt` starts at 0 and is incremented by the caller on a `WrongPassphrase` result, so a
/// retriever backed by an interactive or rotating secret source can offer a different candidate
/// on retry. Implementations that have exactly one candidate per alias should ignore `attempt`
/// past the first and return the same error on any later call.
pub trait PassphraseRetriever: Send + Sync {
    /// Resolve the passphrase for `alias`.
    fn retrieve(&self, alias: &str, attempt: u32) -> Result<String>;
}

/// Resolves passphrases from process environment variables named `{prefix}{ALIAS_UPPERCASE}`.
///
/// This is the default retriever: it matches the spec's note that the retriever "MAY consult
/// process configuration (environment variables keyed by alias)".
pub struct EnvPassphraseRetriever {
    prefix: String,
}

impl EnvPassphraseRetriever {
    /// Construct a retriever that looks up `{prefix}{ALIAS}` in the environment, e.g. with
    /// `prefix = "NOTARY_SIGNER_"` and alias `"snapshot"` it reads `NOTARY_SIGNER_SNAPSHOT`.
    pub fn new(prefix: impl Into<String>) -> Self {
        EnvPassphraseRetriever { prefix: prefix.into() }
    }
}

impl PassphraseRetriever for EnvPassphraseRetriever {
    fn retrieve(&self, alias: &str, attempt: u32) -> Result<String> {
        if attempt > 0 {
            return Err(Error::PassphraseUnavailable {
                alias: alias.to_string(),
                reason: "environment-backed retriever has no second candidate".into(),
            });
        }
        let var = format!("{}{}", self.prefix, alias.to_uppercase());
        std::env::var(&var).map_err(|_| Error::PassphraseUnavailable {
            alias: alias.to_string(),
            reason: format!("environment variable {} not set", var),
        })
    }
}

/// A retriever that always returns the same passphrase, regardless of alias. Useful for tests
/// and single-tenant deployments that do not need per-alias secrets.
pub struct FixedPassphraseRetriever(String);

impl FixedPassphraseRetriever {
    /// Construct a retriever that always returns `passphrase`.
    pub fn new(passphrase: impl Into<String>) -> Self {
        FixedPassphraseRetriever(passphrase.into())
    }
}

impl PassphraseRetriever for FixedPassphraseRetriever {
    fn retrieve(&self, _alias: &str, attempt: u32) -> Result<String> {
        if attempt > 0 {
            return Err(Error::PassphraseUnavailable {
                alias: _alias.to_string(),
                reason: "fixed retriever has no second candidate".into(),
            });
        }
        Ok(self.0.clone())
    }
}
