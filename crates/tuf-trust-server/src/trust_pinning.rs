//! **[SUPPLEMENT]** TOFU (trust-on-first-use) root pinning policy, consulted during root
//! validation's repository-creation step (spec §4.D.1 step 2).
//!
//! Docker Notary's trust-pinning supports pinning a GUN's root either to a CA bundle (real
//! certificate-chain validation) or to an explicit list of certificate/key ids. This crate
//! implements the simplified policy surface spec.md's Non-goals call for (no certificate
//! issuance, no real X.509 validation): a CA pin is accepted as configured without walking a
//! chain, and a cert pin is checked by key-id membership. Absent any pin for a GUN, the policy
//! is pure TOFU: the first root offered for that GUN is accepted.

use std::collections::{HashMap, HashSet};

use tuf_core::crypto::KeyId;

use crate::config::TrustPinningConfig;
use crate::error::ApiError;

/// The trust-pinning policy consulted when a new root is created for a GUN.
#[derive(Debug, Clone)]
pub struct TrustPinning {
    disable_tofu: bool,
    ca: HashMap<String, String>,
    certs: HashMap<String, HashSet<String>>,
}

impl TrustPinning {
    /// Build a policy from configuration (spec §6 `trust-pinning` block).
    pub fn from_config(config: &TrustPinningConfig) -> Self {
        TrustPinning {
            disable_tofu: config.disable_tofu,
            ca: config.ca.clone(),
            certs: config
                .certs
                .iter()
                .map(|(gun, ids)| (gun.clone(), ids.iter().cloned().collect()))
                .collect(),
        }
    }

    /// A policy that accepts every root unconditionally, for tests that don't exercise pinning.
    pub fn permissive() -> Self {
        TrustPinning {
            disable_tofu: true,
            ca: HashMap::new(),
            certs: HashMap::new(),
        }
    }

    /// Decide whether `root_key_ids` (the key-ids that signed the proposed root) are acceptable
    /// for `gun`. Called only at repository-creation time (spec §4.D.1 step 2); root rotation is
    /// governed by the staged-rotation threshold check instead, not trust pinning.
    pub fn validate(&self, gun: &str, root_key_ids: &HashSet<&KeyId>) -> Result<(), ApiError> {
        if self.disable_tofu {
            return Ok(());
        }

        if let Some(pinned) = self.certs.get(gun) {
            let matches = root_key_ids
                .iter()
                .any(|id| pinned.contains(&id.to_string()));
            if !matches {
                return Err(ApiError::ValidationFailure {
                    detail: format!("root key-ids for {} do not match the pinned certificate ids", gun),
                });
            }
            return Ok(());
        }

        if self.ca.contains_key(gun) {
            // A configured CA bundle is accepted as-is; walking the certificate chain is out of
            // scope (no certificate issuance/validation, per Non-goals).
            return Ok(());
        }

        // No pin configured for this GUN: trust on first use.
        Ok(())
    }
}

impl Default for TrustPinning {
    fn default() -> Self {
        TrustPinning::from_config(&TrustPinningConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_id(s: &str) -> KeyId {
        KeyId::from_string(s.to_string())
    }

    #[test]
    fn no_pin_configured_is_pure_tofu() {
        let pinning = TrustPinning::default();
        let id = key_id("abc");
        let ids: HashSet<&KeyId> = [&id].into_iter().collect();
        assert!(pinning.validate("example/foo", &ids).is_ok());
    }

    #[test]
    fn pinned_certs_reject_unlisted_keys() {
        let mut config = TrustPinningConfig::default();
        config.certs.insert("example/foo".to_string(), vec!["expected-id".to_string()]);
        let pinning = TrustPinning::from_config(&config);

        let id = key_id("other-id");
        let ids: HashSet<&KeyId> = [&id].into_iter().collect();
        assert!(pinning.validate("example/foo", &ids).is_err());

        let id = key_id("expected-id");
        let ids: HashSet<&KeyId> = [&id].into_iter().collect();
        assert!(pinning.validate("example/foo", &ids).is_ok());
    }

    #[test]
    fn disable_tofu_accepts_everything() {
        let mut config = TrustPinningConfig::default();
        config.disable_tofu = true;
        config.certs.insert("example/foo".to_string(), vec!["expected-id".to_string()]);
        let pinning = TrustPinning::from_config(&config);

        let id = key_id("anything");
        let ids: HashSet<&KeyId> = [&id].into_iter().collect();
        assert!(pinning.validate("example/foo", &ids).is_ok());
    }
}
