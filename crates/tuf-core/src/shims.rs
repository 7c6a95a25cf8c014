//! Serde "shim" structs for the on-the-wire JSON shape of TUF metadata.
//!
//! The types in [`crate::metadata`] enforce invariants (non-empty key sets, thresholds no
//! greater than the number of keys, positive versions, ...) in their constructors, so they
//! cannot implement `Deserialize` directly without either bypassing those checks or failing
//! construction mid-deserialization. Instead each metadata type serializes to, and deserializes
//! from, a shim struct here that mirrors the wire JSON shape, then converts via `TryFrom` (shim
//! -> validated type) and a named constructor (validated type -> shim).

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;

use crate::crypto::{HashAlgorithm, HashValue, KeyId, PublicKey};
use crate::error::Error;
use crate::metadata::{
    Delegation, Delegations, MetadataDescription, MetadataPath, RoleDefinition, RootMetadata,
    SnapshotMetadata, TargetDescription, TargetsMetadata, TimestampMetadata, VirtualTargetPath,
};
use crate::Result;

fn hashes_to_shim(hashes: &HashMap<HashAlgorithm, HashValue>) -> HashMap<String, String> {
    hashes
        .iter()
        .map(|(alg, val)| (alg.to_string(), val.to_hex()))
        .collect()
}

fn hashes_from_shim(hashes: &HashMap<String, String>) -> Result<HashMap<HashAlgorithm, HashValue>> {
    hashes
        .iter()
        .map(|(alg, val)| {
            let alg: HashAlgorithm = alg.parse()?;
            let val = HashValue::from_hex(val)?;
            Ok((alg, val))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDefinition {
    threshold: u32,
    keyids: Vec<KeyId>,
}

impl RoleDefinition {
    pub fn from_role_definition(real: &crate::metadata::RoleDefinition) -> Result<Self> {
        Ok(RoleDefinition {
            threshold: real.threshold(),
            keyids: real.key_ids().iter().cloned().collect(),
        })
    }
}

impl TryFrom<RoleDefinition> for crate::metadata::RoleDefinition {
    type Error = Error;

    fn try_from(shim: RoleDefinition) -> Result<Self> {
        crate::metadata::RoleDefinition::new(shim.threshold, shim.keyids.into_iter().collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootMetadata {
    #[serde(rename = "_type")]
    typ: String,
    spec_version: String,
    version: u32,
    expires: DateTime<Utc>,
    consistent_snapshot: bool,
    keys: HashMap<KeyId, PublicKey>,
    roles: HashMap<String, RoleDefinition>,
}

impl RootMetadata {
    pub fn from_root(real: &crate::metadata::RootMetadata) -> Result<Self> {
        let mut roles = HashMap::new();
        roles.insert("root".to_string(), RoleDefinition::from_role_definition(real.root())?);
        roles.insert(
            "snapshot".to_string(),
            RoleDefinition::from_role_definition(real.snapshot())?,
        );
        roles.insert(
            "targets".to_string(),
            RoleDefinition::from_role_definition(real.targets())?,
        );
        roles.insert(
            "timestamp".to_string(),
            RoleDefinition::from_role_definition(real.timestamp())?,
        );

        Ok(RootMetadata {
            typ: "root".into(),
            spec_version: "1.0.0".into(),
            version: real.version(),
            expires: *real.expires(),
            consistent_snapshot: real.consistent_snapshot(),
            keys: real.keys().clone(),
            roles,
        })
    }
}

impl TryFrom<RootMetadata> for crate::metadata::RootMetadata {
    type Error = Error;

    fn try_from(shim: RootMetadata) -> Result<Self> {
        if shim.typ != "root" {
            return Err(Error::Encoding(format!("expected _type \"root\", found {:?}", shim.typ)));
        }

        let mut roles = shim.roles;
        let mut take = |name: &str| -> Result<crate::metadata::RoleDefinition> {
            let def = roles
                .remove(name)
                .ok_or_else(|| Error::Encoding(format!("root metadata missing role {:?}", name)))?;
            crate::metadata::RoleDefinition::try_from(def)
        };

        let root = take("root")?;
        let snapshot = take("snapshot")?;
        let targets = take("targets")?;
        let timestamp = take("timestamp")?;

        crate::metadata::RootMetadata::new(
            shim.version,
            shim.expires,
            shim.consistent_snapshot,
            shim.keys,
            root,
            snapshot,
            targets,
            timestamp,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDescription {
    version: u32,
    length: usize,
    hashes: HashMap<String, String>,
}

impl MetadataDescription {
    pub fn from_metadata_description(real: &crate::metadata::MetadataDescription) -> Self {
        MetadataDescription {
            version: real.version(),
            length: real.size(),
            hashes: hashes_to_shim(real.hashes()),
        }
    }
}

impl TryFrom<MetadataDescription> for crate::metadata::MetadataDescription {
    type Error = Error;

    fn try_from(shim: MetadataDescription) -> Result<Self> {
        crate::metadata::MetadataDescription::new(shim.version, shim.length, hashes_from_shim(&shim.hashes)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampMetadata {
    #[serde(rename = "_type")]
    typ: String,
    spec_version: String,
    version: u32,
    expires: DateTime<Utc>,
    meta: HashMap<String, MetadataDescription>,
}

impl TimestampMetadata {
    pub fn from_timestamp(real: &crate::metadata::TimestampMetadata) -> Result<Self> {
        let mut meta = HashMap::new();
        meta.insert(
            "snapshot.json".to_string(),
            MetadataDescription::from_metadata_description(real.snapshot()),
        );

        Ok(TimestampMetadata {
            typ: "timestamp".into(),
            spec_version: "1.0.0".into(),
            version: real.version(),
            expires: *real.expires(),
            meta,
        })
    }
}

impl TryFrom<TimestampMetadata> for crate::metadata::TimestampMetadata {
    type Error = Error;

    fn try_from(mut shim: TimestampMetadata) -> Result<Self> {
        let snapshot = shim
            .meta
            .remove("snapshot.json")
            .ok_or_else(|| Error::Encoding("timestamp metadata missing snapshot.json".into()))?;
        let snapshot = crate::metadata::MetadataDescription::try_from(snapshot)?;

        crate::metadata::TimestampMetadata::new(shim.version, shim.expires, snapshot)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(rename = "_type")]
    typ: String,
    spec_version: String,
    version: u32,
    expires: DateTime<Utc>,
    meta: HashMap<String, MetadataDescription>,
}

impl SnapshotMetadata {
    pub fn from_snapshot(real: &crate::metadata::SnapshotMetadata) -> Result<Self> {
        let meta = real
            .meta()
            .iter()
            .map(|(path, desc)| {
                (
                    format!("{}.json", path.to_string()),
                    MetadataDescription::from_metadata_description(desc),
                )
            })
            .collect();

        Ok(SnapshotMetadata {
            typ: "snapshot".into(),
            spec_version: "1.0.0".into(),
            version: real.version(),
            expires: *real.expires(),
            meta,
        })
    }
}

impl TryFrom<SnapshotMetadata> for crate::metadata::SnapshotMetadata {
    type Error = Error;

    fn try_from(shim: SnapshotMetadata) -> Result<Self> {
        let mut meta = HashMap::new();
        for (path, desc) in shim.meta {
            let path = path.strip_suffix(".json").unwrap_or(&path).to_string();
            let path = MetadataPath::new(path)?;
            meta.insert(path, crate::metadata::MetadataDescription::try_from(desc)?);
        }

        crate::metadata::SnapshotMetadata::new(shim.version, shim.expires, meta)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDescription {
    length: u64,
    hashes: HashMap<String, String>,
}

impl TargetDescription {
    pub fn from_target_description(real: &crate::metadata::TargetDescription) -> Self {
        TargetDescription {
            length: real.size(),
            hashes: hashes_to_shim(real.hashes()),
        }
    }
}

impl TryFrom<TargetDescription> for crate::metadata::TargetDescription {
    type Error = Error;

    fn try_from(shim: TargetDescription) -> Result<Self> {
        crate::metadata::TargetDescription::new(shim.length, hashes_from_shim(&shim.hashes)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    name: String,
    terminating: bool,
    threshold: u32,
    keyids: Vec<KeyId>,
    paths: Vec<String>,
}

impl From<&crate::metadata::Delegation> for Delegation {
    fn from(real: &crate::metadata::Delegation) -> Self {
        Delegation {
            name: real.role().to_string(),
            terminating: real.terminating(),
            threshold: real.threshold(),
            keyids: real.key_ids().iter().cloned().collect(),
            paths: real.paths().iter().map(|p| p.value().to_string()).collect(),
        }
    }
}

impl TryFrom<Delegation> for crate::metadata::Delegation {
    type Error = Error;

    fn try_from(shim: Delegation) -> Result<Self> {
        let mut paths = HashSet::new();
        for p in shim.paths {
            paths.insert(VirtualTargetPath::new(p)?);
        }

        crate::metadata::Delegation::new(
            MetadataPath::new(shim.name)?,
            shim.terminating,
            shim.threshold,
            shim.keyids.into_iter().collect(),
            paths,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegations {
    keys: HashMap<KeyId, PublicKey>,
    roles: Vec<Delegation>,
}

impl From<&crate::metadata::Delegations> for Delegations {
    fn from(real: &crate::metadata::Delegations) -> Self {
        Delegations {
            keys: real.keys().clone(),
            roles: real.roles().iter().map(Delegation::from).collect(),
        }
    }
}

impl TryFrom<Delegations> for crate::metadata::Delegations {
    type Error = Error;

    fn try_from(shim: Delegations) -> Result<Self> {
        let keys: HashSet<PublicKey> = shim.keys.into_values().collect();
        let roles = shim
            .roles
            .into_iter()
            .map(crate::metadata::Delegation::try_from)
            .collect::<Result<Vec<_>>>()?;

        crate::metadata::Delegations::new(&keys, roles)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsMetadata {
    #[serde(rename = "_type")]
    typ: String,
    spec_version: String,
    version: u32,
    expires: DateTime<Utc>,
    targets: HashMap<String, TargetDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delegations: Option<Delegations>,
}

impl TargetsMetadata {
    pub fn from_targets(real: &crate::metadata::TargetsMetadata) -> Result<Self> {
        let targets = real
            .targets()
            .iter()
            .map(|(path, desc)| (path.value().to_string(), TargetDescription::from_target_description(desc)))
            .collect();

        Ok(TargetsMetadata {
            typ: "targets".into(),
            spec_version: "1.0.0".into(),
            version: real.version(),
            expires: *real.expires(),
            targets,
            delegations: real.delegations().map(Delegations::from),
        })
    }
}

impl TryFrom<TargetsMetadata> for crate::metadata::TargetsMetadata {
    type Error = Error;

    fn try_from(shim: TargetsMetadata) -> Result<Self> {
        let mut targets = HashMap::new();
        for (path, desc) in shim.targets {
            targets.insert(
                VirtualTargetPath::new(path)?,
                crate::metadata::TargetDescription::try_from(desc)?,
            );
        }

        let delegations = shim.delegations.map(Delegations::try_into).transpose()?;

        crate::metadata::TargetsMetadata::new(shim.version, shim.expires, targets, delegations)
    }
}
