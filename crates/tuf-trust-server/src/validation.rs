//! The atomic-update validation pipeline (spec §4.D.1).
//!
//! Runs entirely in memory against the raw bytes an upload claims for each role; nothing is
//! written to the [`MetaStore`] until every step below has passed. The previously-committed
//! snapshot (if any) is trusted as the authoritative list of which targets/delegated-targets
//! roles exist for a GUN: `MetaStore` has no "list roles" operation, so carrying that list
//! forward from snapshot to snapshot is how role enumeration and the "no dangling references"
//! check (step 8) are implemented here.

use std::collections::HashMap;

use chrono::Utc;
use serde_derive::Deserialize;
use tuf_core::crypto::{HashAlgorithm, KeyId, PublicKey, SignatureScheme};
use tuf_core::interchange::{DataInterchange, Json};
use tuf_core::metadata::{
    Metadata, MetadataDescription, MetadataPath, RootMetadata, SignedMetadata, SnapshotMetadata,
    SnapshotMetadataBuilder, TargetsMetadata, TimestampMetadata, TimestampMetadataBuilder,
};
use tuf_metastore::{Gun, MetaStore, MetaUpdate};
use tuf_signer::client::SignerClient;

use crate::error::ApiError;
use crate::server_key::ServerKeyManager;
use crate::trust_pinning::TrustPinning;

const ROOT: &str = "root";
const SNAPSHOT: &str = "snapshot";
const TARGETS: &str = "targets";
const TIMESTAMP: &str = "timestamp";

/// The structural family a role name belongs to, for matching against `signed._type`
/// (spec §4.D.1 step 1: delegated-targets roles, e.g. `targets/a/b`, are family `targets`).
fn structural_family(role_name: &str) -> &'static str {
    match role_name {
        ROOT => ROOT,
        SNAPSHOT => SNAPSHOT,
        TIMESTAMP => TIMESTAMP,
        _ => TARGETS,
    }
}

#[derive(Deserialize)]
struct TypePeek {
    signed: TypeOnly,
}

#[derive(Deserialize)]
struct TypeOnly {
    #[serde(rename = "_type")]
    type_: String,
}

fn sniff_type(bytes: &[u8]) -> Result<String, ApiError> {
    let peek: TypePeek = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::InvalidInput(format!("not valid SignedMetadata JSON: {e}")))?;
    Ok(peek.signed.type_)
}

fn parse<M>(bytes: &[u8]) -> Result<SignedMetadata<Json, M>, ApiError>
where
    M: Metadata,
{
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError::ValidationFailure { detail: format!("malformed {}: {e}", M::ROLE) })
}

fn check_not_expired<M: Metadata>(meta: &SignedMetadata<Json, M>) -> Result<(), ApiError> {
    if *meta.expires() < Utc::now() {
        return Err(ApiError::ValidationFailure {
            detail: format!("expired {} metadata", M::ROLE),
        });
    }
    Ok(())
}

fn describe_bytes(bytes: &[u8], version: u32) -> Result<MetadataDescription, ApiError> {
    MetadataDescription::from_reader(bytes, version, &[HashAlgorithm::Sha256])
        .map_err(|e| ApiError::ValidationFailure { detail: e.to_string() })
}

fn descriptions_match(a: &MetadataDescription, b: &MetadataDescription) -> bool {
    a.version() == b.version() && a.hashes() == b.hashes()
}

/// One parsed role from an upload, tagged with its claimed role name.
enum ParsedUpload {
    Root(SignedMetadata<Json, RootMetadata>),
    Targets { role_name: String, meta: SignedMetadata<Json, TargetsMetadata> },
    Snapshot(SignedMetadata<Json, SnapshotMetadata>),
    Timestamp(SignedMetadata<Json, TimestampMetadata>),
}

fn parse_upload(role_name: &str, bytes: &[u8]) -> Result<ParsedUpload, ApiError> {
    let claimed_family = structural_family(role_name);
    let actual_family = sniff_type(bytes)?;
    if actual_family != claimed_family {
        return Err(ApiError::ValidationFailure {
            detail: format!(
                "role {role_name:?} claimed but metadata declares _type {actual_family:?}"
            ),
        });
    }

    Ok(match claimed_family {
        ROOT => ParsedUpload::Root(parse::<RootMetadata>(bytes)?),
        SNAPSHOT => ParsedUpload::Snapshot(parse::<SnapshotMetadata>(bytes)?),
        TIMESTAMP => ParsedUpload::Timestamp(parse::<TimestampMetadata>(bytes)?),
        _ => ParsedUpload::Targets {
            role_name: role_name.to_string(),
            meta: parse::<TargetsMetadata>(bytes)?,
        },
    })
}

/// Handles bound together for one atomic-update validation run.
pub struct ValidationContext<'a, M, C> {
    pub store: &'a M,
    pub gun: &'a Gun,
    pub key_manager: &'a ServerKeyManager<C>,
    pub signer: &'a C,
    pub trust_pinning: &'a TrustPinning,
}

async fn fetch_current(store: &impl MetaStore, gun: &Gun, role: &str) -> Result<Vec<u8>, ApiError> {
    let path = MetadataPath::new(role.to_string())
        .map_err(|e| ApiError::InvalidRole(e.to_string()))?;
    let (_, bytes) = store.get_current(gun, &path).await?;
    Ok(bytes)
}

async fn fetch_current_opt(
    store: &impl MetaStore,
    gun: &Gun,
    role: &str,
) -> Result<Option<Vec<u8>>, ApiError> {
    match fetch_current(store, gun, role).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Validate and, where needed, generate server-side metadata for one atomic update, returning the
/// full set of `MetaUpdate`s ready for `MetaStore::update_many`.
pub async fn validate_atomic_update<M, C>(
    ctx: &ValidationContext<'_, M, C>,
    uploaded: HashMap<String, Vec<u8>>,
) -> Result<Vec<MetaUpdate>, ApiError>
where
    M: MetaStore,
    C: SignerClient,
{
    // Step 1: shape.
    let mut root: Option<SignedMetadata<Json, RootMetadata>> = None;
    let mut snapshot: Option<SignedMetadata<Json, SnapshotMetadata>> = None;
    let mut timestamp: Option<SignedMetadata<Json, TimestampMetadata>> = None;
    let mut targets: HashMap<String, SignedMetadata<Json, TargetsMetadata>> = HashMap::new();

    for (role_name, bytes) in &uploaded {
        match parse_upload(role_name, bytes)? {
            ParsedUpload::Root(meta) => root = Some(meta),
            ParsedUpload::Snapshot(meta) => snapshot = Some(meta),
            ParsedUpload::Timestamp(meta) => timestamp = Some(meta),
            ParsedUpload::Targets { role_name, meta } => {
                targets.insert(role_name, meta);
            }
        }
    }

    // Step 7 (expiry), checked up front for every uploaded role.
    if let Some(r) = &root {
        check_not_expired(r)?;
    }
    if let Some(s) = &snapshot {
        check_not_expired(s)?;
    }
    if let Some(t) = &timestamp {
        check_not_expired(t)?;
    }
    for t in targets.values() {
        check_not_expired(t)?;
    }

    // Step 2: root handling.
    let stored_root_bytes = fetch_current_opt(ctx.store, ctx.gun, ROOT).await?;
    let stored_root: Option<SignedMetadata<Json, RootMetadata>> = stored_root_bytes
        .as_deref()
        .map(parse::<RootMetadata>)
        .transpose()?;

    let effective_root = match (&root, &stored_root) {
        (Some(new_root), None) => {
            validate_root_creation(new_root, ctx.trust_pinning, ctx.gun)?;
            new_root.clone()
        }
        (Some(new_root), Some(old_root)) => {
            validate_root_rotation(old_root, new_root)?;
            new_root.clone()
        }
        (None, Some(old_root)) => old_root.clone(),
        (None, None) => {
            return Err(ApiError::ValidationFailure {
                detail: "no root metadata stored and none in this update".into(),
            })
        }
    };
    let root_meta = effective_root.as_ref();

    // Step 3: targets and delegations, authorized transitively from root.
    for (role_name, meta) in &targets {
        let (threshold, keys) = authorized_signers_for(ctx.store, ctx.gun, role_name, root_meta, &targets).await?;
        meta.verify(threshold, keys.values())
            .map_err(|e| ApiError::ValidationFailure { detail: format!("{role_name}: {e}") })?;
    }

    // Step 4: snapshot, enumerate-or-generate.
    let prior_snapshot_bytes = fetch_current_opt(ctx.store, ctx.gun, SNAPSHOT).await?;
    let prior_snapshot: Option<SnapshotMetadata> = prior_snapshot_bytes
        .as_deref()
        .map(parse::<SnapshotMetadata>)
        .transpose()?
        .map(|s| s.as_ref().clone());

    let mut expected_meta: HashMap<MetadataPath, MetadataDescription> = prior_snapshot
        .as_ref()
        .map(|s| s.meta().clone())
        .unwrap_or_default();
    for (role_name, meta) in &targets {
        let path = MetadataPath::new(role_name.clone())
            .map_err(|e| ApiError::InvalidRole(e.to_string()))?;
        let bytes = &uploaded[role_name];
        expected_meta.insert(path, describe_bytes(bytes, meta.version())?);
    }

    let (final_snapshot, snapshot_bytes): (SnapshotMetadata, Vec<u8>) = match &snapshot {
        Some(submitted) => {
            let submitted_meta = submitted.as_ref();
            if submitted_meta.meta().len() != expected_meta.len()
                || !submitted_meta
                    .meta()
                    .iter()
                    .all(|(path, desc)| expected_meta.get(path).map_or(false, |d| descriptions_match(d, desc)))
            {
                return Err(ApiError::ValidationFailure { detail: "bad hierarchy".into() });
            }
            let threshold = root_meta.snapshot().threshold();
            let keys = resolve_keys(root_meta.keys(), root_meta.snapshot().key_ids());
            submitted
                .verify(threshold, keys.values())
                .map_err(|e| ApiError::ValidationFailure { detail: format!("snapshot: {e}") })?;
            (submitted_meta.clone(), uploaded[SNAPSHOT].clone())
        }
        None => {
            let version = prior_snapshot.as_ref().map_or(1, |s| s.version() + 1);
            let mut builder = SnapshotMetadataBuilder::new().version(version);
            for (path, desc) in expected_meta {
                builder = builder.insert_metadata_description(path, desc);
            }
            let built = builder
                .build()
                .map_err(|e| ApiError::ValidationFailure { detail: e.to_string() })?;
            let (bytes, _signed) = sign_generated(ctx, SNAPSHOT, built.clone()).await?;
            (built, bytes)
        }
    };

    // Step 6 (monotonicity) for snapshot.
    check_monotonic(ctx.store, ctx.gun, SNAPSHOT, final_snapshot.version()).await?;

    // Step 5: timestamp, verify-or-generate, referencing the post-update snapshot.
    let snapshot_description = describe_bytes(&snapshot_bytes, final_snapshot.version())?;
    let (timestamp_bytes, timestamp_version) = match &timestamp {
        Some(submitted) => {
            let submitted_meta = submitted.as_ref();
            if !descriptions_match(submitted_meta.snapshot(), &snapshot_description) {
                return Err(ApiError::ValidationFailure {
                    detail: "bad hierarchy: timestamp does not reference the post-update snapshot"
                        .into(),
                });
            }
            let timestamp_key = ctx
                .key_manager
                .get_or_create(ctx.gun.as_str(), TIMESTAMP, SignatureScheme::Ed25519)
                .await?;
            submitted
                .verify(1, std::iter::once(&timestamp_key.public_key))
                .map_err(|e| ApiError::ValidationFailure { detail: format!("timestamp: {e}") })?;
            (uploaded[TIMESTAMP].clone(), submitted_meta.version())
        }
        None => {
            let version = fetch_current_opt(ctx.store, ctx.gun, TIMESTAMP)
                .await?
                .map(|bytes| parse::<TimestampMetadata>(&bytes))
                .transpose()?
                .map_or(1, |t| t.as_ref().version() + 1);
            let built = TimestampMetadataBuilder::from_metadata_description(snapshot_description)
                .version(version)
                .build()
                .map_err(|e| ApiError::ValidationFailure { detail: e.to_string() })?;
            let (bytes, _signed) = sign_generated(ctx, TIMESTAMP, built).await?;
            (bytes, version)
        }
    };
    check_monotonic(ctx.store, ctx.gun, TIMESTAMP, timestamp_version).await?;

    // Step 6 (monotonicity) for every uploaded role (root, targets).
    if let Some(r) = &root {
        check_monotonic(ctx.store, ctx.gun, ROOT, r.as_ref().version()).await?;
    }
    for (role_name, meta) in &targets {
        check_monotonic(ctx.store, ctx.gun, role_name, meta.as_ref().version()).await?;
    }

    let mut updates = Vec::new();
    if let Some(r) = &root {
        updates.push(MetaUpdate::new(
            MetadataPath::from_role(&tuf_core::metadata::Role::Root),
            r.as_ref().version(),
            uploaded[ROOT].clone(),
        ));
    }
    for (role_name, meta) in &targets {
        let path = MetadataPath::new(role_name.clone())
            .map_err(|e| ApiError::InvalidRole(e.to_string()))?;
        updates.push(MetaUpdate::new(path, meta.as_ref().version(), uploaded[role_name].clone()));
    }
    updates.push(MetaUpdate::new(
        MetadataPath::from_role(&tuf_core::metadata::Role::Snapshot),
        final_snapshot.version(),
        snapshot_bytes,
    ));
    updates.push(MetaUpdate::new(
        MetadataPath::from_role(&tuf_core::metadata::Role::Timestamp),
        timestamp_version,
        timestamp_bytes,
    ));

    Ok(updates)
}

fn resolve_keys(
    keys: &HashMap<KeyId, PublicKey>,
    key_ids: &std::collections::HashSet<KeyId>,
) -> HashMap<KeyId, PublicKey> {
    key_ids
        .iter()
        .filter_map(|id| keys.get(id).map(|k| (id.clone(), k.clone())))
        .collect()
}

fn validate_root_creation(
    new_root: &SignedMetadata<Json, RootMetadata>,
    trust_pinning: &TrustPinning,
    gun: &Gun,
) -> Result<(), ApiError> {
    let meta = new_root.as_ref();
    let root_keys = resolve_keys(meta.keys(), meta.root().key_ids());
    new_root
        .verify(meta.root().threshold(), root_keys.values())
        .map_err(|e| ApiError::ValidationFailure { detail: format!("root self-signature: {e}") })?;

    for role_keys in [meta.root().key_ids(), meta.snapshot().key_ids(), meta.targets().key_ids(), meta.timestamp().key_ids()] {
        if role_keys.iter().any(|id| !meta.keys().contains_key(id)) {
            return Err(ApiError::ValidationFailure {
                detail: "root's keys map does not cover every role's key ids".into(),
            });
        }
    }

    let root_key_ids: std::collections::HashSet<&KeyId> = meta.root().key_ids().iter().collect();
    trust_pinning.validate(gun.as_str(), &root_key_ids)
}

fn validate_root_rotation(
    old_root: &SignedMetadata<Json, RootMetadata>,
    new_root: &SignedMetadata<Json, RootMetadata>,
) -> Result<(), ApiError> {
    let old_meta = old_root.as_ref();
    let new_meta = new_root.as_ref();

    let old_keys = resolve_keys(old_meta.keys(), old_meta.root().key_ids());
    new_root
        .verify(old_meta.root().threshold(), old_keys.values())
        .map_err(|e| ApiError::ValidationFailure { detail: format!("root rotation, old keys: {e}") })?;

    let new_keys = resolve_keys(new_meta.keys(), new_meta.root().key_ids());
    new_root
        .verify(new_meta.root().threshold(), new_keys.values())
        .map_err(|e| ApiError::ValidationFailure { detail: format!("root rotation, new keys: {e}") })?;

    Ok(())
}

/// The threshold and public keys authorized to sign `role_name` (spec §4.D.1 step 3): root for
/// the top-level `targets` role, or the parent role's delegation entry for a delegated role.
async fn authorized_signers_for(
    store: &impl MetaStore,
    gun: &Gun,
    role_name: &str,
    root: &RootMetadata,
    uploaded_targets: &HashMap<String, SignedMetadata<Json, TargetsMetadata>>,
) -> Result<(u32, HashMap<KeyId, PublicKey>), ApiError> {
    if role_name == TARGETS {
        return Ok((root.targets().threshold(), resolve_keys(root.keys(), root.targets().key_ids())));
    }

    let (parent_name, _) = role_name
        .rsplit_once('/')
        .ok_or_else(|| ApiError::InvalidRole(role_name.to_string()))?;

    let parent: TargetsMetadata = match uploaded_targets.get(parent_name) {
        Some(meta) => meta.as_ref().clone(),
        None => {
            let bytes = fetch_current(store, gun, parent_name).await?;
            parse::<TargetsMetadata>(&bytes)?.as_ref().clone()
        }
    };

    let delegations = parent.delegations().ok_or_else(|| ApiError::ValidationFailure {
        detail: format!("{parent_name} has no delegations, cannot authorize {role_name}"),
    })?;
    let delegation = delegations
        .roles()
        .iter()
        .find(|d| d.role().to_string() == role_name)
        .ok_or_else(|| ApiError::ValidationFailure {
            detail: format!("{parent_name} does not delegate to {role_name}"),
        })?;

    Ok((delegation.threshold(), resolve_keys(delegations.keys(), delegation.key_ids())))
}

async fn check_monotonic(
    store: &impl MetaStore,
    gun: &Gun,
    role_name: &str,
    new_version: u32,
) -> Result<(), ApiError> {
    match fetch_current_opt(store, gun, role_name).await? {
        None => Ok(()),
        Some(bytes) => {
            let current_version = match structural_family(role_name) {
                ROOT => parse::<RootMetadata>(&bytes)?.as_ref().version(),
                SNAPSHOT => parse::<SnapshotMetadata>(&bytes)?.as_ref().version(),
                TIMESTAMP => parse::<TimestampMetadata>(&bytes)?.as_ref().version(),
                _ => parse::<TargetsMetadata>(&bytes)?.as_ref().version(),
            };
            if new_version <= current_version {
                return Err(ApiError::VersionConflict(format!(
                    "{role_name}: attempted {new_version}, current {current_version}"
                )));
            }
            Ok(())
        }
    }
}

/// Sign server-generated metadata with the role's managed key, returning the canonical bytes to
/// store alongside the `SignedMetadata` wrapper.
async fn sign_generated<M, C, M2>(
    ctx: &ValidationContext<'_, M, C>,
    role: &str,
    metadata: M2,
) -> Result<(Vec<u8>, SignedMetadata<Json, M2>), ApiError>
where
    M: MetaStore,
    C: SignerClient,
    M2: Metadata,
{
    let key = ctx
        .key_manager
        .get_or_create(ctx.gun.as_str(), role, SignatureScheme::Ed25519)
        .await?;
    let raw = Json::serialize(&metadata)?;
    let canonical = Json::canonicalize(&raw)?;
    let signature = ctx.signer.sign(&key.key_id, &canonical).await?;

    let signed = SignedMetadata::<Json, M2>::from_signatures(metadata, vec![signature]);
    let signed_raw = Json::serialize(&signed)?;
    let bytes = Json::canonicalize(&signed_raw)?;
    Ok((bytes, signed))
}
