//! The actix-web surface for the trust server (spec §6).
//!
//! `trust_server::TrustServer` has no notion of HTTP; this module is the thin ingress layer that
//! the rest of spec §1's Non-goals call "out of scope" (routing boilerplate, auth) but which a
//! runnable binary still needs a real implementation of. Route matching here is deliberately
//! manual rather than leaning on actix's path-segment extractors: both a GUN (`example/foo`) and
//! a delegated-targets role (`targets/releases`) can contain `/`, so the two are ambiguous under
//! ordinary `{gun}/{role}`-style patterns. Instead every request under `/v2/` is captured as one
//! tail string and parsed against the literal suffixes spec.md §6 lists.

use std::collections::HashMap;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde_derive::Deserialize;
use tuf_metastore::{Gun, MetaStore};
use tuf_signer::client::SignerClient;

use crate::change_feed::ChangeFeedQuery;
use crate::error::ApiError;
use crate::trust_server::TrustServer;

const TUF_SEGMENT: &str = "/_trust/tuf/";
const CHANGEFEED_SEGMENT: &str = "/_trust/changefeed";

/// Everything a request handler needs: the pipeline itself, plus the one piece of ingress policy
/// (`ingress.repoPrefixes`, spec §6) this dev-mode passthrough still enforces before routing a
/// GUN-scoped request any further. Real prefix-based authorization, and auth generally, stay out
/// of scope (spec §1) — this is only the allow-list check the config already carries.
pub struct AppState<M, C> {
    pub server: Arc<TrustServer<M, C>>,
    pub repo_prefixes: Vec<String>,
}

fn check_repo_prefix<M, C>(state: &AppState<M, C>, gun: &str) -> Result<(), ApiError> {
    if state.repo_prefixes.is_empty() {
        return Ok(());
    }
    if state.repo_prefixes.iter().any(|prefix| gun.starts_with(prefix.as_str())) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Register every route in spec.md §6's table under `scope`.
pub fn configure<M, C>(cfg: &mut web::ServiceConfig)
where
    M: MetaStore + 'static,
    C: SignerClient + 'static,
{
    cfg.route("/v2/", web::get().to(liveness))
        .route("/v2/_trust/changefeed", web::get().to(global_changefeed::<M, C>))
        .route("/v2/{tail:.*}", web::get().to(dispatch_get::<M, C>))
        .route("/v2/{tail:.*}", web::post().to(dispatch_post::<M, C>))
        .route("/v2/{tail:.*}", web::delete().to(dispatch_delete::<M, C>));
}

async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({}))
}

#[derive(Debug, Deserialize)]
struct ChangeFeedQueryParams {
    #[serde(default)]
    change_id: Option<String>,
    #[serde(default)]
    records: Option<i64>,
    #[serde(default)]
    reversed: bool,
}

impl From<ChangeFeedQueryParams> for ChangeFeedQuery {
    fn from(params: ChangeFeedQueryParams) -> ChangeFeedQuery {
        ChangeFeedQuery {
            change_id: params.change_id,
            records: params.records,
            reversed: params.reversed,
        }
    }
}

async fn global_changefeed<M, C>(
    state: web::Data<AppState<M, C>>,
    query: web::Query<ChangeFeedQueryParams>,
) -> Result<HttpResponse, ApiError>
where
    M: MetaStore,
    C: SignerClient,
{
    let records = state.server.get_changes_global(&query.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "records": records })))
}

fn parse_gun(raw: &str) -> Result<Gun, ApiError> {
    if raw.contains('*') {
        return Err(ApiError::InvalidInput("GUN patterns must not contain '*'".into()));
    }
    Gun::new(raw.to_string()).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

/// One parsed request under `/v2/{tail}`, spec.md §6's table collapsed into an enum so each
/// HTTP method's dispatcher can match on the shape it accepts.
enum TufPath<'a> {
    /// `{gun}/_trust/tuf/` — atomic update (POST) or delete-GUN (DELETE).
    Root { gun: &'a str },
    /// `{gun}/_trust/tuf/{snapshot|timestamp}.key` — get-or-create (GET) or rotate (POST).
    Key { gun: &'a str, role: &'a str },
    /// `{gun}/_trust/changefeed` — per-GUN change feed (GET).
    ChangeFeed { gun: &'a str },
    /// `{gun}/_trust/tuf/{tufRole}.json` — current role (GET).
    CurrentRole { gun: &'a str, role: &'a str },
    /// `{gun}/_trust/tuf/{tufRole}.{checksum}.json` — historical by checksum (GET).
    ByChecksum { gun: &'a str, role: &'a str, checksum: &'a str },
    /// `{gun}/_trust/tuf/{version}.{tufRole}.json` — historical by version (GET).
    ByVersion { gun: &'a str, role: &'a str, version: u32 },
}

fn parse_tail(tail: &str) -> Option<TufPath<'_>> {
    let tail = tail.trim_end_matches('/');

    if let Some(gun) = tail.strip_suffix(CHANGEFEED_SEGMENT) {
        return Some(TufPath::ChangeFeed { gun });
    }

    let after_tuf = tail.find(TUF_SEGMENT)?;
    let gun = &tail[..after_tuf];
    let rest = &tail[after_tuf + TUF_SEGMENT.len()..];

    if rest.is_empty() {
        return Some(TufPath::Root { gun });
    }
    if rest == "snapshot.key" {
        return Some(TufPath::Key { gun, role: "snapshot" });
    }
    if rest == "timestamp.key" {
        return Some(TufPath::Key { gun, role: "timestamp" });
    }

    let filename = rest.strip_suffix(".json")?;
    // `filename` is either `<role>`, `<role>.<checksum>`, or `<version>.<role>`; role names
    // never contain `.` (delegated roles use `/`), so the first dot disambiguates.
    match filename.rsplit_once('.') {
        None => Some(TufPath::CurrentRole { gun, role: filename }),
        Some((prefix, suffix)) => {
            if let Ok(version) = prefix.parse::<u32>() {
                Some(TufPath::ByVersion { gun, role: suffix, version })
            } else {
                Some(TufPath::ByChecksum { gun, role: prefix, checksum: suffix })
            }
        }
    }
}

async fn dispatch_get<M, C>(
    state: web::Data<AppState<M, C>>,
    path: web::Path<String>,
    query: web::Query<ChangeFeedQueryParams>,
) -> Result<HttpResponse, ApiError>
where
    M: MetaStore,
    C: SignerClient,
{
    let tail = path.into_inner();
    match parse_tail(&tail) {
        Some(TufPath::Key { gun, role }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let key = state.server.get_key(&gun, role).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "keytype": key.scheme().to_string(),
                "keyid": key.key_id().to_string(),
                "keyval": { "public": data_encoding::HEXLOWER.encode(key.as_bytes()) },
            })))
        }
        Some(TufPath::ChangeFeed { gun }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let records = state.server.get_changes_for_gun(&gun, &query.into_inner().into()).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({ "records": records })))
        }
        Some(TufPath::CurrentRole { gun, role }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let bytes = state.server.get_current(&gun, role).await?;
            Ok(HttpResponse::Ok().content_type("application/json").body(bytes))
        }
        Some(TufPath::ByChecksum { gun, role, checksum }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let bytes = state.server.get_checksum(&gun, role, checksum).await?;
            Ok(HttpResponse::Ok().content_type("application/json").body(bytes))
        }
        Some(TufPath::ByVersion { gun, role, version }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let bytes = state.server.get_version(&gun, role, version).await?;
            Ok(HttpResponse::Ok().content_type("application/json").body(bytes))
        }
        Some(TufPath::Root { .. }) | None => {
            Err(ApiError::NotFound(format!("no such route: {tail}")))
        }
    }
}

async fn dispatch_post<M, C>(
    state: web::Data<AppState<M, C>>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError>
where
    M: MetaStore,
    C: SignerClient,
{
    let tail = path.into_inner();
    match parse_tail(&tail) {
        Some(TufPath::Root { gun }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let uploaded = collect_multipart(payload).await?;
            state.server.atomic_update(&gun, uploaded).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({})))
        }
        Some(TufPath::Key { gun, role }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            let key = state.server.rotate_key(&gun, role).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "keytype": key.scheme().to_string(),
                "keyid": key.key_id().to_string(),
                "keyval": { "public": data_encoding::HEXLOWER.encode(key.as_bytes()) },
            })))
        }
        _ => Err(ApiError::NotFound(format!("no such route: {tail}"))),
    }
}

async fn dispatch_delete<M, C>(
    state: web::Data<AppState<M, C>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError>
where
    M: MetaStore,
    C: SignerClient,
{
    let tail = path.into_inner();
    match parse_tail(&tail) {
        Some(TufPath::Root { gun }) => {
            check_repo_prefix(&state, gun)?;
            let gun = parse_gun(gun)?;
            state.server.delete_gun(&gun).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({})))
        }
        _ => Err(ApiError::NotFound(format!("no such route: {tail}"))),
    }
}

/// Read a `multipart/form-data` body into a role-name → bytes map. Each part is named
/// `<role>.json` (spec §6); the `.json` suffix is stripped so the map keys are bare role names,
/// matching what `validation::validate_atomic_update` expects.
async fn collect_multipart(mut payload: Multipart) -> Result<HashMap<String, Vec<u8>>, ApiError> {
    let mut uploaded = HashMap::new();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .ok_or_else(|| ApiError::InvalidInput("multipart part missing a name".to_string()))?
            .to_string();
        let role_name = name.strip_suffix(".json").unwrap_or(&name).to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?;
            bytes.extend_from_slice(&chunk);
        }
        uploaded.insert(role_name, bytes);
    }

    Ok(uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atomic_update_root() {
        match parse_tail("example/foo/_trust/tuf/") {
            Some(TufPath::Root { gun }) => assert_eq!(gun, "example/foo"),
            _ => panic!("expected Root"),
        }
    }

    #[test]
    fn parses_current_role() {
        match parse_tail("example/foo/_trust/tuf/timestamp.json") {
            Some(TufPath::CurrentRole { gun, role }) => {
                assert_eq!(gun, "example/foo");
                assert_eq!(role, "timestamp");
            }
            _ => panic!("expected CurrentRole"),
        }
    }

    #[test]
    fn parses_delegated_role_with_slash() {
        match parse_tail("example/foo/_trust/tuf/targets/releases.json") {
            Some(TufPath::CurrentRole { gun, role }) => {
                assert_eq!(gun, "example/foo");
                assert_eq!(role, "targets/releases");
            }
            _ => panic!("expected CurrentRole"),
        }
    }

    #[test]
    fn parses_by_checksum() {
        let checksum = "a".repeat(64);
        let tail = format!("example/foo/_trust/tuf/targets.{checksum}.json");
        match parse_tail(&tail) {
            Some(TufPath::ByChecksum { gun, role, checksum: c }) => {
                assert_eq!(gun, "example/foo");
                assert_eq!(role, "targets");
                assert_eq!(c, checksum);
            }
            _ => panic!("expected ByChecksum"),
        }
    }

    #[test]
    fn parses_by_version() {
        match parse_tail("example/foo/_trust/tuf/4.targets.json") {
            Some(TufPath::ByVersion { gun, role, version }) => {
                assert_eq!(gun, "example/foo");
                assert_eq!(role, "targets");
                assert_eq!(version, 4);
            }
            _ => panic!("expected ByVersion"),
        }
    }

    #[test]
    fn parses_key_endpoint() {
        match parse_tail("example/foo/_trust/tuf/snapshot.key") {
            Some(TufPath::Key { gun, role }) => {
                assert_eq!(gun, "example/foo");
                assert_eq!(role, "snapshot");
            }
            _ => panic!("expected Key"),
        }
    }

    #[test]
    fn parses_per_gun_changefeed() {
        match parse_tail("example/foo/_trust/changefeed") {
            Some(TufPath::ChangeFeed { gun }) => assert_eq!(gun, "example/foo"),
            _ => panic!("expected ChangeFeed"),
        }
    }

    #[test]
    fn gun_with_asterisk_is_rejected() {
        assert!(parse_gun("example/*").is_err());
    }
}
