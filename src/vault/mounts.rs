//! Mount operations for secret engines and auth methods.
//!
//! Secret engines live under `/v1/sys/mounts/{path}` and auth methods under
//! `/v1/sys/auth/{path}`; apart from the prefix the two APIs are the same, so
//! every function here takes a [`MountKind`].

use crate::vault::tune::{MountConfigInput, MountConfigOutput};
use crate::vault::{VaultClient, VaultError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const REMOUNT_POLL_ATTEMPTS: usize = 60;
const REMOUNT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Which Vault mount table a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    #[default]
    Secret,
    Auth,
}

impl MountKind {
    fn sys_prefix(self) -> &'static str {
        match self {
            MountKind::Secret => "/v1/sys/mounts",
            MountKind::Auth => "/v1/sys/auth",
        }
    }

    /// Path of the mount as `sys/remount` expects it.
    fn remount_path(self, path: &str) -> String {
        match self {
            MountKind::Secret => path.to_string(),
            MountKind::Auth => format!("auth/{}", path),
        }
    }
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountKind::Secret => f.write_str("secret engine"),
            MountKind::Auth => f.write_str("auth method"),
        }
    }
}

/// Body of `POST /v1/sys/{mounts,auth}/{path}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnableMountRequest {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub seal_wrap: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external_entropy_access: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    pub config: MountConfigInput,
}

/// A mount as listed by `GET /v1/sys/{mounts,auth}`. Read fresh for every
/// operation and never cached.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MountSnapshot {
    #[serde(rename = "type", default)]
    pub mount_type: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub seal_wrap: bool,
    #[serde(default)]
    pub external_entropy_access: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub plugin_version: String,
    #[serde(default)]
    pub config: MountConfigOutput,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn mount_url(kind: MountKind, path: &str) -> String {
    format!("{}/{}", kind.sys_prefix(), path.trim_matches('/'))
}

/// Enables a secret engine or auth method at `path`.
pub async fn enable_mount(
    client: &VaultClient,
    kind: MountKind,
    path: &str,
    request: &EnableMountRequest,
) -> Result<(), VaultError> {
    info!("Enabling {} {:?} at {}", kind, request.mount_type, path);
    client
        .post_with_body(&mount_url(kind, path), serde_json::to_value(request)?)
        .await
        .map_err(|e| e.context(format!("error enabling {} at {}", kind, path)))?;
    Ok(())
}

/// Writes tune settings for the mount at `path`.
pub async fn tune_mount(
    client: &VaultClient,
    kind: MountKind,
    path: &str,
    config: &MountConfigInput,
) -> Result<(), VaultError> {
    let body = serde_json::to_value(config)?;
    if body.as_object().is_some_and(Map::is_empty) {
        debug!("Nothing to tune for {}", path);
        return Ok(());
    }
    info!("Tuning {} at {}", kind, path);
    client
        .post_with_body(&format!("{}/tune", mount_url(kind, path)), body)
        .await
        .map_err(|e| e.context(format!("error tuning {} at {}", kind, path)))?;
    Ok(())
}

/// Reads the tune settings of the mount at `path`.
pub async fn read_tune(
    client: &VaultClient,
    kind: MountKind,
    path: &str,
) -> Result<MountConfigOutput, VaultError> {
    let body = client
        .get(&format!("{}/tune", mount_url(kind, path)))
        .await
        .map_err(|e| e.context(format!("error reading tune config for {}", path)))?;
    Ok(MountConfigOutput::from_response(&body)?)
}

/// Looks up the mount at `path` in the mount table.
///
/// Returns [`VaultError::MountNotFound`] when no mount is registered there.
pub async fn read_mount(
    client: &VaultClient,
    kind: MountKind,
    path: &str,
) -> Result<MountSnapshot, VaultError> {
    let body = client
        .get(kind.sys_prefix())
        .await
        .map_err(|e| e.context(format!("error listing {}s", kind)))?;
    find_mount(&body, path)
}

/// Finds `path` in a mount table listing, with or without the `data` envelope.
pub fn find_mount(listing: &Value, path: &str) -> Result<MountSnapshot, VaultError> {
    let table = listing
        .get("data")
        .filter(|d| d.is_object())
        .unwrap_or(listing);
    let key = format!("{}/", path.trim_matches('/'));
    match table.get(&key) {
        Some(entry) => Ok(MountSnapshot::deserialize(entry)?),
        None => Err(VaultError::MountNotFound(path.to_string())),
    }
}

/// Moves a mount to a new path, keeping its data.
///
/// Newer servers migrate asynchronously and return a migration ID; in that
/// case this waits for the migration to finish so the mount can be tuned
/// at its new path right away.
pub async fn remount(
    client: &VaultClient,
    kind: MountKind,
    from: &str,
    to: &str,
) -> Result<(), VaultError> {
    info!("Remounting {} from {} to {}", kind, from, to);
    let body = json!({
        "from": kind.remount_path(from.trim_matches('/')),
        "to": kind.remount_path(to.trim_matches('/')),
    });
    let response = client
        .post_with_body("/v1/sys/remount", body)
        .await
        .map_err(|e| e.context(format!("error remounting {} to {}", from, to)))?;

    let migration_id = response
        .get("data")
        .filter(|d| d.is_object())
        .unwrap_or(&response)
        .get("migration_id")
        .and_then(Value::as_str);
    match migration_id {
        Some(id) => wait_for_migration(client, id)
            .await
            .map_err(|e| e.context(format!("error remounting {} to {}", from, to))),
        None => Ok(()),
    }
}

async fn wait_for_migration(client: &VaultClient, migration_id: &str) -> Result<(), VaultError> {
    let status_path = format!("/v1/sys/remount/status/{}", migration_id);
    for _ in 0..REMOUNT_POLL_ATTEMPTS {
        let body = client.get(&status_path).await?;
        let status = body
            .pointer("/data/migration_info/status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match status {
            "success" => return Ok(()),
            "failure" => {
                return Err(VaultError::Api(format!(
                    "remount migration {} failed",
                    migration_id
                )))
            }
            other => debug!("Remount migration {} status: {:?}", migration_id, other),
        }
        sleep(REMOUNT_POLL_INTERVAL).await;
    }
    Err(VaultError::Api(format!(
        "remount migration {} did not finish in time",
        migration_id
    )))
}

/// Disables the mount at `path`. Vault treats an already-absent mount as a
/// successful delete.
pub async fn disable_mount(
    client: &VaultClient,
    kind: MountKind,
    path: &str,
) -> Result<(), VaultError> {
    info!("Disabling {} at {}", kind, path);
    client
        .delete(&mount_url(kind, path))
        .await
        .map_err(|e| e.context(format!("error disabling {} at {}", kind, path)))?;
    Ok(())
}
