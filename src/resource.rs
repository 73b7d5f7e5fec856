//! Mount resources: secret engines (`vault_mount`) and auth methods
//! (`vault_auth_backend`).
//!
//! State layout:
//!
//! | key                       | type                                      |
//! |---------------------------|-------------------------------------------|
//! | `id`                      | mount path                                |
//! | `path`, `type`            | string                                    |
//! | `description`             | string                                    |
//! | `local`, `seal_wrap`      | bool                                      |
//! | `external_entropy_access` | bool (secret engines only)                |
//! | `options`                 | map of string                             |
//! | `accessor`                | string, computed                          |
//! | `tune`                    | list of at most one tune block            |

use crate::interface::{ResourceHandler, ResourceState};
use crate::provider::{Feature, ProviderContext};
use crate::vault::error::ValidationError;
use crate::vault::merge::merge_tune;
use crate::vault::mounts::{self, EnableMountRequest, MountKind};
use crate::vault::tune::{expand_tune, flatten_tune, MountConfigInput, MountTuneConfig};
use crate::vault::{MountId, VaultError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Validated configuration of a mount resource.
#[derive(Debug, Clone, PartialEq)]
pub struct MountResourceConfig {
    pub path: MountId,
    pub mount_type: String,
    pub description: Option<String>,
    pub local: bool,
    pub seal_wrap: bool,
    pub external_entropy_access: bool,
    pub options: BTreeMap<String, String>,
    /// The raw `tune` blocks, kept so updates can re-expand them with
    /// clearing semantics.
    pub tune_blocks: Vec<Map<String, Value>>,
    /// `None` when the configuration has no tune block.
    pub tune: Option<MountTuneConfig>,
}

#[derive(Debug, Deserialize)]
struct RawMountConfig {
    path: String,
    #[serde(rename = "type")]
    mount_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    seal_wrap: bool,
    #[serde(default)]
    external_entropy_access: bool,
    #[serde(default)]
    options: BTreeMap<String, String>,
    #[serde(default)]
    tune: Vec<Map<String, Value>>,
}

impl MountResourceConfig {
    /// Tune settings to send: on create an unset list is left alone, on
    /// update it is explicitly cleared.
    fn tune_input(&self, clear_unset_lists: bool) -> Result<MountTuneConfig, ValidationError> {
        expand_tune(&self.tune_blocks, clear_unset_lists)
    }
}

/// Handler for one mount table. Use [`MountResource::secret`] for secret
/// engines and [`MountResource::auth`] for auth methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountResource {
    kind: MountKind,
}

impl MountResource {
    pub fn new(kind: MountKind) -> Self {
        Self { kind }
    }

    pub fn secret() -> Self {
        Self::new(MountKind::Secret)
    }

    pub fn auth() -> Self {
        Self::new(MountKind::Auth)
    }

    /// Rejects changes to settings Vault only accepts when a mount is
    /// enabled. Keys missing from `prior` are not compared.
    fn check_immutable(
        &self,
        prior: &ResourceState,
        config: &MountResourceConfig,
    ) -> Result<(), VaultError> {
        let mut wanted = vec![
            ("type", json!(config.mount_type)),
            ("local", json!(config.local)),
            ("seal_wrap", json!(config.seal_wrap)),
        ];
        if self.kind == MountKind::Secret {
            wanted.push(("external_entropy_access", json!(config.external_entropy_access)));
        }
        for (field, value) in wanted {
            match prior.get(field) {
                Some(current) if !current.is_null() && *current != value => {
                    return Err(ValidationError::new(
                        field,
                        format!(
                            "cannot change from {} to {} in place; destroy and re-create the mount",
                            current, value
                        ),
                    )
                    .into());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_features(
        &self,
        ctx: &ProviderContext,
        tune: &MountTuneConfig,
    ) -> Result<(), VaultError> {
        if tune.plugin_version.is_some() {
            ctx.ensure(Feature::PluginVersion)?;
        }
        if tune.identity_token_key.is_some() {
            ctx.ensure(Feature::IdentityTokenKey)?;
        }
        if tune.user_lockout_config.is_some() {
            if self.kind != MountKind::Auth {
                return Err(ValidationError::new(
                    "user_lockout_config",
                    "only supported on auth methods",
                )
                .into());
            }
            ctx.ensure(Feature::UserLockout)?;
        }
        Ok(())
    }

    /// Reads the mount at `id` and renders its state. `input` is the tune
    /// configuration the user asked for, used to suppress server defaults.
    async fn read_state(
        &self,
        ctx: &ProviderContext,
        id: &MountId,
        input: Option<&MountTuneConfig>,
    ) -> Result<Option<ResourceState>, VaultError> {
        let path = id.path();
        let snapshot = match mounts::read_mount(&ctx.client, self.kind, path).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                warn!("{} at {} not found, removing from state", self.kind, path);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let tune = match mounts::read_tune(&ctx.client, self.kind, path).await {
            Ok(tune) => tune,
            Err(e) if e.is_not_found() => {
                warn!("{} at {} vanished during read, removing from state", self.kind, path);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let tune_block = merge_tune(&flatten_tune(&tune), input);

        let mut state = Map::new();
        state.insert("id".into(), json!(id.to_string()));
        state.insert("path".into(), json!(path));
        state.insert("type".into(), json!(snapshot.mount_type));
        state.insert("description".into(), json!(snapshot.description));
        state.insert("accessor".into(), json!(snapshot.accessor));
        state.insert("local".into(), json!(snapshot.local));
        state.insert("seal_wrap".into(), json!(snapshot.seal_wrap));
        if self.kind == MountKind::Secret {
            state.insert(
                "external_entropy_access".into(),
                json!(snapshot.external_entropy_access),
            );
        }
        state.insert("options".into(), json!(snapshot.options));
        state.insert("tune".into(), Value::Array(vec![Value::Object(tune_block)]));
        Ok(Some(state))
    }
}

/// Extracts the mount ID from a state map.
fn state_id(state: &ResourceState) -> Result<MountId, VaultError> {
    let raw = state
        .get("id")
        .or_else(|| state.get("path"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(MountId::new(raw)?)
}

/// Mount options recorded in state; absent or null means none.
fn state_options(state: &ResourceState) -> Result<BTreeMap<String, String>, VaultError> {
    match state.get("options") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

/// The tune input recorded in state, used as the merge reference on read.
fn state_tune(state: &ResourceState) -> Result<Option<MountTuneConfig>, VaultError> {
    match state.get("tune") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let blocks: Vec<Map<String, Value>> = serde_json::from_value(value.clone())?;
            if blocks.is_empty() {
                return Ok(None);
            }
            Ok(Some(expand_tune(&blocks, false)?))
        }
    }
}

#[async_trait]
impl ResourceHandler for MountResource {
    type Config = MountResourceConfig;

    fn parse_config(&self, raw: &ResourceState) -> Result<MountResourceConfig, VaultError> {
        let raw: RawMountConfig = serde_json::from_value(Value::Object(raw.clone()))?;
        let path = MountId::new(&raw.path)?;
        if raw.mount_type.trim().is_empty() {
            return Err(ValidationError::new("type", "must not be empty").into());
        }
        if self.kind == MountKind::Auth && raw.external_entropy_access {
            return Err(ValidationError::new(
                "external_entropy_access",
                "only supported on secret engines",
            )
            .into());
        }
        let tune = if raw.tune.is_empty() {
            None
        } else {
            Some(expand_tune(&raw.tune, false)?)
        };
        Ok(MountResourceConfig {
            path,
            mount_type: raw.mount_type,
            description: raw.description,
            local: raw.local,
            seal_wrap: raw.seal_wrap,
            external_entropy_access: raw.external_entropy_access,
            options: raw.options,
            tune_blocks: raw.tune,
            tune,
        })
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        config: &MountResourceConfig,
    ) -> Result<ResourceState, VaultError> {
        let tune = config.tune_input(false)?;
        self.check_features(ctx, &tune)?;
        let path = config.path.path();

        let mut mount_config = tune.to_wire();
        // Lockout settings are only honored by the tune endpoint.
        let lockout = mount_config.user_lockout_config.take();
        let request = EnableMountRequest {
            mount_type: config.mount_type.clone(),
            description: config.description.clone(),
            local: config.local,
            seal_wrap: config.seal_wrap,
            external_entropy_access: config.external_entropy_access,
            options: config.options.clone(),
            config: mount_config,
        };
        mounts::enable_mount(&ctx.client, self.kind, path, &request).await?;

        if let Some(lockout) = lockout {
            let lockout_only = MountConfigInput {
                user_lockout_config: Some(lockout),
                ..Default::default()
            };
            mounts::tune_mount(&ctx.client, self.kind, path, &lockout_only).await?;
        }
        info!("Created {} at {}", self.kind, path);

        self.read_state(ctx, &config.path, config.tune.as_ref())
            .await?
            .ok_or_else(|| VaultError::MountNotFound(path.to_string()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: &ResourceState,
    ) -> Result<Option<ResourceState>, VaultError> {
        let id = match state_id(state) {
            Ok(id) => id,
            Err(VaultError::Decode(e)) => {
                warn!("{}, removing from state", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let input = state_tune(state)?;
        self.read_state(ctx, &id, input.as_ref()).await
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &ResourceState,
        config: &MountResourceConfig,
    ) -> Result<Option<ResourceState>, VaultError> {
        let tune = config.tune_input(true)?;
        self.check_features(ctx, &tune)?;
        self.check_immutable(prior, config)?;

        let prior_id = state_id(prior)?;
        if prior_id != config.path {
            mounts::remount(&ctx.client, self.kind, prior_id.path(), config.path.path()).await?;
        }

        let mut body = tune.to_wire();
        body.description = Some(config.description.clone().unwrap_or_default());
        if state_options(prior)? != config.options {
            body.options = Some(config.options.clone());
        }
        mounts::tune_mount(&ctx.client, self.kind, config.path.path(), &body).await?;
        info!("Updated {} at {}", self.kind, config.path);

        self.read_state(ctx, &config.path, config.tune.as_ref()).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: &ResourceState) -> Result<(), VaultError> {
        let id = state_id(state)?;
        match mounts::disable_mount(&ctx.client, self.kind, id.path()).await {
            Err(e) if e.is_not_found() => {
                warn!("{} at {} already gone", self.kind, id);
                Ok(())
            }
            other => other,
        }
    }

    async fn exists(
        &self,
        ctx: &ProviderContext,
        state: &ResourceState,
    ) -> Result<bool, VaultError> {
        let id = state_id(state)?;
        match mounts::read_mount(&ctx.client, self.kind, id.path()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn import(
        &self,
        ctx: &ProviderContext,
        id: &str,
    ) -> Result<Option<ResourceState>, VaultError> {
        let id: MountId = id.parse()?;
        info!("Importing {} at {}", self.kind, id);
        self.read_state(ctx, &id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: Value) -> ResourceState {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_parse_config() {
        crate::init_test_logging();
        let config = MountResource::secret()
            .parse_config(&raw(json!({
                "path": "/team/kv/",
                "type": "kv",
                "options": {"version": "2"},
                "tune": [{"default_lease_ttl": "1h", "token_type": "default-service"}]
            })))
            .unwrap();
        assert_eq!(config.path.path(), "team/kv");
        assert_eq!(config.mount_type, "kv");
        assert_eq!(config.options.get("version").map(String::as_str), Some("2"));
        let tune = config.tune.unwrap();
        assert_eq!(tune.default_lease_ttl.as_deref(), Some("1h"));
    }

    #[test]
    fn test_parse_config_without_tune() {
        let config = MountResource::auth()
            .parse_config(&raw(json!({"path": "approle", "type": "approle"})))
            .unwrap();
        assert!(config.tune.is_none());
        assert!(config.tune_blocks.is_empty());
    }

    #[test]
    fn test_parse_config_rejects_invalid_input() {
        let handler = MountResource::secret();
        let err = handler
            .parse_config(&raw(json!({"path": "kv", "type": "kv", "tune": [{"max_lease_ttl": "soon"}]})))
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(ref v) if v.field == "max_lease_ttl"));

        let err = handler
            .parse_config(&raw(json!({"path": "", "type": "kv"})))
            .unwrap_err();
        assert!(matches!(err, VaultError::Decode(_)));

        let err = handler
            .parse_config(&raw(json!({"path": "kv", "type": " "})))
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));

        let err = MountResource::auth()
            .parse_config(&raw(json!({"path": "x", "type": "userpass", "external_entropy_access": true})))
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn test_state_helpers() {
        let state = raw(json!({"id": "kv", "tune": [{"token_type": "", "max_lease_ttl": "1h"}]}));
        assert_eq!(state_id(&state).unwrap().path(), "kv");
        let tune = state_tune(&state).unwrap().unwrap();
        assert_eq!(tune.token_type, None);
        assert_eq!(tune.max_lease_ttl.as_deref(), Some("1h"));

        assert!(state_tune(&raw(json!({"id": "kv"}))).unwrap().is_none());
        assert!(state_id(&raw(json!({}))).is_err());
    }
}
