//! Mount tune configuration: the typed model plus the expand (state block to
//! wire) and flatten (wire to state block) conversions.
//!
//! State blocks are Terraform-shaped: a nested block is a list of at most one
//! JSON object. The wire side uses the literal Vault API field names of
//! `POST/GET /v1/sys/{mounts,auth}/{path}/tune`.

use crate::vault::duration::{flatten_duration, validate_duration};
use crate::vault::error::ValidationError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LEASE_TTL: &str = "default_lease_ttl";
pub const MAX_LEASE_TTL: &str = "max_lease_ttl";
pub const AUDIT_NON_HMAC_REQUEST_KEYS: &str = "audit_non_hmac_request_keys";
pub const AUDIT_NON_HMAC_RESPONSE_KEYS: &str = "audit_non_hmac_response_keys";
pub const LISTING_VISIBILITY: &str = "listing_visibility";
pub const PASSTHROUGH_REQUEST_HEADERS: &str = "passthrough_request_headers";
pub const ALLOWED_RESPONSE_HEADERS: &str = "allowed_response_headers";
pub const TOKEN_TYPE: &str = "token_type";
pub const PLUGIN_VERSION: &str = "plugin_version";
pub const IDENTITY_TOKEN_KEY: &str = "identity_token_key";
pub const USER_LOCKOUT_CONFIG: &str = "user_lockout_config";
pub const LOCKOUT_THRESHOLD: &str = "lockout_threshold";
pub const LOCKOUT_DURATION: &str = "lockout_duration";
pub const LOCKOUT_COUNTER_RESET_DURATION: &str = "lockout_counter_reset_duration";
pub const LOCKOUT_DISABLE: &str = "lockout_disable";

/// Token type issued by an auth mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "default-service")]
    DefaultService,
    #[serde(rename = "default-batch")]
    DefaultBatch,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "batch")]
    Batch,
}

impl TokenType {
    pub const ALL: [TokenType; 4] = [
        TokenType::DefaultService,
        TokenType::DefaultBatch,
        TokenType::Service,
        TokenType::Batch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::DefaultService => "default-service",
            TokenType::DefaultBatch => "default-batch",
            TokenType::Service => "service",
            TokenType::Batch => "batch",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    TOKEN_TYPE,
                    format!(
                        "expected one of default-service, default-batch, service, batch, got {s:?}"
                    ),
                )
            })
    }
}

/// Whether a mount shows up in the unauthenticated UI listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingVisibility {
    Unauth,
    Hidden,
}

impl ListingVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingVisibility::Unauth => "unauth",
            ListingVisibility::Hidden => "hidden",
        }
    }
}

impl fmt::Display for ListingVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingVisibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unauth" => Ok(ListingVisibility::Unauth),
            "hidden" => Ok(ListingVisibility::Hidden),
            other => Err(ValidationError::new(
                LISTING_VISIBILITY,
                format!("expected one of unauth, hidden, got {other:?}"),
            )),
        }
    }
}

/// Auth mount user lockout settings; every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLockoutConfig {
    pub threshold: Option<u64>,
    pub duration: Option<String>,
    pub counter_reset_duration: Option<String>,
    pub disable: Option<bool>,
}

impl UserLockoutConfig {
    pub fn is_empty(&self) -> bool {
        self.threshold.is_none()
            && self.duration.is_none()
            && self.counter_reset_duration.is_none()
            && self.disable.is_none()
    }
}

/// The tunable configuration of a secret engine or auth method mount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTuneConfig {
    pub default_lease_ttl: Option<String>,
    pub max_lease_ttl: Option<String>,
    pub audit_non_hmac_request_keys: Vec<String>,
    pub audit_non_hmac_response_keys: Vec<String>,
    pub listing_visibility: Option<ListingVisibility>,
    pub passthrough_request_headers: Vec<String>,
    pub allowed_response_headers: Vec<String>,
    pub token_type: Option<TokenType>,
    pub plugin_version: Option<String>,
    pub identity_token_key: Option<String>,
    pub user_lockout_config: Option<UserLockoutConfig>,
}

/// Body of `POST .../tune` (and the `config` object of an enable call).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MountConfigInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_lease_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lease_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audit_non_hmac_request_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audit_non_hmac_response_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_visibility: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passthrough_request_headers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_response_headers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_token_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_lockout_config: Option<UserLockoutConfigInput>,
    /// Mount options; only the tune endpoint reads them from this body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
}

/// Wire form of the lockout settings; Vault parses the threshold from a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserLockoutConfigInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_counter_reset_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_disable: Option<bool>,
}

/// Response of `GET .../tune`. A field missing from the response stays
/// `None`; a field present with a `null` value is `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MountConfigOutput {
    #[serde(default, deserialize_with = "present")]
    pub default_lease_ttl: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub max_lease_ttl: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub audit_non_hmac_request_keys: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub audit_non_hmac_response_keys: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub listing_visibility: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub passthrough_request_headers: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub allowed_response_headers: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub token_type: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub plugin_version: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub identity_token_key: Option<Value>,
    #[serde(default)]
    pub user_lockout_config: Option<Map<String, Value>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl MountConfigOutput {
    /// Parses a tune read response, with or without the `data` envelope.
    pub fn from_response(body: &Value) -> Result<Self, serde_json::Error> {
        let inner = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
        Self::deserialize(inner)
    }
}

/// Converts a `tune` state block into a [`MountTuneConfig`].
///
/// An absent block yields an all-default config. With `return_single_empty`
/// set, list fields the block leaves empty come back as `[""]`, which Vault
/// reads as "clear this list" rather than "leave it alone".
pub fn expand_tune(
    blocks: &[Map<String, Value>],
    return_single_empty: bool,
) -> Result<MountTuneConfig, ValidationError> {
    let block = match blocks {
        [] => return Ok(MountTuneConfig::default()),
        [block] => block,
        _ => {
            return Err(ValidationError::new(
                "tune",
                format!("at most one block is allowed, got {}", blocks.len()),
            ))
        }
    };

    let default_lease_ttl = get_string(block, DEFAULT_LEASE_TTL)?;
    if let Some(ttl) = &default_lease_ttl {
        validate_duration(DEFAULT_LEASE_TTL, ttl)?;
    }
    let max_lease_ttl = get_string(block, MAX_LEASE_TTL)?;
    if let Some(ttl) = &max_lease_ttl {
        validate_duration(MAX_LEASE_TTL, ttl)?;
    }

    let list = |key: &str| -> Result<Vec<String>, ValidationError> {
        let values = get_string_list(block, key)?;
        if values.is_empty() && return_single_empty {
            Ok(vec![String::new()])
        } else {
            Ok(values)
        }
    };

    Ok(MountTuneConfig {
        default_lease_ttl,
        max_lease_ttl,
        audit_non_hmac_request_keys: list(AUDIT_NON_HMAC_REQUEST_KEYS)?,
        audit_non_hmac_response_keys: list(AUDIT_NON_HMAC_RESPONSE_KEYS)?,
        listing_visibility: get_string(block, LISTING_VISIBILITY)?
            .map(|v| v.parse::<ListingVisibility>())
            .transpose()?,
        passthrough_request_headers: list(PASSTHROUGH_REQUEST_HEADERS)?,
        allowed_response_headers: list(ALLOWED_RESPONSE_HEADERS)?,
        token_type: get_string(block, TOKEN_TYPE)?
            .map(|v| v.parse::<TokenType>())
            .transpose()?,
        plugin_version: get_string(block, PLUGIN_VERSION)?,
        identity_token_key: get_string(block, IDENTITY_TOKEN_KEY)?,
        user_lockout_config: expand_user_lockout(block)?,
    })
}

fn expand_user_lockout(
    block: &Map<String, Value>,
) -> Result<Option<UserLockoutConfig>, ValidationError> {
    let nested = match block.get(USER_LOCKOUT_CONFIG) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => return Ok(None),
            [Value::Object(map)] => map,
            _ => {
                return Err(ValidationError::new(
                    USER_LOCKOUT_CONFIG,
                    "expected a single block",
                ))
            }
        },
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ValidationError::new(
                USER_LOCKOUT_CONFIG,
                format!("expected a block, got {other}"),
            ))
        }
    };

    let duration = get_string(nested, LOCKOUT_DURATION)?;
    if let Some(d) = &duration {
        validate_duration(LOCKOUT_DURATION, d)?;
    }
    let counter_reset_duration = get_string(nested, LOCKOUT_COUNTER_RESET_DURATION)?;
    if let Some(d) = &counter_reset_duration {
        validate_duration(LOCKOUT_COUNTER_RESET_DURATION, d)?;
    }
    let config = UserLockoutConfig {
        threshold: get_u64(nested, LOCKOUT_THRESHOLD)?,
        duration,
        counter_reset_duration,
        disable: get_bool(nested, LOCKOUT_DISABLE)?,
    };
    Ok((!config.is_empty()).then_some(config))
}

impl MountTuneConfig {
    /// Wire body for a tune write. Unset fields are omitted so Vault leaves
    /// them untouched.
    pub fn to_wire(&self) -> MountConfigInput {
        MountConfigInput {
            default_lease_ttl: self.default_lease_ttl.clone(),
            max_lease_ttl: self.max_lease_ttl.clone(),
            description: None,
            audit_non_hmac_request_keys: self.audit_non_hmac_request_keys.clone(),
            audit_non_hmac_response_keys: self.audit_non_hmac_response_keys.clone(),
            listing_visibility: self.listing_visibility.map(|v| v.to_string()),
            passthrough_request_headers: self.passthrough_request_headers.clone(),
            allowed_response_headers: self.allowed_response_headers.clone(),
            token_type: self.token_type,
            plugin_version: self.plugin_version.clone(),
            identity_token_key: self.identity_token_key.clone(),
            user_lockout_config: self.user_lockout_config.as_ref().map(|c| {
                UserLockoutConfigInput {
                    lockout_threshold: c.threshold.map(|t| t.to_string()),
                    lockout_duration: c.duration.clone(),
                    lockout_counter_reset_duration: c.counter_reset_duration.clone(),
                    lockout_disable: c.disable,
                }
            }),
            options: None,
        }
    }
}

/// Converts a tune read response into a `tune` state block.
///
/// TTLs become canonical duration strings, the `[""]` clear sentinel becomes
/// an empty list, and fields the server did not return are left out.
pub fn flatten_tune(output: &MountConfigOutput) -> Map<String, Value> {
    let mut block = Map::new();
    if let Some(ttl) = &output.default_lease_ttl {
        block.insert(DEFAULT_LEASE_TTL.into(), flatten_duration(ttl).into());
    }
    if let Some(ttl) = &output.max_lease_ttl {
        block.insert(MAX_LEASE_TTL.into(), flatten_duration(ttl).into());
    }
    for (key, value) in [
        (AUDIT_NON_HMAC_REQUEST_KEYS, &output.audit_non_hmac_request_keys),
        (AUDIT_NON_HMAC_RESPONSE_KEYS, &output.audit_non_hmac_response_keys),
        (PASSTHROUGH_REQUEST_HEADERS, &output.passthrough_request_headers),
        (ALLOWED_RESPONSE_HEADERS, &output.allowed_response_headers),
    ] {
        if let Some(value) = value {
            block.insert(key.into(), flatten_string_list(value));
        }
    }
    for (key, value) in [
        (LISTING_VISIBILITY, &output.listing_visibility),
        (TOKEN_TYPE, &output.token_type),
        (PLUGIN_VERSION, &output.plugin_version),
        (IDENTITY_TOKEN_KEY, &output.identity_token_key),
    ] {
        if let Some(value) = value {
            block.insert(key.into(), flatten_string(value));
        }
    }
    if let Some(lockout) = &output.user_lockout_config {
        let nested = flatten_user_lockout(lockout);
        if !nested.is_empty() {
            block.insert(
                USER_LOCKOUT_CONFIG.into(),
                Value::Array(vec![Value::Object(nested)]),
            );
        }
    }
    block
}

fn flatten_user_lockout(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut nested = Map::new();
    match raw.get(LOCKOUT_THRESHOLD) {
        Some(Value::Number(n)) => {
            nested.insert(LOCKOUT_THRESHOLD.into(), Value::Number(n.clone()));
        }
        Some(Value::String(s)) => {
            if let Ok(n) = s.parse::<u64>() {
                nested.insert(LOCKOUT_THRESHOLD.into(), n.into());
            }
        }
        _ => {}
    }
    for key in [LOCKOUT_DURATION, LOCKOUT_COUNTER_RESET_DURATION] {
        if let Some(value) = raw.get(key) {
            nested.insert(key.into(), flatten_duration(value).into());
        }
    }
    if let Some(Value::Bool(disable)) = raw.get(LOCKOUT_DISABLE) {
        nested.insert(LOCKOUT_DISABLE.into(), Value::Bool(*disable));
    }
    nested
}

fn flatten_string(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::String(_) => value.clone(),
        other => Value::String(other.to_string()),
    }
}

fn flatten_string_list(value: &Value) -> Value {
    let items: Vec<Value> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
        _ => Vec::new(),
    };
    Value::Array(items)
}

fn get_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>, ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ValidationError::new(
            key,
            format!("expected a string, got {other}"),
        )),
    }
}

fn get_string_list(map: &Map<String, Value>, key: &str) -> Result<Vec<String>, ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ValidationError::new(key, format!("expected a list of strings, got {v}"))
                })
            })
            .filter(|s| !matches!(s, Ok(s) if s.is_empty()))
            .collect(),
        Some(other) => Err(ValidationError::new(
            key,
            format!("expected a list of strings, got {other}"),
        )),
    }
}

fn get_u64(map: &Map<String, Value>, key: &str) -> Result<Option<u64>, ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| ValidationError::new(key, format!("expected a positive integer, got {n}"))),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::new(key, format!("expected a positive integer, got {s:?}"))),
        Some(other) => Err(ValidationError::new(
            key,
            format!("expected a positive integer, got {other}"),
        )),
    }
}

fn get_bool(map: &Map<String, Value>, key: &str) -> Result<Option<bool>, ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ValidationError::new(
            key,
            format!("expected a boolean, got {other}"),
        )),
    }
}
