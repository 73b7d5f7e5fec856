//! Drift suppression for tune fields with "global default" semantics.
//!
//! Vault's tune read resolves unset fields to the system default currently in
//! effect, so a mount whose `token_type` was never configured reads back as
//! `default-service`. Reporting that value would show up as drift on every
//! plan. For the fields listed in [`GLOBAL_DEFAULT_FIELDS`], a value the user
//! did not set is reported as empty.
//!
//! Only the enumerated fields are handled. A server-resolved default on any
//! other field still surfaces as drift and needs to be added to the list.

use crate::vault::tune::{
    MountTuneConfig, DEFAULT_LEASE_TTL, LISTING_VISIBILITY, MAX_LEASE_TTL, TOKEN_TYPE,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Tune fields where an empty value means "inherit the system default".
pub const GLOBAL_DEFAULT_FIELDS: [&str; 4] =
    [TOKEN_TYPE, LISTING_VISIBILITY, DEFAULT_LEASE_TTL, MAX_LEASE_TTL];

/// Merges a flattened tune block read from Vault with the user's input.
///
/// `input` is `None` when the configuration has no tune block at all, in
/// which case every global-default field counts as unset. Fields missing
/// from `raw` are not added. The function is pure: the same arguments
/// always produce the same block.
pub fn merge_tune(raw: &Map<String, Value>, input: Option<&MountTuneConfig>) -> Map<String, Value> {
    let mut merged = raw.clone();
    for field in GLOBAL_DEFAULT_FIELDS {
        if !is_unset(input, field) {
            continue;
        }
        if let Some(value) = merged.get_mut(field) {
            if !is_empty(value) {
                debug!("suppressing server default {}={} from state", field, value);
            }
            *value = Value::String(String::new());
        }
    }
    merged
}

fn is_unset(input: Option<&MountTuneConfig>, field: &str) -> bool {
    let Some(input) = input else {
        return true;
    };
    match field {
        TOKEN_TYPE => input.token_type.is_none(),
        LISTING_VISIBILITY => input.listing_visibility.is_none(),
        DEFAULT_LEASE_TTL => input.default_lease_ttl.as_deref().map_or(true, str::is_empty),
        MAX_LEASE_TTL => input.max_lease_ttl.as_deref().map_or(true, str::is_empty),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::tune::{ListingVisibility, TokenType};
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_suppresses_unset_global_defaults() {
        crate::init_test_logging();
        let raw = map(json!({"token_type": "default-service", "listing_visibility": "hidden"}));
        let merged = merge_tune(&raw, Some(&MountTuneConfig::default()));
        assert_eq!(merged["token_type"], json!(""));
        assert_eq!(merged["listing_visibility"], json!(""));
    }

    #[test]
    fn test_keeps_user_set_fields() {
        let raw = map(json!({
            "token_type": "batch",
            "listing_visibility": "unauth",
            "default_lease_ttl": "10m",
            "max_lease_ttl": "768h"
        }));
        let input = MountTuneConfig {
            token_type: Some(TokenType::Batch),
            default_lease_ttl: Some("10m".to_string()),
            ..Default::default()
        };
        let merged = merge_tune(&raw, Some(&input));
        assert_eq!(merged["token_type"], json!("batch"));
        assert_eq!(merged["default_lease_ttl"], json!("10m"));
        assert_eq!(merged["listing_visibility"], json!(""));
        assert_eq!(merged["max_lease_ttl"], json!(""));
    }

    #[test]
    fn test_no_input_clears_all_global_defaults() {
        let raw = map(json!({
            "token_type": "default-service",
            "default_lease_ttl": "768h",
            "allowed_response_headers": ["X-Foo"]
        }));
        let merged = merge_tune(&raw, None);
        assert_eq!(merged["token_type"], json!(""));
        assert_eq!(merged["default_lease_ttl"], json!(""));
        assert_eq!(merged["allowed_response_headers"], json!(["X-Foo"]));
        assert!(!merged.contains_key("listing_visibility"));
    }

    #[test]
    fn test_fields_outside_the_list_are_not_suppressed() {
        let raw = map(json!({"plugin_version": "v1.2.3"}));
        let merged = merge_tune(&raw, Some(&MountTuneConfig::default()));
        assert_eq!(merged["plugin_version"], json!("v1.2.3"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let raw = map(json!({"token_type": "default-service", "listing_visibility": "hidden"}));
        let input = MountTuneConfig {
            listing_visibility: Some(ListingVisibility::Hidden),
            ..Default::default()
        };
        let once = merge_tune(&raw, Some(&input));
        let twice = merge_tune(&raw, Some(&input));
        assert_eq!(once, twice);
        assert_eq!(merge_tune(&once, Some(&input)), once);
    }
}
