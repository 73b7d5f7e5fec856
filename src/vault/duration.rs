//! Duration helpers shared by the tune expand/flatten code.
//!
//! Vault accepts TTLs as duration strings ("10m", "1h30m") or as integer
//! seconds, and reports them back as integer seconds. State always holds the
//! short canonical string form produced by [`format_seconds`].

use crate::vault::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

const COMPONENT: &str = r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|s|m|h)";

/// Go's `time.ParseDuration` grammar without a sign: one or more
/// number-unit pairs with nothing in between.
static GO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^(?:{COMPONENT})+$")).expect("duration grammar is a valid regex")
});

static GO_COMPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(COMPONENT).expect("duration component is a valid regex"));

/// Whole days, which Vault accepts on top of Go's units.
static DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)d$").expect("day pattern is a valid regex"));

/// Parses a duration string the way Vault does: a bare number of seconds,
/// whole days such as `"7d"`, or Go duration syntax such as `"1h30m"` or
/// `"1.5h"`. Spaces inside the value and calendar units are rejected.
pub fn parse_duration(field: &str, input: &str) -> Result<Duration, ValidationError> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if let Some(caps) = DAYS.captures(input) {
        return caps[1]
            .parse::<u64>()
            .ok()
            .and_then(|days| days.checked_mul(86_400))
            .map(Duration::from_secs)
            .ok_or_else(|| ValidationError::new(field, format!("{input:?} is out of range")));
    }
    if !GO_DURATION.is_match(input) {
        return Err(ValidationError::new(
            field,
            format!("{input:?} is not a duration; use units ns, us, ms, s, m, h or d"),
        ));
    }
    let out_of_range = || ValidationError::new(field, format!("{input:?} is out of range"));
    let mut nanos: u128 = 0;
    for caps in GO_COMPONENT.captures_iter(input) {
        let unit: u128 = match &caps[2] {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            _ => 3_600_000_000_000,
        };
        let (whole, frac) = caps[1].split_once('.').unwrap_or((&caps[1], ""));
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        // Digits past 18 are below a nanosecond for every unit.
        let frac = &frac[..frac.len().min(18)];
        let frac_nanos = if frac.is_empty() {
            0
        } else {
            let digits: u128 = frac.parse().map_err(|_| out_of_range())?;
            digits * unit / 10u128.pow(frac.len() as u32)
        };
        nanos = whole
            .checked_mul(unit)
            .and_then(|n| n.checked_add(frac_nanos))
            .and_then(|n| nanos.checked_add(n))
            .ok_or_else(out_of_range)?;
    }
    let secs = u64::try_from(nanos / 1_000_000_000).map_err(|_| out_of_range())?;
    Ok(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

/// Checks a duration field; an empty string means "unset" and is accepted.
pub fn validate_duration(field: &str, input: &str) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Ok(());
    }
    parse_duration(field, input).map(|_| ())
}

/// Formats whole seconds as the shortest h/m/s string, dropping zero parts.
pub fn format_seconds(secs: u64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 {
        out.push_str(&format!("{s}s"));
    }
    out
}

/// Converts a TTL as returned by Vault into its canonical state form.
///
/// Integers and numeric strings are seconds. Duration strings are
/// re-formatted. Null becomes `"0s"`. Anything else is passed through so a
/// surprising server value still shows up in a diff instead of vanishing.
pub fn flatten_duration(value: &Value) -> String {
    match value {
        Value::Null => "0s".to_string(),
        Value::Number(n) => match n.as_u64() {
            Some(secs) => format_seconds(secs),
            None => n
                .as_f64()
                .filter(|f| *f >= 0.0)
                .map(|f| format_seconds(f as u64))
                .unwrap_or_else(|| n.to_string()),
        },
        Value::String(s) if s.is_empty() => "0s".to_string(),
        Value::String(s) => parse_duration("ttl", s)
            .map(|d| format_seconds(d.as_secs()))
            .unwrap_or_else(|_| s.clone()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_seconds(30), "30s");
        assert_eq!(format_seconds(600), "10m");
        assert_eq!(format_seconds(3600), "1h");
        assert_eq!(format_seconds(3660), "1h1m");
        assert_eq!(format_seconds(3661), "1h1m1s");
        assert_eq!(format_seconds(768 * 3600), "768h");
    }

    #[test]
    fn test_flatten_duration() {
        assert_eq!(flatten_duration(&json!(0)), "0s");
        assert_eq!(flatten_duration(&json!(600)), "10m");
        assert_eq!(flatten_duration(&Value::Null), "0s");
        assert_eq!(flatten_duration(&json!(600.0)), "10m");
        assert_eq!(flatten_duration(&json!("3600")), "1h");
        assert_eq!(flatten_duration(&json!("90m")), "1h30m");
        assert_eq!(flatten_duration(&json!("")), "0s");
        assert_eq!(flatten_duration(&json!("forever")), "forever");
        assert_eq!(flatten_duration(&json!("1M")), "1M");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("ttl", "10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("ttl", "30s").unwrap(), Duration::from_secs(30));
        assert_eq!(
            parse_duration("ttl", "1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(parse_duration("ttl", "45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_vault_forms() {
        assert_eq!(parse_duration("ttl", "7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("ttl", "1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("ttl", "2h45m30s").unwrap(), Duration::from_secs(9930));
        assert_eq!(parse_duration("ttl", "1500ms").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("ttl", "250µs").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("ttl", " 10m ").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn test_validate_duration() {
        assert!(validate_duration("default_lease_ttl", "").is_ok());
        assert!(validate_duration("default_lease_ttl", "10m").is_ok());
        let err = validate_duration("default_lease_ttl", "ten minutes").unwrap_err();
        assert_eq!(err.field, "default_lease_ttl");
    }

    #[test]
    fn test_validate_duration_rejects_forms_vault_rejects() {
        for input in [
            "1month", "2years", "10 minutes", "1M", "1y", "1w", "1h 30m", "-5m", "1.5d", "h",
            "5sec",
        ] {
            assert!(
                validate_duration("max_lease_ttl", input).is_err(),
                "{input:?} should be rejected"
            );
        }
    }
}
