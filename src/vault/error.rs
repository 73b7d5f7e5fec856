use std::fmt;

/// Error raised when a composite resource ID does not match its template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} ID {id:?}: {reason}")]
pub struct DecodeError {
    pub kind: &'static str,
    pub id: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(kind: &'static str, id: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Local validation failure, raised before any request reaches Vault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Client configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP status {0}: {1}")]
    HttpStatus(u16, String),

    #[error("Mount not found: {0}")]
    MountNotFound(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{feature} requires Vault {min_version} or newer{}", edition_suffix(.enterprise))]
    Unsupported {
        feature: &'static str,
        min_version: &'static str,
        enterprise: bool,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<VaultError>,
    },

    #[error("Error from reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// Wraps the error with a human readable context, typically the mount path.
    pub fn context(self, context: impl Into<String>) -> Self {
        VaultError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error means the mount (or the object under it) is gone.
    ///
    /// Vault reports a missing mount in several ways depending on the
    /// endpoint: a plain 404, or a 400 whose message mentions that no mount
    /// matched the path.
    pub fn is_not_found(&self) -> bool {
        match self {
            VaultError::MountNotFound(_) => true,
            VaultError::HttpStatus(404, _) => true,
            VaultError::HttpStatus(400, body) | VaultError::Api(body) => {
                is_not_found_message(body)
            }
            VaultError::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

fn edition_suffix(enterprise: &bool) -> &'static str {
    if *enterprise {
        " (Enterprise)"
    } else {
        ""
    }
}

fn is_not_found_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("no matching mount")
        || msg.contains("cannot fetch sysview")
        || msg.contains("no mount found")
        || msg.contains("no auth engine at")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(VaultError::HttpStatus(404, String::new()).is_not_found());
        assert!(VaultError::HttpStatus(
            400,
            r#"{"errors":["cannot fetch sysview for path \"kv/\""]}"#.to_string()
        )
        .is_not_found());
        assert!(VaultError::Api("No matching mount at 'kv/'".to_string()).is_not_found());
        assert!(!VaultError::HttpStatus(500, "internal error".to_string()).is_not_found());
        assert!(!VaultError::Api("permission denied".to_string()).is_not_found());
    }

    #[test]
    fn test_context_preserves_not_found() {
        let err = VaultError::MountNotFound("kv".to_string()).context("error reading kv");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "error reading kv: Mount not found: kv");
    }

    #[test]
    fn test_decode_error_message() {
        let err = DecodeError::new("backend role", "foo", "expected 2 fields");
        assert_eq!(
            err.to_string(),
            r#"invalid backend role ID "foo": expected 2 fields"#
        );
    }
}
