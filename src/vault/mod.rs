//! Vault module for the vault-mounts library
//!
//! This module implements the mount configuration reconciler and the thin
//! HTTP layer it talks to Vault through.
//!
//! ## Architectural role:
//! - `id`, `duration`, `tune` and `merge` are pure helpers with no I/O
//! - `client`, `common` and `mounts` perform the HTTP calls
//! - Resource handlers in `crate::resource` combine both; nothing here keeps
//!   state between calls
//!
//! ## Testing strategy:
//! - Each module contains its own unit tests within a `#[cfg(test)] mod tests` block
//! - HTTP behavior is tested against a `wiremock` server in `tests/`
//! - Live tests against a dev-mode Vault container live in `tests/integration.rs`

pub mod client;
pub mod common;
pub mod duration;
pub mod error;
pub mod id;
pub mod merge;
pub mod mounts;
pub mod tune;

// Re-export key types and traits for convenience
pub use client::VaultClient;
pub use error::{DecodeError, ValidationError, VaultError};
pub use id::{AuthRoleId, BackendRoleId, CompositeId, IdFormat, MountId, SyncAssociationId};
pub use merge::{merge_tune, GLOBAL_DEFAULT_FIELDS};
pub use mounts::{MountKind, MountSnapshot};
pub use tune::{expand_tune, flatten_tune, ListingVisibility, MountTuneConfig, TokenType};

/// Vault configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultConfig {
    /// Vault API URL, e.g., "http://127.0.0.1:8200".
    pub url: String,
    /// API token. Required to build a client.
    pub token: Option<String>,
    /// Optional CA certificate for verifying the server
    pub ca_cert_path: Option<String>,
    /// Disable TLS verification (development only)
    pub skip_tls_verify: bool,
    /// Optional namespace for supporting namespaced Vault instances (enterprise)
    pub namespace: Option<String>,
    /// Per-request timeout enforced by the HTTP client
    pub timeout_secs: u64,
}

impl VaultConfig {
    /// Create a new Vault config
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Set token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set CA certificate path
    pub fn with_ca_cert(mut self, ca_cert: &str) -> Self {
        self.ca_cert_path = Some(ca_cert.to_string());
        self
    }

    /// Set namespace
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

// Default configuration
impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8200".to_string(),
            token: None,
            ca_cert_path: None,
            skip_tls_verify: false,
            namespace: None,
            timeout_secs: 30,
        }
    }
}
