//! vault-mounts - declarative Vault mount management
//!
//! This crate reconciles HashiCorp Vault secret engines and auth methods
//! against a declarative configuration, the way an infrastructure-as-code
//! provider does. It includes the reconciler helpers (composite ID codec,
//! tune expand/flatten, drift-suppressing merge), mount resource handlers
//! and a small CLI that drives them.
//!
//! ## Architecture
//!
//! The crate follows a layered architecture with the following dependencies:
//!
//! - `cli` module - Command-line interface (uses resource and provider)
//! - `resource` module - Create/read/update/delete handlers for mounts
//! - `provider` module - Explicit per-operation context (client + server capabilities)
//! - `interface` module - The `ResourceHandler` trait the CLI drives
//! - `vault` module - Pure reconciler helpers and the HTTP layer
//!
//! No layer keeps state between calls: Vault is the system of record and the
//! caller owns the state map.

pub mod cli;
pub mod interface;
pub mod provider;
pub mod resource;
pub mod vault;

// Re-export public types for convenience
pub use interface::{ResourceHandler, ResourceState};
pub use provider::{Feature, ProviderContext, ServerInfo};
pub use resource::{MountResource, MountResourceConfig};
pub use vault::{VaultClient, VaultConfig, VaultError};

/// Initialize logging for the application.
///
/// Honors `RUST_LOG` and falls back to `info`. Calling it more than once is
/// harmless.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logging setup for tests: output is captured per test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
