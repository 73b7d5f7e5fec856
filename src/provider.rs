//! Per-operation provider context.
//!
//! Everything a resource handler needs to know about the target server (the
//! client, the server version, whether it runs Enterprise) travels in a
//! [`ProviderContext`] that the caller passes in explicitly. Feature gates are
//! checked against it before any request is sent.

use crate::vault::common::read_seal_status;
use crate::vault::{VaultClient, VaultConfig, VaultError};
use semver::Version;
use tracing::{info, warn};

/// Server capabilities a request can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// `plugin_version` on mounts and tune
    PluginVersion,
    /// `user_lockout_config` on auth mounts
    UserLockout,
    /// `identity_token_key` on mounts
    IdentityTokenKey,
}

impl Feature {
    pub fn name(self) -> &'static str {
        match self {
            Feature::PluginVersion => "plugin_version",
            Feature::UserLockout => "user_lockout_config",
            Feature::IdentityTokenKey => "identity_token_key",
        }
    }

    fn min_version(self) -> (u64, u64, &'static str) {
        match self {
            Feature::PluginVersion => (1, 12, "1.12"),
            Feature::UserLockout => (1, 13, "1.13"),
            Feature::IdentityTokenKey => (1, 16, "1.16"),
        }
    }

    fn requires_enterprise(self) -> bool {
        matches!(self, Feature::IdentityTokenKey)
    }
}

/// What the connected server reported about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: Option<Version>,
    pub enterprise: bool,
}

impl ServerInfo {
    /// Parses a Vault version string such as `1.15.2` or `1.16.1+ent.hsm`.
    ///
    /// An unparseable version is kept as `None`, which disables every gated
    /// feature rather than guessing.
    pub fn from_version_string(raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches('v');
        let version = Version::parse(raw).ok();
        let enterprise = version
            .as_ref()
            .map(|v| v.build.as_str().split('.').any(|part| part == "ent"))
            .unwrap_or_else(|| raw.contains("+ent"));
        Self {
            version,
            enterprise,
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        let (major, minor, _) = feature.min_version();
        let Some(version) = &self.version else {
            return false;
        };
        (version.major, version.minor) >= (major, minor)
            && (!feature.requires_enterprise() || self.enterprise)
    }
}

/// Client plus server capabilities, threaded through every resource call.
#[derive(Debug)]
pub struct ProviderContext {
    pub client: VaultClient,
    pub server: ServerInfo,
}

impl ProviderContext {
    pub fn new(client: VaultClient, server: ServerInfo) -> Self {
        Self { client, server }
    }

    /// Builds the client and probes the server version once.
    pub async fn connect(config: &VaultConfig) -> Result<Self, VaultError> {
        let client = VaultClient::from_config(config)?;
        let status = read_seal_status(&client).await?;
        let server = ServerInfo::from_version_string(&status.version);
        match &server.version {
            Some(version) => info!(
                "Connected to Vault {} at {} (enterprise: {})",
                version, client.addr, server.enterprise
            ),
            None => warn!(
                "Could not parse Vault version {:?}; version-gated fields are disabled",
                status.version
            ),
        }
        Ok(Self::new(client, server))
    }

    /// Fails with [`VaultError::Unsupported`] when the server lacks `feature`.
    pub fn ensure(&self, feature: Feature) -> Result<(), VaultError> {
        if self.server.supports(feature) {
            return Ok(());
        }
        Err(VaultError::Unsupported {
            feature: feature.name(),
            min_version: feature.min_version().2,
            enterprise: feature.requires_enterprise(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        let oss = ServerInfo::from_version_string("1.15.2");
        assert_eq!(oss.version, Some(Version::new(1, 15, 2)));
        assert!(!oss.enterprise);

        let ent = ServerInfo::from_version_string("1.16.1+ent.hsm");
        assert_eq!(ent.version.as_ref().map(|v| v.minor), Some(16));
        assert!(ent.enterprise);

        let unknown = ServerInfo::from_version_string("");
        assert_eq!(unknown.version, None);
    }

    #[test]
    fn test_feature_gates() {
        let old = ServerInfo::from_version_string("1.11.0");
        assert!(!old.supports(Feature::PluginVersion));
        assert!(!old.supports(Feature::UserLockout));

        let oss = ServerInfo::from_version_string("1.16.0-rc1");
        assert!(oss.supports(Feature::PluginVersion));
        assert!(oss.supports(Feature::UserLockout));
        assert!(!oss.supports(Feature::IdentityTokenKey));

        let ent = ServerInfo::from_version_string("1.16.0+ent");
        assert!(ent.supports(Feature::IdentityTokenKey));

        let unknown = ServerInfo::from_version_string("dev");
        assert!(!unknown.supports(Feature::PluginVersion));
    }

    #[test]
    fn test_ensure_reports_requirement() {
        let client = VaultClient::new("http://127.0.0.1:8200", "root").unwrap();
        let ctx = ProviderContext::new(client, ServerInfo::from_version_string("1.15.0"));
        let err = ctx.ensure(Feature::IdentityTokenKey).unwrap_err();
        assert_eq!(
            err.to_string(),
            "identity_token_key requires Vault 1.16 or newer (Enterprise)"
        );
        assert!(ctx.ensure(Feature::UserLockout).is_ok());
    }
}
