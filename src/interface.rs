use crate::provider::ProviderContext;
use crate::vault::VaultError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A resource's persisted attributes, keyed by schema field name.
pub type ResourceState = Map<String, Value>;

/// CRUD surface a declarative resource exposes to its driver (the CLI here,
/// a plugin host in general). Handlers keep no state of their own; the server
/// is the system of record and `ResourceState` is the client-side copy.
#[async_trait]
pub trait ResourceHandler {
    /// Parsed and validated user configuration.
    type Config: Send + Sync;

    /// Parses a raw configuration map, rejecting invalid values before any
    /// request is made.
    fn parse_config(&self, raw: &ResourceState) -> Result<Self::Config, VaultError>;

    /// Creates the object and returns its state.
    async fn create(
        &self,
        ctx: &ProviderContext,
        config: &Self::Config,
    ) -> Result<ResourceState, VaultError>;

    /// Refreshes state from the server; `None` means the object is gone and
    /// should be dropped from state.
    async fn read(
        &self,
        ctx: &ProviderContext,
        state: &ResourceState,
    ) -> Result<Option<ResourceState>, VaultError>;

    /// Applies `config` over the object described by `prior`.
    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &ResourceState,
        config: &Self::Config,
    ) -> Result<Option<ResourceState>, VaultError>;

    /// Deletes the object; deleting something already gone succeeds.
    async fn delete(&self, ctx: &ProviderContext, state: &ResourceState) -> Result<(), VaultError>;

    async fn exists(&self, ctx: &ProviderContext, state: &ResourceState)
        -> Result<bool, VaultError>;

    /// Adopts an existing object by its ID.
    async fn import(
        &self,
        ctx: &ProviderContext,
        id: &str,
    ) -> Result<Option<ResourceState>, VaultError>;
}
