use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::interface::{ResourceHandler, ResourceState};
use crate::provider::ProviderContext;
use crate::resource::MountResource;
use crate::vault::{IdFormat, MountKind, VaultConfig};

#[derive(Parser)]
#[command(
    name = "vault-mounts",
    about = "Declarative management of Vault secret engines and auth methods",
    version
)]
pub struct Cli {
    /// Vault server address.
    #[arg(long, default_value = "http://127.0.0.1:8200", global = true, env = "VAULT_ADDR")]
    pub vault_addr: String,

    /// Vault token.
    #[arg(long, global = true, env = "VAULT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Vault Enterprise namespace.
    #[arg(long, global = true, env = "VAULT_NAMESPACE")]
    pub namespace: Option<String>,

    /// CA certificate used to verify the server.
    #[arg(long, global = true, env = "VAULT_CACERT")]
    pub ca_cert: Option<String>,

    /// Skip TLS verification (development only).
    #[arg(long, global = true, env = "VAULT_SKIP_VERIFY")]
    pub skip_tls_verify: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update a mount from a JSON configuration file.
    Apply {
        /// Mount configuration (JSON object).
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        target: Target,
    },
    /// Refresh a mount's state from Vault.
    Read {
        /// Mount path; ignored when --state is given.
        #[arg(long)]
        path: Option<String>,
        #[command(flatten)]
        target: Target,
    },
    /// Adopt an existing mount into a state file.
    Import {
        /// Mount path.
        #[arg(long)]
        path: String,
        #[command(flatten)]
        target: Target,
    },
    /// Disable a mount.
    Destroy {
        /// Mount path; ignored when --state is given.
        #[arg(long)]
        path: Option<String>,
        #[command(flatten)]
        target: Target,
    },
    /// Encode or decode composite resource IDs.
    Id {
        #[command(subcommand)]
        action: IdAction,
    },
}

#[derive(Args)]
pub struct Target {
    /// Mount table the resource lives in.
    #[arg(long, value_enum, default_value_t = MountKind::Secret)]
    pub kind: MountKind,
    /// State file read before and written after the operation.
    #[arg(long)]
    pub state: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum IdAction {
    /// Split an ID into its fields.
    Decode {
        #[arg(long, value_enum)]
        format: IdFormat,
        id: String,
    },
    /// Join fields into an ID.
    Encode {
        #[arg(long, value_enum)]
        format: IdFormat,
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

impl Cli {
    fn vault_config(&self) -> VaultConfig {
        let mut config = VaultConfig::new(&self.vault_addr);
        if let Some(token) = &self.token {
            config = config.with_token(token);
        }
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace);
        }
        if let Some(ca_cert) = &self.ca_cert {
            config = config.with_ca_cert(ca_cert);
        }
        config.skip_tls_verify = self.skip_tls_verify;
        config
    }
}

async fn load_state(path: &Path) -> Result<Option<ResourceState>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading state file {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(&contents)? {
        Value::Object(state) => Ok(Some(state)),
        Value::Null => Ok(None),
        _ => Err(anyhow!("state file {} is not a JSON object", path.display())),
    }
}

async fn save_state(path: Option<&Path>, state: Option<&ResourceState>) -> Result<()> {
    let rendered = match state {
        Some(state) => serde_json::to_string_pretty(state)?,
        None => "null".to_string(),
    };
    println!("{}", rendered);
    if let Some(path) = path {
        tokio::fs::write(path, format!("{}\n", rendered))
            .await
            .with_context(|| format!("writing state file {}", path.display()))?;
        info!("State written to {}", path.display());
    }
    Ok(())
}

/// State to operate on: the state file if present, otherwise one built from `--path`.
async fn resolve_state(path: Option<String>, target: &Target) -> Result<ResourceState> {
    if let Some(state_path) = &target.state {
        if let Some(state) = load_state(state_path).await? {
            return Ok(state);
        }
    }
    let path = path.ok_or_else(|| anyhow!("either --path or an existing --state is required"))?;
    let mut state = ResourceState::new();
    state.insert("id".into(), json!(path));
    Ok(state)
}

fn run_id_action(action: IdAction) -> Result<()> {
    match action {
        IdAction::Decode { format, id } => {
            let template = format.template();
            let values = template.decode(&id)?;
            let decoded: serde_json::Map<String, Value> = template
                .fields()
                .iter()
                .zip(values)
                .map(|(field, value)| (field.to_string(), Value::String(value)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        IdAction::Encode { format, fields } => {
            println!("{}", format.template().encode(fields.as_slice())?);
        }
    }
    Ok(())
}

async fn connect(config: &VaultConfig) -> Result<ProviderContext> {
    ProviderContext::connect(config)
        .await
        .map_err(|e| anyhow!("Failed to configure Vault client: {}", e))
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.vault_config();

    match cli.command {
        Commands::Id { action } => run_id_action(action)?,
        Commands::Apply { file, target } => {
            let handler = MountResource::new(target.kind);
            let raw = load_state(&file)
                .await?
                .ok_or_else(|| anyhow!("{} does not contain a configuration", file.display()))?;
            // Validate locally before talking to Vault.
            let mount_config = handler.parse_config(&raw)?;
            let ctx = connect(&config).await?;
            let prior = match &target.state {
                Some(path) => load_state(path).await?,
                None => None,
            };
            let prior = match prior {
                Some(prior) if handler.exists(&ctx, &prior).await? => Some(prior),
                Some(_) => {
                    warn!("Mount in state no longer exists, creating it again");
                    None
                }
                None => None,
            };
            let state = match prior {
                Some(prior) => handler.update(&ctx, &prior, &mount_config).await?,
                None => Some(handler.create(&ctx, &mount_config).await?),
            };
            save_state(target.state.as_deref(), state.as_ref()).await?;
        }
        Commands::Read { path, target } => {
            let handler = MountResource::new(target.kind);
            let state = resolve_state(path, &target).await?;
            let ctx = connect(&config).await?;
            let refreshed = handler.read(&ctx, &state).await?;
            if refreshed.is_none() {
                warn!("Mount no longer exists; state cleared");
            }
            save_state(target.state.as_deref(), refreshed.as_ref()).await?;
        }
        Commands::Import { path, target } => {
            let handler = MountResource::new(target.kind);
            let ctx = connect(&config).await?;
            let state = handler
                .import(&ctx, &path)
                .await?
                .ok_or_else(|| anyhow!("no {} mounted at {}", target.kind, path))?;
            save_state(target.state.as_deref(), Some(&state)).await?;
        }
        Commands::Destroy { path, target } => {
            let handler = MountResource::new(target.kind);
            let state = resolve_state(path, &target).await?;
            let ctx = connect(&config).await?;
            handler.delete(&ctx, &state).await?;
            let id = state
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            info!("Destroyed {} at {}", target.kind, id);
            save_state(target.state.as_deref(), None).await?;
        }
    }
    Ok(())
}
