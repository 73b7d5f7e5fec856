// src/main.rs
use vault_mounts::{cli, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    cli::run_cli().await
}
