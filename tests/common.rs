//! Common test fixtures for Vault integration tests.
//!
//! This module starts a HashiCorp Vault container in dev mode with a fixed
//! root token (`"root"`). To run these tests, set the environment variable
//! `VAULT_MOUNTS_RUN_INTEGRATION_TESTS=true`.

use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::time::sleep;

pub const ROOT_TOKEN: &str = "root";

pub fn integration_enabled() -> bool {
    std::env::var("VAULT_MOUNTS_RUN_INTEGRATION_TESTS").is_ok()
}

pub struct VaultFixture {
    _container: ContainerAsync<GenericImage>,
    port: u16,
}

impl VaultFixture {
    pub async fn new() -> Self {
        let container = GenericImage::new("hashicorp/vault", "1.18.4")
            .with_exposed_port(8200.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Vault server started!"))
            .with_env_var("VAULT_DEV_ROOT_TOKEN_ID", ROOT_TOKEN)
            .with_env_var("VAULT_DEV_LISTEN_ADDRESS", "0.0.0.0:8200")
            .with_cmd(vec!["server", "-dev", "-dev-root-token-id=root"])
            .start()
            .await
            .expect("Failed to start Vault container");

        let port = container
            .get_host_port_ipv4(8200)
            .await
            .expect("Vault port is mapped");

        let fixture = VaultFixture {
            _container: container,
            port,
        };
        fixture.wait_ready(20).await;
        fixture
    }

    pub fn vault_addr(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    async fn wait_ready(&self, max_retries: usize) {
        let health_url = format!("{}/v1/sys/health", self.vault_addr());
        for _ in 0..max_retries {
            if let Ok(resp) = reqwest::get(&health_url).await {
                if resp.status().as_u16() == 200 {
                    return;
                }
            }
            sleep(Duration::from_millis(500)).await;
        }
        panic!("Vault at {} not ready", self.vault_addr());
    }
}
