//! Client implementation for Vault API interactions.
//!
//! This module provides a client for making HTTP requests to the Vault API
//! with appropriate authentication and error handling.

use crate::vault::common::check_response;
use crate::vault::{VaultConfig, VaultError};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Certificate, Client, Method,
};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Client for interacting with the Vault HTTP API.
pub struct VaultClient {
    /// Base URL of the Vault server
    pub addr: String,
    /// Auth token for Vault API requests
    token: String,
    /// HTTP client for making requests
    client: Client,
    /// Custom headers to add to requests
    custom_headers: HeaderMap,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("addr", &self.addr)
            .field("custom_headers", &self.custom_headers)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Creates a new VaultClient with the specified address and token.
    pub fn new(addr: &str, token: &str) -> Result<Self, VaultError> {
        Self::from_config(&VaultConfig::new(addr).with_token(token))
    }

    /// Builds a client from a full [`VaultConfig`].
    ///
    /// Fails with [`VaultError::Config`] when the address or token is missing
    /// or the CA bundle cannot be loaded; nothing is sent to Vault here.
    pub fn from_config(config: &VaultConfig) -> Result<Self, VaultError> {
        let addr = config.url.trim_end_matches('/');
        if addr.is_empty() {
            return Err(VaultError::Config("Vault address is empty".to_string()));
        }
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VaultError::Config("no Vault token provided".to_string()))?;

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                VaultError::Config(format!("Failed to read CA certificate {}: {}", path, e))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                VaultError::Config(format!("Invalid CA certificate {}: {}", path, e))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| VaultError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut vault_client = Self {
            addr: addr.to_string(),
            token: token.to_string(),
            client,
            custom_headers: HeaderMap::new(),
        };
        if let Some(namespace) = config.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            vault_client.add_header(NAMESPACE_HEADER, namespace);
        }
        Ok(vault_client)
    }

    /// Adds a custom header to the client.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the header
    /// * `value` - The value of the header
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let (Ok(header_name), Ok(header_value)) =
            (HeaderName::from_str(name), HeaderValue::from_str(value))
        {
            self.custom_headers.insert(header_name, header_value);
        }
        self
    }

    /// Makes a GET request to the Vault API.
    pub async fn get(&self, path: &str) -> Result<Value, VaultError> {
        self.request(Method::GET, path, None).await
    }

    /// Makes a POST request to the Vault API with a JSON body.
    pub async fn post_with_body(&self, path: &str, body: Value) -> Result<Value, VaultError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Makes a DELETE request to the Vault API.
    pub async fn delete(&self, path: &str) -> Result<Value, VaultError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Makes a request to the Vault API with the specified method and optional body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, VaultError> {
        let url = format!("{}{}", self.addr, path);
        debug!("Vault request: {} {}", method, path);
        let mut request = self.client.request(method, &url);

        // Add token header for authentication
        request = request.header("X-Vault-Token", &self.token);

        // Add any custom headers
        for (name, value) in self.custom_headers.iter() {
            request = request.header(name, value);
        }

        // Add JSON body if provided
        if let Some(json_body) = body {
            request = request.json(&json_body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::Connection(format!("Request to {} failed: {}", url, e)))?;

        check_response(response).await
    }
}
