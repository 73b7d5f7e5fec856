//! Common helper functions for Vault operations.

use crate::vault::{VaultClient, VaultError};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// The subset of `sys/seal-status` used to learn what the server supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealStatus {
    #[serde(rename = "type", default)]
    pub type_field: String,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

/// Checks the HTTP response from Vault. If successful, returns the JSON body;
/// otherwise, it extracts an error message or returns the status code.
///
/// A 404 is always reported as [`VaultError::HttpStatus`] so callers can
/// recognize missing objects with [`VaultError::is_not_found`].
pub async fn check_response(resp: Response) -> Result<Value, VaultError> {
    let status = resp.status();
    if status.is_success() {
        if status == StatusCode::NO_CONTENT {
            return Ok(serde_json::json!({}));
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        return Ok(serde_json::from_str(&body)?);
    }

    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(VaultError::HttpStatus(status.as_u16(), body));
    }
    match first_error(&body) {
        Some(msg) if status == StatusCode::BAD_REQUEST => {
            Err(VaultError::HttpStatus(status.as_u16(), msg))
        }
        Some(msg) => Err(VaultError::Api(msg)),
        None => Err(VaultError::HttpStatus(status.as_u16(), body)),
    }
}

/// Returns the first entry of Vault's `errors` array, if any.
pub fn first_error(body: &str) -> Option<String> {
    let val: Value = serde_json::from_str(body).ok()?;
    val.get("errors")?
        .as_array()?
        .first()?
        .as_str()
        .map(str::to_string)
}

/// Fetches the seal status, which carries the server version string.
pub async fn read_seal_status(client: &VaultClient) -> Result<SealStatus, VaultError> {
    let body = client.get("/v1/sys/seal-status").await?;
    let status: SealStatus = serde_json::from_value(body)?;
    debug!(
        "Vault at {} reports version {:?} (sealed: {})",
        client.addr, status.version, status.sealed
    );
    Ok(status)
}
