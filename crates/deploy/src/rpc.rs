//! Shared utilities for talking to Ethereum JSON-RPC endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure modes of a JSON-RPC round trip.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("{method} request failed: {reason}")]
    Transport { method: String, reason: String },
    /// The node answered with an error object. Reverts surface here.
    #[error("{message}")]
    Response { code: i64, message: String },
    /// The node answered, but the result could not be decoded.
    #[error("Failed to decode {method} result: {reason}")]
    Decode { method: String, reason: String },
}

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, RpcError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| RpcError::Transport {
            method: "client".to_string(),
            reason: e.to_string(),
        })
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RpcError> {
    let transport = |e: reqwest::Error| RpcError::Transport {
        method: method.to_string(),
        reason: e.to_string(),
    };

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(transport)?;

    let result: Value = response.json().await.map_err(transport)?;

    if let Some(error) = result.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");
        // Revert data, when present, is more useful than the generic message.
        let message = match error.get("data").and_then(|d| d.as_str()) {
            Some(data) => format!("{} ({})", message, data),
            None => message.to_string(),
        };
        return Err(RpcError::Response {
            code: error.get("code").and_then(|c| c.as_i64()).unwrap_or_default(),
            message,
        });
    }

    let result_value = result.get("result").cloned().unwrap_or(Value::Null);

    serde_json::from_value(result_value).map_err(|e| RpcError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
