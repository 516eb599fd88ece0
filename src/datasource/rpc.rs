//! JSON-RPC node client: `eth_call` reads sent as JSON-RPC batch requests.

use super::{ContractReader, RawValue, ReadRequest, TransportError};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Contract reader over an Ethereum JSON-RPC endpoint.
///
/// One `batch_call` is one HTTP request carrying a JSON array of `eth_call`s.
/// Transient failures (network, 429, 5xx) are retried with exponential
/// backoff here, inside the transport.
#[derive(Debug, Clone)]
pub struct JsonRpcReader {
    client: Client,
    rpc_url: String,
}

impl JsonRpcReader {
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: Client::new(),
            rpc_url,
        }
    }

    async fn post(&self, payload: serde_json::Value) -> Result<serde_json::Value, TransportError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    warn!("RPC request failed, retrying: {}", e);
                    backoff::Error::transient(TransportError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(TransportError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(TransportError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(TransportError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(TransportError::ParseError(e.to_string())))
        })
        .await
    }
}

fn eth_call_payload(id: usize, request: &ReadRequest) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "eth_call",
        "params": [
            {
                "to": request.contract.as_str(),
                "data": format!("0x{}", hex::encode(request.calldata()))
            },
            "latest"
        ]
    })
}

/// Decode one JSON-RPC response object into the value of `request`.
fn parse_call_result(
    response: &serde_json::Value,
    request: &ReadRequest,
) -> Result<RawValue, TransportError> {
    if let Some(error) = response.get("error") {
        return Err(TransportError::RpcError {
            code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
            message: format!(
                "{} ({})",
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error"),
                request
            ),
        });
    }

    let result = response
        .get("result")
        .and_then(|r| r.as_str())
        .ok_or_else(|| TransportError::ParseError("Missing result field".to_string()))?;
    let bytes = hex::decode(result.trim_start_matches("0x"))
        .map_err(|e| TransportError::ParseError(format!("Invalid hex result: {}", e)))?;
    request.decode(&bytes)
}

/// Match a batch response array back to request order by `id`.
fn parse_batch_response(
    response: &serde_json::Value,
    requests: &[ReadRequest],
) -> Result<Vec<RawValue>, TransportError> {
    let items = response
        .as_array()
        .ok_or_else(|| TransportError::ParseError("Expected array response".to_string()))?;
    if items.len() != requests.len() {
        return Err(TransportError::ParseError(format!(
            "Expected {} responses, got {}",
            requests.len(),
            items.len()
        )));
    }

    let mut slots: Vec<Option<&serde_json::Value>> = vec![None; requests.len()];
    for item in items {
        let id = item
            .get("id")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .filter(|id| *id < requests.len())
            .ok_or_else(|| TransportError::ParseError("Missing or invalid id".to_string()))?;
        slots[id] = Some(item);
    }

    slots
        .into_iter()
        .zip(requests)
        .map(|(slot, request)| {
            let item = slot.ok_or_else(|| {
                TransportError::ParseError(format!("No response for {}", request))
            })?;
            parse_call_result(item, request)
        })
        .collect()
}

#[async_trait]
impl ContractReader for JsonRpcReader {
    async fn call(&self, request: &ReadRequest) -> Result<RawValue, TransportError> {
        debug!("eth_call {}", request);
        let response = self.post(eth_call_payload(0, request)).await?;
        parse_call_result(&response, request)
    }

    async fn batch_call(&self, requests: &[ReadRequest]) -> Result<Vec<RawValue>, TransportError> {
        debug!("eth_call batch of {}", requests.len());
        let payload = serde_json::Value::Array(
            requests
                .iter()
                .enumerate()
                .map(|(id, request)| eth_call_payload(id, request))
                .collect(),
        );
        let response = self.post(payload).await?;
        parse_batch_response(&response, requests)
    }
}
