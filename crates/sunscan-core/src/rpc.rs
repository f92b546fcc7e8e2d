//! Resilient read-only contract calls over JSON-RPC.
//!
//! [`RpcClient::call`] executes one logical `eth_call` with bounded retry:
//! each attempt runs under the policy's timeout, failures are classified
//! into the [`crate::error::ErrorKind`] taxonomy, and only transient ones
//! are retried with exponential backoff and jitter. An absent or `"0x"`
//! result is fatal immediately even though it arrives on an otherwise
//! successful response.

use std::sync::Arc;

use serde::Deserialize;

use crate::abi::{self, CallArg};
use crate::address::TronAddress;
use crate::error::RpcError;
use crate::http::{HttpClient, HttpRequest};
use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize)]
struct JsonRpcReply {
    result: Option<String>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for read-only TRC-20 calls.
///
/// Constructed from configuration and passed to whoever needs it; there is
/// no process-global client.
#[derive(Clone)]
pub struct RpcClient {
    endpoint: String,
    http: Arc<dyn HttpClient>,
    policy: RetryPolicy,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the default retry policy used by [`RpcClient::call`].
    pub fn with_policy(mut self, policy: impl Into<RetryPolicy>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute one logical contract call under the client's policy.
    pub async fn call(
        &self,
        contract: &TronAddress,
        signature: &str,
        args: &[CallArg],
    ) -> Result<String, RpcError> {
        self.call_with_policy(contract, signature, args, self.policy)
            .await
    }

    /// Execute one logical contract call under an explicit policy. A bare
    /// integer works here as "retries = N, rest default".
    pub async fn call_with_policy(
        &self,
        contract: &TronAddress,
        signature: &str,
        args: &[CallArg],
        policy: impl Into<RetryPolicy>,
    ) -> Result<String, RpcError> {
        let policy = policy.into();
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [
                { "to": contract.to_eth_hex(), "data": abi::encode_call(signature, args) },
                "latest"
            ],
            "id": 1,
        })
        .to_string();

        let attempts = policy.attempts();
        for attempt in 1..=attempts {
            match self.attempt(&body, &policy, contract, signature).await {
                Ok(hex) => return Ok(hex),
                Err(err) => {
                    if !err.retryable() || attempt == attempts {
                        return Err(err);
                    }
                    let delay = policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        signature,
                        contract = %contract,
                        error = err.message(),
                        "contract call retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // The loop always returns on its last attempt.
        Err(RpcError::network(format!(
            "unknown error calling {signature} on {contract}"
        )))
    }

    async fn attempt(
        &self,
        body: &str,
        policy: &RetryPolicy,
        contract: &TronAddress,
        signature: &str,
    ) -> Result<String, RpcError> {
        let request =
            HttpRequest::post_json(&self.endpoint, body).with_timeout_ms(policy.timeout_ms);

        let response = self.http.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                RpcError::timeout(e.message())
            } else {
                RpcError::network(e.message())
            }
        })?;

        let reply: Option<JsonRpcReply> = serde_json::from_str(&response.body).ok();

        if !response.is_success() {
            let code = reply
                .as_ref()
                .and_then(|r| r.error.as_ref())
                .map(|e| e.code);
            return Err(RpcError::http_status(
                response.status,
                code,
                format!("HTTP {}: {}", response.status, response.body.trim()),
            ));
        }

        let Some(reply) = reply else {
            return Err(RpcError::malformed(
                response.status,
                format!("failed to parse JSON (status {})", response.status),
            ));
        };

        if let Some(error) = reply.error {
            return Err(RpcError::json_rpc(
                error.code,
                format!("RPC error {}: {}", error.code, error.message),
            ));
        }

        match reply.result {
            Some(hex) if !hex.eq_ignore_ascii_case("0x") && !hex.is_empty() => Ok(hex),
            _ => Err(RpcError::no_result(format!(
                "no result for {signature} on {contract}"
            ))),
        }
    }
}
