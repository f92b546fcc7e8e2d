//! Shared test support: scripted HTTP transport and in-memory
//! reader/sink doubles for the scan flows.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use sunscan_core::scan::{
    BalanceRecord, ErrorRecord, SourceReader, StorageSink, StoreError, TokenMetadata,
};
use sunscan_core::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// HTTP double that routes each request by `(to, selector)` extracted from
/// the JSON-RPC body and replays a scripted queue of outcomes per route.
#[derive(Default)]
pub struct RoutedHttpClient {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse, HttpError>>>>,
}

impl RoutedHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one raw outcome for calls of `selector_hex` (no `0x`) against
    /// the contract whose call `to` field is `to_eth_hex`.
    pub fn enqueue(
        &self,
        to_eth_hex: &str,
        selector_hex: &str,
        outcome: Result<HttpResponse, HttpError>,
    ) {
        self.routes
            .lock()
            .expect("routes mutex poisoned")
            .entry(route_key(to_eth_hex, selector_hex))
            .or_default()
            .push_back(outcome);
    }

    /// Queue a successful JSON-RPC response carrying `result_hex`.
    pub fn enqueue_result(&self, to_eth_hex: &str, selector_hex: &str, result_hex: &str) {
        self.enqueue(to_eth_hex, selector_hex, Ok(rpc_result(result_hex)));
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let key = request_route_key(&request.body);
        let next = key
            .and_then(|key| {
                self.routes
                    .lock()
                    .expect("routes mutex poisoned")
                    .get_mut(&key)
                    .and_then(VecDeque::pop_front)
            })
            .unwrap_or_else(|| Err(HttpError::new("no scripted response for request")));
        Box::pin(async move { next })
    }
}

fn route_key(to_eth_hex: &str, selector_hex: &str) -> String {
    format!(
        "{}:{}",
        to_eth_hex.to_ascii_lowercase(),
        selector_hex.trim_start_matches("0x").to_ascii_lowercase()
    )
}

fn request_route_key(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let call = value.get("params")?.get(0)?;
    let to = call.get("to")?.as_str()?;
    let data = call.get("data")?.as_str()?;
    let selector = data.trim_start_matches("0x").get(..8)?;
    Some(route_key(to, selector))
}

/// A 200 response with the given `result` hex.
pub fn rpc_result(result_hex: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{result_hex}"}}"#),
    }
}

/// A 32-byte big-endian word carrying `value`, `0x`-prefixed.
pub fn uint_word(value: u64) -> String {
    format!("0x{value:064x}")
}

/// A dynamic ABI string payload carrying `value`, `0x`-prefixed.
pub fn abi_string(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut padded = bytes.to_vec();
    padded.resize(bytes.len().div_ceil(32).max(1) * 32, 0);
    format!("0x{:064x}{:064x}{}", 32, bytes.len(), hex::encode(padded))
}

/// In-memory source reader over fixed address sequences.
#[derive(Default)]
pub struct MemReader {
    pub contracts: Vec<String>,
    pub accounts: Vec<String>,
    pub by_account: HashMap<String, Vec<String>>,
}

impl SourceReader for MemReader {
    fn contracts(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.contracts.clone())
    }

    fn accounts(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.accounts.clone())
    }

    fn contracts_for_account(&self, account: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.by_account.get(account).cloned().unwrap_or_default())
    }
}

/// In-memory sink capturing every insert.
#[derive(Default)]
pub struct MemSink {
    pub existing: HashSet<String>,
    pub metadata: Mutex<Vec<TokenMetadata>>,
    pub balances: Mutex<Vec<BalanceRecord>>,
    pub errors: Mutex<Vec<ErrorRecord>>,
}

impl MemSink {
    pub fn with_existing(contracts: &[&str]) -> Self {
        Self {
            existing: contracts.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> Vec<TokenMetadata> {
        self.metadata.lock().expect("metadata mutex poisoned").clone()
    }

    pub fn balances(&self) -> Vec<BalanceRecord> {
        self.balances.lock().expect("balances mutex poisoned").clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().expect("errors mutex poisoned").clone()
    }
}

impl StorageSink for MemSink {
    fn has_metadata(&self, contract: &str) -> Result<bool, StoreError> {
        Ok(self.existing.contains(contract)
            || self
                .metadata
                .lock()
                .expect("metadata mutex poisoned")
                .iter()
                .any(|row| row.contract == contract))
    }

    fn insert_metadata(&self, row: &TokenMetadata) -> Result<(), StoreError> {
        self.metadata
            .lock()
            .expect("metadata mutex poisoned")
            .push(row.clone());
        Ok(())
    }

    fn insert_balance(&self, row: &BalanceRecord) -> Result<(), StoreError> {
        self.balances
            .lock()
            .expect("balances mutex poisoned")
            .push(row.clone());
        Ok(())
    }

    fn insert_error(&self, row: &ErrorRecord) -> Result<(), StoreError> {
        self.errors
            .lock()
            .expect("errors mutex poisoned")
            .push(row.clone());
        Ok(())
    }
}
