//! Scan orchestration: metadata and balance flows.
//!
//! The orchestrator drives the call engine over sequences supplied by a
//! [`SourceReader`] and routes every outcome to a [`StorageSink`]. Each
//! item is isolated: one bad contract or `(account, contract)` pair never
//! aborts the batch. Only a sink failure does, which is a documented
//! limitation rather than masked.

use std::collections::HashMap;
use std::sync::Arc;

use ethereum_types::U256;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::{Id as TaskId, JoinError, JoinSet};

use crate::abi::{self, CallArg};
use crate::address::TronAddress;
use crate::error::{ErrorKind, RpcError};
use crate::rpc::RpcClient;

/// The burn ("black hole") address, excluded from the balance scan.
pub const BLACK_HOLE_ADDRESS: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

/// Highest decimals value accepted for a token.
const MAX_DECIMALS: u64 = 18;

/// Failure raised by a source reader or storage sink.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

/// Sanitized token metadata, persisted only when decimals is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub contract: String,
    pub decimals: u8,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

/// One successful `balanceOf` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub account: String,
    pub contract: String,
    pub balance_hex: String,
    pub balance: U256,
}

/// A per-item failure routed to the sink instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub contract: String,
    pub account: Option<String>,
    pub reason: String,
    pub at: OffsetDateTime,
}

impl ErrorRecord {
    fn new(contract: &str, account: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            contract: contract.to_string(),
            account: account.map(str::to_string),
            reason: reason.into(),
            at: OffsetDateTime::now_utc(),
        }
    }
}

/// Finite, restartable address sequences the scans iterate over.
pub trait SourceReader: Send + Sync {
    fn contracts(&self) -> Result<Vec<String>, StoreError>;
    fn accounts(&self) -> Result<Vec<String>, StoreError>;
    fn contracts_for_account(&self, account: &str) -> Result<Vec<String>, StoreError>;
}

/// Fire-and-forget row inserts; at-least-once, no dedup guaranteed here.
pub trait StorageSink: Send + Sync {
    fn has_metadata(&self, contract: &str) -> Result<bool, StoreError>;
    fn insert_metadata(&self, row: &TokenMetadata) -> Result<(), StoreError>;
    fn insert_balance(&self, row: &BalanceRecord) -> Result<(), StoreError>;
    fn insert_error(&self, row: &ErrorRecord) -> Result<(), StoreError>;
}

/// Outcome counts for one metadata scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetadataScanReport {
    pub scanned: usize,
    pub written: usize,
    /// Already materialized; skipped for idempotent resume.
    pub already_present: usize,
    /// Discarded whole because decimals fell outside [0, 18].
    pub invalid: usize,
    pub failed: usize,
}

/// Outcome counts for one balance scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BalanceScanReport {
    pub accounts: usize,
    pub pairs: usize,
    pub balances_written: usize,
    pub errors_recorded: usize,
}

enum PairOutcome {
    Balance(BalanceRecord),
    Failed(ErrorRecord),
}

/// Drives the two scan flows over a reader/sink pair.
#[derive(Clone)]
pub struct Scanner {
    rpc: RpcClient,
    concurrency: usize,
}

impl Scanner {
    pub fn new(rpc: RpcClient) -> Self {
        Self {
            rpc,
            concurrency: 1,
        }
    }

    /// Size of the balance-scan worker pool. 1 means strictly sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch and persist metadata for every contract not yet materialized.
    ///
    /// The three calls per contract run sequentially: symbol and name are
    /// only worth fetching once decimals validated.
    pub async fn scan_metadata(
        &self,
        reader: Arc<dyn SourceReader>,
        sink: Arc<dyn StorageSink>,
    ) -> Result<MetadataScanReport, StoreError> {
        let mut report = MetadataScanReport::default();

        for contract in reader.contracts()? {
            report.scanned += 1;
            if sink.has_metadata(&contract)? {
                report.already_present += 1;
                continue;
            }

            tracing::info!(contract = %contract, "fetching token metadata");
            match self.fetch_metadata(&contract).await {
                Ok(Some(row)) => {
                    tracing::info!(
                        contract = %contract,
                        symbol = row.symbol.as_deref().unwrap_or(""),
                        decimals = row.decimals,
                        "token metadata written"
                    );
                    sink.insert_metadata(&row)?;
                    report.written += 1;
                }
                Ok(None) => {
                    tracing::warn!(contract = %contract, "invalid decimals, item discarded");
                    report.invalid += 1;
                }
                Err(err) => {
                    tracing::warn!(contract = %contract, error = %err, "metadata fetch failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// `Ok(None)` means decimals was out of range and the whole item is
    /// discarded with no partial write.
    async fn fetch_metadata(&self, contract: &str) -> Result<Option<TokenMetadata>, RpcError> {
        let address: TronAddress = contract.parse()?;

        let decimals_hex = self.rpc.call(&address, "decimals()", &[]).await?;
        let decimals = abi::decode_uint256(&decimals_hex)
            .map_err(|e| RpcError::client(format!("bad decimals payload: {e}")))?;
        if decimals > U256::from(MAX_DECIMALS) {
            return Ok(None);
        }

        let symbol_hex = self.rpc.call(&address, "symbol()", &[]).await?;
        let name_hex = self.rpc.call(&address, "name()", &[]).await?;

        Ok(Some(TokenMetadata {
            contract: contract.to_string(),
            decimals: decimals.as_u64() as u8,
            symbol: abi::decode_text_field(&symbol_hex),
            name: abi::decode_text_field(&name_hex),
        }))
    }

    /// Fetch `balanceOf` for every `(account, contract)` pair, bounded by
    /// the configured worker-pool size. A slow pair occupies one slot
    /// through its retries but never blocks unrelated pairs beyond that.
    pub async fn scan_balances(
        &self,
        reader: Arc<dyn SourceReader>,
        sink: Arc<dyn StorageSink>,
    ) -> Result<BalanceScanReport, StoreError> {
        let mut report = BalanceScanReport::default();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers: JoinSet<PairOutcome> = JoinSet::new();
        // Tracks which pair each live worker carries, so a panicked worker
        // still gets an error row under its own identity.
        let mut in_flight: HashMap<TaskId, (String, String)> = HashMap::new();

        for account in reader.accounts()? {
            if account == BLACK_HOLE_ADDRESS {
                continue;
            }
            report.accounts += 1;

            for contract in reader.contracts_for_account(&account)? {
                report.pairs += 1;
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| StoreError(String::from("worker pool closed")))?;

                // Drain finished pairs before admitting the next one.
                while let Some(joined) = workers.try_join_next_with_id() {
                    route_outcome(sink.as_ref(), joined, &mut in_flight, &mut report)?;
                }

                let rpc = self.rpc.clone();
                let task_account = account.clone();
                let task_contract = contract.clone();
                let handle = workers.spawn(async move {
                    let _permit = permit;
                    process_pair(&rpc, &task_account, &task_contract).await
                });
                in_flight.insert(handle.id(), (account.clone(), contract));
            }
        }

        while let Some(joined) = workers.join_next_with_id().await {
            route_outcome(sink.as_ref(), joined, &mut in_flight, &mut report)?;
        }

        Ok(report)
    }
}

async fn process_pair(rpc: &RpcClient, account: &str, contract: &str) -> PairOutcome {
    match fetch_balance(rpc, account, contract).await {
        Ok(row) => PairOutcome::Balance(row),
        Err(err) if err.kind() == ErrorKind::NoResult => {
            tracing::warn!(account, contract, "zero balance");
            PairOutcome::Failed(ErrorRecord::new(contract, Some(account), "zero balance"))
        }
        Err(err) => {
            tracing::warn!(account, contract, error = %err, "balance fetch failed");
            PairOutcome::Failed(ErrorRecord::new(contract, Some(account), err.message()))
        }
    }
}

async fn fetch_balance(
    rpc: &RpcClient,
    account: &str,
    contract: &str,
) -> Result<BalanceRecord, RpcError> {
    let contract_address: TronAddress = contract.parse()?;
    let account_address: TronAddress = account.parse()?;

    let balance_hex = rpc
        .call(
            &contract_address,
            "balanceOf(address)",
            &[CallArg::Address(account_address)],
        )
        .await?;
    // A payload that decodes to zero is a genuine zero balance; only an
    // absent result (NoResult above) maps to the "zero balance" error row.
    let balance = abi::decode_uint256(&balance_hex)
        .map_err(|e| RpcError::client(format!("bad balance payload: {e}")))?;

    Ok(BalanceRecord {
        account: account.to_string(),
        contract: contract.to_string(),
        balance_hex,
        balance,
    })
}

fn route_outcome(
    sink: &dyn StorageSink,
    joined: Result<(TaskId, PairOutcome), JoinError>,
    in_flight: &mut HashMap<TaskId, (String, String)>,
    report: &mut BalanceScanReport,
) -> Result<(), StoreError> {
    match joined {
        Ok((id, PairOutcome::Balance(row))) => {
            in_flight.remove(&id);
            sink.insert_balance(&row)?;
            report.balances_written += 1;
        }
        Ok((id, PairOutcome::Failed(row))) => {
            in_flight.remove(&id);
            sink.insert_error(&row)?;
            report.errors_recorded += 1;
        }
        Err(join_error) => {
            // A panicked worker still owes its pair an error row.
            if let Some((account, contract)) = in_flight.remove(&join_error.id()) {
                tracing::error!(account, contract, error = %join_error, "balance worker panicked");
                sink.insert_error(&ErrorRecord::new(
                    &contract,
                    Some(&account),
                    "balance worker panicked",
                ))?;
                report.errors_recorded += 1;
            }
        }
    }
    Ok(())
}
