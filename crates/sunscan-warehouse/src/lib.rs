//! # sunscan warehouse
//!
//! DuckDB-backed analytical store for scraped TRON token data.
//!
//! Tables:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `transfers` | Raw TRC-20 transfer rows the scans derive their address sequences from |
//! | `token_metadata` | One row per contract: decimals, sanitized symbol/name |
//! | `trc20_balances` | Append-only `balanceOf` snapshots per `(account, contract)` |
//! | `scrape_errors` | Append-only per-item scrape failures |
//!
//! All user- and chain-provided values go through parameterized queries.
//! The warehouse implements the core's `SourceReader` and `StorageSink`
//! seams, so the scan orchestrator never sees SQL.

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

use sunscan_core::scan::{
    BalanceRecord, ErrorRecord, SourceReader, StorageSink, StoreError, TokenMetadata,
};

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TimestampFormat(#[from] time::error::Format),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_sunscan_home().join("warehouse.duckdb"),
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// Guardrails for ad-hoc query execution.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    pub max_rows: usize,
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--max-rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--query-timeout-ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub truncated: bool,
}

/// Raw transfer row used to seed the source-reader sequences.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub contract: String,
    pub account: String,
    pub amount_hex: String,
    pub block_num: i64,
    /// ISO 8601 timestamp string.
    pub ts: String,
}

/// The main warehouse interface.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Append raw transfer rows (normally loaded by the upstream pipeline).
    pub fn ingest_transfers(&self, rows: &[TransferRecord]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            for row in rows {
                let params: [&dyn ToSql; 5] = [
                    &row.contract,
                    &row.account,
                    &row.amount_hex,
                    &row.block_num,
                    &row.ts,
                ];
                connection.execute(
                    "INSERT INTO transfers (contract, account, amount_hex, block_num, ts) \
                     VALUES (?, ?, ?, ?, TRY_CAST(? AS TIMESTAMP))",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Upsert one metadata row; the contract key makes re-scrapes idempotent.
    pub fn insert_token_metadata(&self, row: &TokenMetadata) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let decimals = i32::from(row.decimals);
        let params: [&dyn ToSql; 4] = [&row.contract, &decimals, &row.symbol, &row.name];
        connection.execute(
            "INSERT OR REPLACE INTO token_metadata \
             (contract, decimals, symbol, name, updated_at) \
             VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Append one balance snapshot. At-least-once: duplicates are allowed.
    pub fn insert_balance_record(&self, row: &BalanceRecord) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let balance = row.balance.to_string();
        let params: [&dyn ToSql; 4] = [&row.account, &row.contract, &row.balance_hex, &balance];
        connection.execute(
            "INSERT INTO trc20_balances \
             (account, contract, balance_hex, balance, updated_at) \
             VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Append one scrape failure.
    pub fn insert_error_record(&self, row: &ErrorRecord) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let ts = row.at.format(&Rfc3339)?;
        let params: [&dyn ToSql; 4] = [&row.contract, &row.account, &row.reason, &ts];
        connection.execute(
            "INSERT INTO scrape_errors (contract, account, reason, ts) \
             VALUES (?, ?, ?, TRY_CAST(? AS TIMESTAMP))",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Whether metadata for this contract is already materialized.
    pub fn metadata_exists(&self, contract: &str) -> Result<bool, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM token_metadata WHERE contract = ?",
            [contract],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Distinct contracts seen in `transfers`.
    pub fn distinct_contracts(&self) -> Result<Vec<String>, WarehouseError> {
        self.string_column("SELECT DISTINCT contract FROM transfers ORDER BY contract", &[])
    }

    /// Distinct accounts seen in `transfers`.
    pub fn distinct_accounts(&self) -> Result<Vec<String>, WarehouseError> {
        self.string_column("SELECT DISTINCT account FROM transfers ORDER BY account", &[])
    }

    /// Distinct contracts a given account has transfer history with.
    pub fn distinct_contracts_for_account(
        &self,
        account: &str,
    ) -> Result<Vec<String>, WarehouseError> {
        self.string_column(
            "SELECT DISTINCT contract FROM transfers WHERE account = ? ORDER BY contract",
            &[&account],
        )
    }

    fn string_column(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(sql)?;
        let rows = statement.query_map(params, |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for value in rows {
            values.push(value?);
        }
        Ok(values)
    }

    /// Execute an ad-hoc SQL query under guardrails.
    ///
    /// Without `allow_write` only a single SELECT/CTE statement is
    /// accepted; the rejection happens before the statement ever reaches
    /// the database.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
        allow_write: bool,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = vet_sql(sql, allow_write)?;
        let connection = self.manager.acquire()?;

        if is_select_like(sql) {
            run_select(&connection, sql, guardrails)
        } else {
            // vet_sql only lets non-SELECT statements through with
            // allow_write set.
            connection.execute_batch(sql)?;
            Ok(QueryResult {
                columns: Vec::new(),
                rows: Vec::new(),
                row_count: 0,
                truncated: false,
            })
        }
    }
}

impl SourceReader for Warehouse {
    fn contracts(&self) -> Result<Vec<String>, StoreError> {
        self.distinct_contracts().map_err(into_store_error)
    }

    fn accounts(&self) -> Result<Vec<String>, StoreError> {
        self.distinct_accounts().map_err(into_store_error)
    }

    fn contracts_for_account(&self, account: &str) -> Result<Vec<String>, StoreError> {
        self.distinct_contracts_for_account(account)
            .map_err(into_store_error)
    }
}

impl StorageSink for Warehouse {
    fn has_metadata(&self, contract: &str) -> Result<bool, StoreError> {
        self.metadata_exists(contract).map_err(into_store_error)
    }

    fn insert_metadata(&self, row: &TokenMetadata) -> Result<(), StoreError> {
        self.insert_token_metadata(row).map_err(into_store_error)
    }

    fn insert_balance(&self, row: &BalanceRecord) -> Result<(), StoreError> {
        self.insert_balance_record(row).map_err(into_store_error)
    }

    fn insert_error(&self, row: &ErrorRecord) -> Result<(), StoreError> {
        self.insert_error_record(row).map_err(into_store_error)
    }
}

fn into_store_error(error: WarehouseError) -> StoreError {
    StoreError(error.to_string())
}

fn finalize_transaction(
    connection: &Connection,
    result: Result<(), WarehouseError>,
) -> Result<(), WarehouseError> {
    match result {
        Ok(()) => {
            connection.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Trim the query and apply the read-only rules.
///
/// A conservative gate: the first keyword must be SELECT or WITH and the
/// trimmed text must hold a single statement. String literals containing
/// `;` are rejected too; the `sql` command is for inspection, not
/// migration scripts.
fn vet_sql(sql: &str, allow_write: bool) -> Result<&str, WarehouseError> {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    if sql.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from(
            "query must not be empty",
        )));
    }
    if allow_write {
        return Ok(sql);
    }
    if !is_select_like(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "read-only mode accepts only SELECT/WITH queries; pass --write for anything else",
        )));
    }
    if sql.contains(';') {
        return Err(WarehouseError::QueryRejected(String::from(
            "read-only mode accepts a single statement",
        )));
    }
    Ok(sql)
}

fn is_select_like(sql: &str) -> bool {
    let first_keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(first_keyword.as_str(), "SELECT" | "WITH")
}

fn run_select(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
) -> Result<QueryResult, WarehouseError> {
    let deadline = Instant::now() + guardrails.timeout();
    let mut statement = connection.prepare(sql)?;

    // DuckDB only exposes column metadata after an execution.
    let _ = statement.query([] as [&dyn ToSql; 0])?;
    let columns: Vec<SqlColumn> = (0..statement.column_count())
        .map(|index| SqlColumn {
            name: statement
                .column_name(index)
                .map(ToString::to_string)
                .unwrap_or_default(),
            r#type: statement.column_type(index).to_string(),
        })
        .collect();

    let mut cursor = statement.query([] as [&dyn ToSql; 0])?;
    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut truncated = false;

    while let Some(row) = cursor.next()? {
        if Instant::now() > deadline {
            return Err(WarehouseError::QueryTimeout {
                timeout_ms: guardrails.query_timeout_ms,
            });
        }
        if rows.len() == guardrails.max_rows {
            truncated = true;
            break;
        }

        let mut cells = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            cells.push(cell_to_json(row.get::<_, DuckValue>(index)?));
        }
        rows.push(cells);
    }

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn cell_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(v) => Value::Bool(v),
        DuckValue::TinyInt(v) => Value::from(v),
        DuckValue::SmallInt(v) => Value::from(v),
        DuckValue::Int(v) => Value::from(v),
        DuckValue::BigInt(v) => Value::from(v),
        DuckValue::UTinyInt(v) => Value::from(v),
        DuckValue::USmallInt(v) => Value::from(v),
        DuckValue::UInt(v) => Value::from(v),
        DuckValue::UBigInt(v) => Value::from(v),
        DuckValue::Float(v) => Value::from(v),
        DuckValue::Double(v) => Value::from(v),
        DuckValue::Text(v) => Value::String(v),
        DuckValue::Blob(v) => Value::String(hex::encode(v)),
        other => Value::String(format!("{other:?}")),
    }
}

fn resolve_sunscan_home() -> PathBuf {
    if let Some(path) = env::var_os("SUNSCAN_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".sunscan");
    }

    PathBuf::from(".sunscan")
}
