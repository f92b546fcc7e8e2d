//! Core contracts for sunscan.
//!
//! This crate contains:
//! - TRON address and minimal TRC-20 ABI codecs
//! - Retry policy and the transient-failure classifier
//! - The resilient JSON-RPC call engine behind an HTTP transport seam
//! - Scan orchestration over source-reader/storage-sink collaborators

pub mod abi;
pub mod address;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;
pub mod rpc;
pub mod scan;

pub use abi::{AbiError, CallArg};
pub use address::TronAddress;
pub use config::ScraperConfig;
pub use error::{is_retryable, ErrorKind, RpcError};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use retry::RetryPolicy;
pub use rpc::RpcClient;
pub use scan::{
    BalanceRecord, BalanceScanReport, ErrorRecord, MetadataScanReport, Scanner, SourceReader,
    StorageSink, StoreError, TokenMetadata, BLACK_HOLE_ADDRESS,
};
