//! Error taxonomy for the contract-call engine and its retry classifier.

use std::fmt::{Display, Formatter};

/// Failure categories surfaced by one logical contract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport-level failure (connection reset, DNS, send failure).
    Network,
    /// Per-attempt deadline elapsed before a response arrived.
    Timeout,
    /// Non-success HTTP status from the endpoint.
    HttpStatus,
    /// The JSON-RPC response carried an `error` object.
    JsonRpc,
    /// The response body could not be parsed as JSON-RPC.
    Malformed,
    /// The response was otherwise successful but carried no usable result
    /// (absent `result` field or the literal `"0x"`). Never retried.
    NoResult,
    /// Caller-side mistake (bad address, unsupported argument). Never retried.
    ClientError,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::HttpStatus => "http_status",
            Self::JsonRpc => "json_rpc",
            Self::Malformed => "malformed",
            Self::NoResult => "no_result",
            Self::ClientError => "client_error",
        }
    }
}

/// Structured failure from the resilient call engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    kind: ErrorKind,
    message: String,
    retryable: bool,
}

impl RpcError {
    fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    /// Transport failure, classified by its message.
    pub fn network(message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = is_retryable(&message, None, None);
        Self::new(ErrorKind::Network, message, retryable)
    }

    /// Per-attempt timeout. Always retryable.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, true)
    }

    /// Non-success HTTP status, classified by the status code and, when the
    /// body still parsed, the JSON-RPC error code it carried.
    pub fn http_status(status: u16, code: Option<i64>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::HttpStatus,
            message,
            is_retryable("", Some(status), code),
        )
    }

    /// JSON-RPC error object, classified by its code.
    pub fn json_rpc(code: i64, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::JsonRpc,
            message,
            is_retryable("", None, Some(code)),
        )
    }

    /// Unparseable response body, classified by the HTTP status it came with.
    pub fn malformed(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Malformed,
            message,
            is_retryable("", Some(status), None),
        )
    }

    /// Absent or empty (`"0x"`) result on an otherwise-successful response.
    pub fn no_result(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoResult, message, false)
    }

    /// Caller-side mistake. Never retried.
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientError, message, false)
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.as_str())
    }
}

impl std::error::Error for RpcError {}

/// Message fragments that indicate a transient transport problem.
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection reset",
    "timed out",
    "timeout",
    "dns error",
    "failed to lookup address",
    "connection closed before message completed",
    "socket hang up",
    "operation was aborted",
    "error sending request",
    "network",
];

/// JSON-RPC codes that map to transient node-level/internal failures.
const TRANSIENT_RPC_CODES: &[i64] = &[-32000, -32001, -32002, -32603];

/// Pure retryability decision shared by every classification site.
///
/// Returns true when any of the following holds: the message matches a
/// known transient-network pattern, the HTTP status is 429 or a 5xx, or
/// the JSON-RPC code is in the transient set.
pub fn is_retryable(message: &str, status: Option<u16>, code: Option<i64>) -> bool {
    let message = message.to_ascii_lowercase();
    if TRANSIENT_PATTERNS.iter().any(|p| message.contains(p)) {
        return true;
    }

    if let Some(status) = status {
        if status == 429 || status >= 500 {
            return true;
        }
    }

    if let Some(code) = code {
        if TRANSIENT_RPC_CODES.contains(&code) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_message_patterns_are_retryable() {
        assert!(is_retryable("tcp connect error: Connection reset by peer", None, None));
        assert!(is_retryable("operation timed out", None, None));
        assert!(is_retryable("dns error: failed to lookup address information", None, None));
        assert!(is_retryable("connection closed before message completed", None, None));
        assert!(is_retryable("error sending request for url", None, None));
        assert!(!is_retryable("invalid contract address", None, None));
    }

    #[test]
    fn http_status_classification() {
        assert!(is_retryable("", Some(429), None));
        assert!(is_retryable("", Some(500), None));
        assert!(is_retryable("", Some(503), None));
        assert!(is_retryable("", Some(599), None));
        assert!(!is_retryable("", Some(400), None));
        assert!(!is_retryable("", Some(401), None));
        assert!(!is_retryable("", Some(404), None));
    }

    #[test]
    fn transient_rpc_codes_classification() {
        for code in [-32000, -32001, -32002, -32603] {
            assert!(is_retryable("", None, Some(code)), "code {code}");
        }
        assert!(!is_retryable("", None, Some(-32601)));
        assert!(!is_retryable("", None, Some(3)));
    }

    #[test]
    fn no_result_and_client_errors_are_fatal() {
        assert!(!RpcError::no_result("no result for decimals()").retryable());
        assert!(!RpcError::client("bad address").retryable());
        assert!(RpcError::timeout("deadline elapsed").retryable());
        assert!(RpcError::http_status(502, None, "HTTP 502").retryable());
        assert!(!RpcError::http_status(400, None, "HTTP 400").retryable());
        assert!(RpcError::http_status(400, Some(-32603), "HTTP 400").retryable());
    }
}
