//! TRON address conversions between base58check and raw 20-byte form.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::RpcError;

/// Version prefix carried by every mainnet TRON address.
const TRON_ADDRESS_PREFIX: u8 = 0x41;

/// TRON account or contract address, held as the raw 20 bytes.
///
/// The wire payload of a contract call wants the EVM-style form (prefix
/// stripped); operators and the warehouse deal in the base58check form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TronAddress([u8; 20]);

impl TronAddress {
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EVM-style `0x`-prefixed hex form used in the `to` field of a call.
    pub fn to_eth_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Base58check form with the 0x41 version prefix.
    pub fn to_base58(&self) -> String {
        let mut payload = [0u8; 21];
        payload[0] = TRON_ADDRESS_PREFIX;
        payload[1..].copy_from_slice(&self.0);
        bs58::encode(payload).with_check().into_string()
    }
}

impl FromStr for TronAddress {
    type Err = RpcError;

    /// Parse a base58check TRON address (`T...`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = bs58::decode(s)
            .with_check(Some(TRON_ADDRESS_PREFIX))
            .into_vec()
            .map_err(|e| RpcError::client(format!("invalid TRON address '{s}': {e}")))?;

        if payload.len() != 21 {
            return Err(RpcError::client(format!(
                "invalid TRON address '{s}': expected 21 payload bytes, got {}",
                payload.len()
            )));
        }

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&payload[1..]);
        Ok(Self(bytes))
    }
}

impl Display for TronAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The burn ("black hole") address maps to the all-zero account.
    const BLACK_HOLE: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

    #[test]
    fn black_hole_address_decodes_to_zero_bytes() {
        let address: TronAddress = BLACK_HOLE.parse().expect("valid address");
        assert_eq!(address.as_bytes(), &[0u8; 20]);
        assert_eq!(
            address.to_eth_hex(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn base58_round_trip() {
        let address: TronAddress = BLACK_HOLE.parse().expect("valid address");
        assert_eq!(address.to_base58(), BLACK_HOLE);
    }

    #[test]
    fn usdt_contract_address_converts() {
        let address: TronAddress = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"
            .parse()
            .expect("valid address");
        assert_eq!(
            address.to_eth_hex(),
            "0xa614f803b6fd780986a42c78ec9c7f77e6ded13c"
        );
    }

    #[test]
    fn malformed_input_is_a_client_error() {
        let err = "not-an-address".parse::<TronAddress>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ClientError);
        assert!(!err.retryable());

        // Valid base58 but wrong checksum.
        assert!("T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwc"
            .parse::<TronAddress>()
            .is_err());
    }
}
