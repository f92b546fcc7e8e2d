//! Minimal ABI support for read-only TRC-20 calls.
//!
//! Encoding covers exactly what the scraper sends: a 4-byte keccak selector
//! plus optional address arguments, each left-padded to a 32-byte word.
//! Decoding covers unsigned 256-bit integers and the two string layouts
//! TRC-20 contracts actually return for `name()`/`symbol()`: the dynamic
//! ABI string and the legacy packed-ASCII slot.

use ethereum_types::U256;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::address::TronAddress;

/// Decode failures for raw call results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
    #[error("uint256 payload too large: {0}")]
    Overflow(String),
}

/// Call argument. Only addresses are supported today; that is all the
/// scraped signatures (`balanceOf(address)`) take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallArg {
    Address(TronAddress),
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// First 4 bytes of keccak256 of the canonical signature string.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Full call data: selector followed by each argument as a 32-byte word.
pub fn encode_call(signature: &str, args: &[CallArg]) -> String {
    let mut data = String::with_capacity(2 + 8 + args.len() * 64);
    data.push_str("0x");
    data.push_str(&hex::encode(selector(signature)));
    for arg in args {
        match arg {
            CallArg::Address(address) => {
                // 20 raw bytes, left-padded to a word.
                data.push_str(&"0".repeat(24));
                data.push_str(&hex::encode(address.as_bytes()));
            }
        }
    }
    data
}

/// Interpret a hex payload as a big-endian unsigned 256-bit integer.
///
/// Tolerates an optional `0x` prefix, left padding, and odd nibble counts.
/// An empty payload decodes to zero; distinguishing "decoded zero" from
/// "no result" is the caller's concern.
pub fn decode_uint256(payload: &str) -> Result<U256, AbiError> {
    let payload = payload.trim().trim_start_matches("0x");
    if payload.is_empty() {
        return Ok(U256::zero());
    }
    if !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AbiError::InvalidHex(payload.to_string()));
    }

    // Wider payloads are fine as long as the leading words are zero.
    let significant = payload.trim_start_matches('0');
    if significant.len() > 64 {
        return Err(AbiError::Overflow(payload.to_string()));
    }
    if significant.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_str_radix(significant, 16).map_err(|_| AbiError::InvalidHex(payload.to_string()))
}

/// Decode a `name()`/`symbol()` result into a sanitized string.
///
/// Detection rule: if the payload carries a consistent dynamic-string
/// header (offset and length words describing a slice inside the payload),
/// decode that slice; otherwise fall back to reading the raw bytes as a
/// packed-ASCII slot. Returns `None` when nothing printable survives
/// sanitization.
pub fn decode_text_field(payload: &str) -> Option<String> {
    let bytes = decode_hex_bytes(payload)?;
    let raw = match dynamic_string_slice(&bytes) {
        Some(slice) => slice,
        None => &bytes[..],
    };
    sanitize_text(&String::from_utf8_lossy(raw))
}

/// Extract the payload slice of a dynamic ABI string, if the header is
/// consistent with one.
fn dynamic_string_slice(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 64 {
        return None;
    }
    let offset = word_as_usize(&bytes[..32])?;
    if offset % 32 != 0 {
        return None;
    }
    // The header words come straight off the wire; overflowing arithmetic
    // on them is just another inconsistent header.
    let start = offset.checked_add(32)?;
    if start > bytes.len() {
        return None;
    }
    let length = word_as_usize(&bytes[offset..start])?;
    let end = start.checked_add(length)?;
    if end > bytes.len() {
        return None;
    }
    Some(&bytes[start..end])
}

fn word_as_usize(word: &[u8]) -> Option<usize> {
    // Reject values that do not fit a usize; such headers are not a
    // plausible dynamic string.
    if word[..24].iter().any(|&b| b != 0) {
        return None;
    }
    let mut value = [0u8; 8];
    value.copy_from_slice(&word[24..32]);
    Some(u64::from_be_bytes(value) as usize)
}

fn decode_hex_bytes(payload: &str) -> Option<Vec<u8>> {
    let payload = payload.trim().trim_start_matches("0x");
    if payload.is_empty() {
        return None;
    }
    let owned;
    let even = if payload.len() % 2 == 0 {
        payload
    } else {
        owned = format!("0{payload}");
        &owned
    };
    hex::decode(even).ok()
}

/// Strip control characters, ASCII digits, and escaped-quote sequences;
/// trim whitespace. Empty results become `None`.
fn sanitize_text(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .replace("\\\"", "")
        .chars()
        .filter(|c| !c.is_control() && !c.is_ascii_digit() && *c != '\u{fffd}')
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK_HOLE: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

    #[test]
    fn selectors_match_known_values() {
        assert_eq!(selector("decimals()"), [0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(selector("symbol()"), [0x95, 0xd8, 0x9b, 0x41]);
        assert_eq!(selector("name()"), [0x06, 0xfd, 0xde, 0x03]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn encode_call_pads_address_argument_to_a_word() {
        let account: TronAddress = BLACK_HOLE.parse().expect("valid address");
        let data = encode_call("balanceOf(address)", &[CallArg::Address(account)]);
        assert_eq!(data, format!("0x70a08231{}", "0".repeat(64)));
    }

    #[test]
    fn encode_call_without_args_is_just_the_selector() {
        assert_eq!(encode_call("decimals()", &[]), "0x313ce567");
    }

    #[test]
    fn decode_uint256_handles_padding_and_zero() {
        let one = format!("0x{}1", "0".repeat(63));
        assert_eq!(decode_uint256(&one).unwrap(), U256::from(1));
        assert_eq!(
            decode_uint256(&format!("0x{}", "0".repeat(64))).unwrap(),
            U256::zero()
        );
        assert_eq!(decode_uint256("").unwrap(), U256::zero());
        assert_eq!(decode_uint256("0x").unwrap(), U256::zero());
        assert_eq!(decode_uint256("0x06").unwrap(), U256::from(6));
    }

    #[test]
    fn decode_uint256_rejects_garbage() {
        assert!(decode_uint256("0xzz").is_err());
        assert!(decode_uint256(&format!("0x1{}", "0".repeat(64))).is_err());
    }

    #[test]
    fn decodes_dynamic_abi_string() {
        // offset 32, length 6, "Tether" padded to a word.
        let payload = format!(
            "0x{:064x}{:064x}{}{}",
            32,
            6,
            hex::encode("Tether"),
            "0".repeat(64 - 12)
        );
        assert_eq!(decode_text_field(&payload).as_deref(), Some("Tether"));
    }

    #[test]
    fn falls_back_to_packed_ascii_slot() {
        // Legacy layout: raw ASCII in a single 32-byte slot.
        let mut word = [0u8; 32];
        word[..4].copy_from_slice(b"USDT");
        let payload = format!("0x{}", hex::encode(word));
        assert_eq!(decode_text_field(&payload).as_deref(), Some("USDT"));
    }

    #[test]
    fn hostile_string_headers_fall_back_without_panicking() {
        // Offset word that survives the alignment check but overflows the
        // slice arithmetic.
        let offset = format!("0x{:064x}{:064x}", u64::MAX - 31, 0u64);
        assert_eq!(decode_text_field(&offset), None);

        // Plausible offset, absurd length word.
        let length = format!("0x{:064x}{:064x}", 32u64, u64::MAX);
        assert_eq!(decode_text_field(&length), None);
    }

    #[test]
    fn sanitizer_strips_digits_controls_and_empties_to_none() {
        let mut word = [0u8; 32];
        word[..6].copy_from_slice(b"USD\x01T2");
        let payload = format!("0x{}", hex::encode(word));
        assert_eq!(decode_text_field(&payload).as_deref(), Some("USDT"));

        let zeros = format!("0x{}", "0".repeat(64));
        assert_eq!(decode_text_field(&zeros), None);
        assert_eq!(decode_text_field(""), None);
    }
}
