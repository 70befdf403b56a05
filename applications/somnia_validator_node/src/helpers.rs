// Copyright 2025. The Somnia Agents Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Hex codecs for the 0x-prefixed wire formats used by the chain interfaces.

use ethabi::ethereum_types::{H160, H256, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HexParseError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Expected {expected} bytes but got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("Invalid numeric quantity: {0}")]
    Quantity(String),
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn from_hex_prefixed(s: &str) -> Result<Vec<u8>, HexParseError> {
    let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    Ok(hex::decode(stripped)?)
}

pub fn encode_address(address: &H160) -> String {
    to_hex_prefixed(address.as_bytes())
}

pub fn parse_address(s: &str) -> Result<H160, HexParseError> {
    let bytes = from_hex_prefixed(s)?;
    if bytes.len() != 20 {
        return Err(HexParseError::Length {
            expected: 20,
            actual: bytes.len(),
        });
    }
    Ok(H160::from_slice(&bytes))
}

pub fn parse_h256(s: &str) -> Result<H256, HexParseError> {
    let bytes = from_hex_prefixed(s)?;
    if bytes.len() != 32 {
        return Err(HexParseError::Length {
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(H256::from_slice(&bytes))
}

/// Parse a JSON-RPC hex quantity ("0x1", "0xde0b6b3a7640000", ...).
pub fn parse_quantity(s: &str) -> Result<U256, HexParseError> {
    let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    U256::from_str_radix(stripped, 16).map_err(|e| HexParseError::Quantity(e.to_string()))
}

pub fn encode_quantity(value: U256) -> String {
    format!("{:#x}", value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let encoded = to_hex_prefixed(&bytes);
        assert_eq!(encoded, "0xdeadbeef");
        assert_eq!(from_hex_prefixed(&encoded).unwrap(), bytes);
        assert_eq!(from_hex_prefixed("deadbeef").unwrap(), bytes);
    }

    #[test]
    fn address_round_trip() {
        let s = "0x00000000000000000000000000000000000000aa";
        let address = parse_address(s).unwrap();
        assert_eq!(encode_address(&address), s);
    }

    #[test]
    fn address_rejects_wrong_length() {
        assert!(matches!(
            parse_address("0xaabb"),
            Err(HexParseError::Length { expected: 20, actual: 2 })
        ));
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn quantity_round_trip() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::zero());
        assert_eq!(parse_quantity("0x1").unwrap(), U256::one());
        assert_eq!(parse_quantity("0xff").unwrap(), U256::from(255u64));
        assert_eq!(encode_quantity(U256::from(255u64)), "0xff");
        assert_eq!(encode_quantity(U256::zero()), "0x0");
    }

    #[test]
    fn h256_requires_32_bytes() {
        let s = format!("0x{}", "11".repeat(32));
        assert!(parse_h256(&s).is_ok());
        assert!(parse_h256("0x1122").is_err());
    }
}
