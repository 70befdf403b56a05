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

use serde_json as json;
use thiserror::Error;

use crate::helpers::{from_hex_prefixed, HexParseError};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<json::Value>,
    },
    #[error("Unexpected RPC response: {0}")]
    InvalidResponse(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Hex error: {0}")]
    Hex(#[from] HexParseError),
}

impl RpcError {
    /// The raw revert bytes carried in an `eth_call` error reply, when present. Nodes report
    /// these either as a bare hex string or under a `data` key of the error's data object.
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        let data = match self {
            RpcError::Server { data: Some(data), .. } => data,
            _ => return None,
        };
        let hex_str = match data {
            json::Value::String(s) => s.as_str(),
            json::Value::Object(map) => map.get("data")?.as_str()?,
            _ => return None,
        };
        from_hex_prefixed(hex_str).ok()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn revert_data_from_string_payload() {
        let err = RpcError::Server {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some(json!("0x08c379a0")),
        };
        assert_eq!(err.revert_data().unwrap(), vec![0x08, 0xc3, 0x79, 0xa0]);
    }

    #[test]
    fn revert_data_from_object_payload() {
        let err = RpcError::Server {
            code: -32000,
            message: "execution reverted".to_string(),
            data: Some(json!({ "data": "0xdeadbeef" })),
        };
        assert_eq!(err.revert_data().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn revert_data_absent_for_transport_like_errors() {
        let err = RpcError::Server {
            code: -32000,
            message: "nonce too low".to_string(),
            data: None,
        };
        assert!(err.revert_data().is_none());
    }
}
