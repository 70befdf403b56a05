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

//! The session transport: a thin JSON-RPC 2.0 client over HTTP.
//!
//! Transactions are submitted through the node-side session RPC, which signs on behalf of the
//! configured seed, manages nonces globally and replies with the mined receipt. The same
//! endpoint serves read-only `eth_call`s. The client holds no mutable state besides the
//! monotonic request-id counter, so it is shared freely between tasks.

mod error;

use std::sync::atomic::{AtomicU64, Ordering};

use ethabi::ethereum_types::{H160, U256};
pub use error::RpcError;
use json::json;
use serde::Deserialize;
use serde_json as json;

use crate::helpers::{encode_address, encode_quantity, from_hex_prefixed, parse_address, parse_quantity, to_hex_prefixed};

/// Gas limit attached to every session transaction. The session RPC prices the actual gas; this
/// only caps it.
const SESSION_TX_GAS: u64 = 10_000_000;

/// Receipt returned by `sendSessionTransaction`. The session RPC blocks until the transaction
/// is mined, so a reply always carries the final status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub logs: Vec<json::Value>,
}

impl TransactionReceipt {
    /// True when the transaction executed without reverting (`status == 0x1`).
    pub fn is_success(&self) -> bool {
        self.status
            .as_deref()
            .and_then(|s| parse_quantity(s).ok())
            .map(|status| status == U256::one())
            .unwrap_or(false)
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|s| parse_quantity(s).ok())
            .map(|n| n.low_u64())
    }
}

pub struct SessionRpcClient {
    client: reqwest::Client,
    endpoint: String,
    seed: String,
    request_id: AtomicU64,
}

impl SessionRpcClient {
    pub fn new(endpoint: String, seed: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            seed,
            request_id: AtomicU64::new(1),
        }
    }

    /// Resolve the wallet address the session RPC signs as for our seed.
    pub async fn get_session_address(&self) -> Result<H160, RpcError> {
        let result = self.request("getSessionAddress", json!([self.seed])).await?;
        let address = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("getSessionAddress did not return a string".to_string()))?;
        Ok(parse_address(address)?)
    }

    /// Submit a transaction and wait for its receipt. Safe to call concurrently; the session RPC
    /// serializes nonces on its side.
    pub async fn send_session_transaction(
        &self,
        to: H160,
        value: U256,
        data: &[u8],
    ) -> Result<TransactionReceipt, RpcError> {
        let params = json!([{
            "seed": self.seed,
            "to": encode_address(&to),
            "value": encode_quantity(value),
            "data": to_hex_prefixed(data),
            "gas": encode_quantity(U256::from(SESSION_TX_GAS)),
        }]);
        let result = self.request("sendSessionTransaction", params).await?;
        Ok(json::from_value(result)?)
    }

    /// Read-only contract call. `block` pins the call to a historic block, which the revert
    /// replay path uses to reproduce a failed transaction.
    pub async fn eth_call(&self, to: H160, data: &[u8], block: Option<u64>) -> Result<Vec<u8>, RpcError> {
        let block = match block {
            Some(number) => encode_quantity(U256::from(number)),
            None => "latest".to_string(),
        };
        let params = json!([{ "to": encode_address(&to), "data": to_hex_prefixed(data) }, block]);
        let result = self.request("eth_call", params).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_call did not return a string".to_string()))?;
        Ok(from_hex_prefixed(hex_str)?)
    }

    async fn request(&self, method: &str, params: json::Value) -> Result<json::Value, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let reply = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json::<json::Value>()
            .await?;
        extract_result(reply)
    }
}

/// Split a JSON-RPC reply into its result, mapping `error` objects to [`RpcError::Server`].
fn extract_result(reply: json::Value) -> Result<json::Value, RpcError> {
    if let Some(error) = reply.get("error") {
        return Err(RpcError::Server {
            code: error.get("code").and_then(json::Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
            data: error.get("data").cloned(),
        });
    }
    match reply.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(RpcError::InvalidResponse(
            "reply carried neither result nor error".to_string(),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extract_result_returns_result() {
        let reply = json!({ "jsonrpc": "2.0", "id": 1, "result": "0xabc123" });
        assert_eq!(extract_result(reply).unwrap(), json!("0xabc123"));
    }

    #[test]
    fn extract_result_maps_error() {
        let reply = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "execution reverted", "data": "0x08c379a0" },
        });
        match extract_result(reply).unwrap_err() {
            RpcError::Server { code, message, data } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "execution reverted");
                assert_eq!(data, Some(json!("0x08c379a0")));
            },
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn extract_result_rejects_empty_reply() {
        let reply = json!({ "jsonrpc": "2.0", "id": 1 });
        assert!(matches!(extract_result(reply), Err(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn receipt_status_parsing() {
        let receipt: TransactionReceipt = json::from_value(json!({
            "transactionHash": "0x11",
            "status": "0x1",
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "logs": [],
        }))
        .unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.block_number(), Some(16));

        let reverted: TransactionReceipt = json::from_value(json!({ "status": "0x0" })).unwrap();
        assert!(!reverted.is_success());
        assert_eq!(reverted.block_number(), None);
    }
}
