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

use std::sync::Arc;

use ethabi::{
    ethereum_types::{H160, U256},
    Token,
};

use super::{abi::SOMNIA_AGENTS_ABI, ContractError};
use crate::rpc::{SessionRpcClient, TransactionReceipt};

/// The root contract. The registry and committee addresses are resolved through it so a node is
/// configured with a single address and the trio stays consistent.
#[derive(Clone)]
pub struct SomniaAgentsContract {
    rpc: Arc<SessionRpcClient>,
    address: H160,
}

impl SomniaAgentsContract {
    pub fn new(rpc: Arc<SessionRpcClient>, address: H160) -> Self {
        Self { rpc, address }
    }

    pub async fn agent_registry(&self) -> Result<H160, ContractError> {
        self.address_view("agentRegistry").await
    }

    pub async fn committee(&self) -> Result<H160, ContractError> {
        self.address_view("committee").await
    }

    /// Submit this node's vote for a request. The receipt argument is a future receipt-CID slot,
    /// currently always zero; `price` carries the claimed execution cost.
    pub async fn submit_response(
        &self,
        request_id: U256,
        result: &[u8],
        receipt: U256,
        price: U256,
    ) -> Result<TransactionReceipt, ContractError> {
        let data = encode_submit_response(request_id, result, receipt, price)?;
        let tx_receipt = self
            .rpc
            .send_session_transaction(self.address, Default::default(), &data)
            .await?;
        Ok(tx_receipt)
    }

    /// Replay a failed `submitResponse` as a read-only call at the block it failed in, returning
    /// the raw revert data when the node reports it.
    pub async fn replay_submit_response(
        &self,
        request_id: U256,
        result: &[u8],
        receipt: U256,
        price: U256,
        block: Option<u64>,
    ) -> Result<Option<Vec<u8>>, ContractError> {
        let data = encode_submit_response(request_id, result, receipt, price)?;
        match self.rpc.eth_call(self.address, &data, block).await {
            // A successful replay carries no revert reason; report whatever bytes came back.
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) => match err.revert_data() {
                Some(data) => Ok(Some(data)),
                None => Err(err.into()),
            },
        }
    }

    async fn address_view(&self, name: &'static str) -> Result<H160, ContractError> {
        let function = SOMNIA_AGENTS_ABI.function(name)?;
        let data = function.encode_input(&[])?;
        let output = self.rpc.eth_call(self.address, &data, None).await?;
        let mut tokens = function.decode_output(&output)?;
        match tokens.pop() {
            Some(Token::Address(address)) if tokens.is_empty() => Ok(address),
            other => Err(ContractError::unexpected(name, format!("{:?}", other))),
        }
    }
}

fn encode_submit_response(
    request_id: U256,
    result: &[u8],
    receipt: U256,
    price: U256,
) -> Result<Vec<u8>, ContractError> {
    let function = SOMNIA_AGENTS_ABI.function("submitResponse")?;
    Ok(function.encode_input(&[
        Token::Uint(request_id),
        Token::Bytes(result.to_vec()),
        Token::Uint(receipt),
        Token::Uint(price),
    ])?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn submit_response_round_trips() {
        let result = vec![0x00, 0xe2, 0x15];
        let data = encode_submit_response(
            U256::from(12u64),
            &result,
            U256::zero(),
            U256::from(5_000u64),
        )
        .unwrap();

        let function = SOMNIA_AGENTS_ABI.function("submitResponse").unwrap();
        let decoded = function.decode_input(&data[4..]).unwrap();
        assert_eq!(decoded, vec![
            Token::Uint(U256::from(12u64)),
            Token::Bytes(result),
            Token::Uint(U256::zero()),
            Token::Uint(U256::from(5_000u64)),
        ]);
    }

    #[test]
    fn address_views_decode() {
        let function = SOMNIA_AGENTS_ABI.function("agentRegistry").unwrap();
        let registry = H160::repeat_byte(0x42);
        let encoded = ethabi::encode(&[Token::Address(registry)]);
        let tokens = function.decode_output(&encoded).unwrap();
        assert_eq!(tokens, vec![Token::Address(registry)]);
    }
}
