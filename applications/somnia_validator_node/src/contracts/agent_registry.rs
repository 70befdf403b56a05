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

use super::{abi::AGENT_REGISTRY_ABI, ContractError};
use crate::rpc::SessionRpcClient;

/// An on-chain agent record. Immutable per id from the node's perspective.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: U256,
    pub owner: H160,
    pub metadata_url: String,
    pub container_image_url: String,
    pub cost: U256,
}

#[derive(Clone)]
pub struct AgentRegistryContract {
    rpc: Arc<SessionRpcClient>,
    address: H160,
}

impl AgentRegistryContract {
    pub fn new(rpc: Arc<SessionRpcClient>, address: H160) -> Self {
        Self { rpc, address }
    }

    /// Fetch the agent record for `agent_id`. A zeroed record means the id is unregistered.
    pub async fn get_agent(&self, agent_id: U256) -> Result<Agent, ContractError> {
        let function = AGENT_REGISTRY_ABI.function("getAgent")?;
        let data = function.encode_input(&[Token::Uint(agent_id)])?;
        let output = self.rpc.eth_call(self.address, &data, None).await?;
        let mut tokens = function.decode_output(&output)?;

        let fields = match tokens.pop() {
            Some(Token::Tuple(fields)) if tokens.is_empty() => fields,
            other => return Err(ContractError::unexpected("getAgent", format!("{:?}", other))),
        };
        let agent = decode_agent(fields)?;
        if agent.owner.is_zero() && agent.container_image_url.is_empty() {
            return Err(ContractError::AgentNotFound(agent_id));
        }
        Ok(agent)
    }
}

fn decode_agent(fields: Vec<Token>) -> Result<Agent, ContractError> {
    match <[Token; 5]>::try_from(fields) {
        Ok(
            [Token::Uint(id), Token::Address(owner), Token::String(metadata_url), Token::String(container_image_url), Token::Uint(cost)],
        ) => Ok(Agent {
            id,
            owner,
            metadata_url,
            container_image_url,
            cost,
        }),
        Ok(other) => Err(ContractError::unexpected("getAgent", format!("{:?}", other))),
        Err(other) => Err(ContractError::unexpected("getAgent", format!("{:?}", other))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn agent_tuple(owner: H160, image_url: &str) -> Token {
        Token::Tuple(vec![
            Token::Uint(U256::from(3u64)),
            Token::Address(owner),
            Token::String("https://example.com/agent.json".to_string()),
            Token::String(image_url.to_string()),
            Token::Uint(U256::from(42u64)),
        ])
    }

    #[test]
    fn decode_agent_output() {
        let function = AGENT_REGISTRY_ABI.function("getAgent").unwrap();
        let encoded = ethabi::encode(&[agent_tuple(H160::repeat_byte(0x11), "https://example.com/agent.tar")]);
        let mut tokens = function.decode_output(&encoded).unwrap();
        let fields = match tokens.pop() {
            Some(Token::Tuple(fields)) => fields,
            other => panic!("unexpected output: {:?}", other),
        };

        let agent = decode_agent(fields).unwrap();
        assert_eq!(agent.id, U256::from(3u64));
        assert_eq!(agent.owner, H160::repeat_byte(0x11));
        assert_eq!(agent.container_image_url, "https://example.com/agent.tar");
        assert_eq!(agent.cost, U256::from(42u64));
    }

    #[test]
    fn getagent_input_round_trips() {
        let function = AGENT_REGISTRY_ABI.function("getAgent").unwrap();
        let data = function.encode_input(&[Token::Uint(U256::from(7u64))]).unwrap();
        // Selector plus one 32-byte word.
        assert_eq!(data.len(), 36);
        let decoded = function.decode_input(&data[4..]).unwrap();
        assert_eq!(decoded, vec![Token::Uint(U256::from(7u64))]);
    }

    #[test]
    fn zeroed_record_is_not_found() {
        let fields = vec![
            Token::Uint(U256::zero()),
            Token::Address(H160::zero()),
            Token::String(String::new()),
            Token::String(String::new()),
            Token::Uint(U256::zero()),
        ];
        let agent = decode_agent(fields).unwrap();
        assert!(agent.owner.is_zero() && agent.container_image_url.is_empty());
    }
}
