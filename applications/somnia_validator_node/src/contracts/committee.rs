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

use ethabi::{ethereum_types::H160, Token};

use super::{abi::COMMITTEE_ABI, ContractError};
use crate::rpc::{SessionRpcClient, TransactionReceipt};

#[derive(Clone)]
pub struct CommitteeContract {
    rpc: Arc<SessionRpcClient>,
    address: H160,
}

impl CommitteeContract {
    pub fn new(rpc: Arc<SessionRpcClient>, address: H160) -> Self {
        Self { rpc, address }
    }

    /// Keep this node eligible for subcommittee elections.
    pub async fn heartbeat_membership(&self) -> Result<TransactionReceipt, ContractError> {
        self.send("heartbeatMembership").await
    }

    /// Withdraw from elections. Called once during shutdown.
    pub async fn leave_membership(&self) -> Result<TransactionReceipt, ContractError> {
        self.send("leaveMembership").await
    }

    pub async fn get_active_members(&self) -> Result<Vec<H160>, ContractError> {
        let function = COMMITTEE_ABI.function("getActiveMembers")?;
        let data = function.encode_input(&[])?;
        let output = self.rpc.eth_call(self.address, &data, None).await?;
        let mut tokens = function.decode_output(&output)?;

        let members = match tokens.pop() {
            Some(Token::Array(members)) if tokens.is_empty() => members,
            other => return Err(ContractError::unexpected("getActiveMembers", format!("{:?}", other))),
        };
        members
            .into_iter()
            .map(|token| match token {
                Token::Address(address) => Ok(address),
                other => Err(ContractError::unexpected("getActiveMembers", format!("{:?}", other))),
            })
            .collect()
    }

    async fn send(&self, name: &str) -> Result<TransactionReceipt, ContractError> {
        let function = COMMITTEE_ABI.function(name)?;
        let data = function.encode_input(&[])?;
        let receipt = self
            .rpc
            .send_session_transaction(self.address, Default::default(), &data)
            .await?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership_calls_encode_to_bare_selectors() {
        let heartbeat = COMMITTEE_ABI
            .function("heartbeatMembership")
            .unwrap()
            .encode_input(&[])
            .unwrap();
        let leave = COMMITTEE_ABI.function("leaveMembership").unwrap().encode_input(&[]).unwrap();
        assert_eq!(heartbeat.len(), 4);
        assert_eq!(leave.len(), 4);
        assert_ne!(heartbeat, leave);
    }

    #[test]
    fn active_members_decode() {
        let function = COMMITTEE_ABI.function("getActiveMembers").unwrap();
        let members = vec![H160::repeat_byte(0x01), H160::repeat_byte(0x02)];
        let encoded = ethabi::encode(&[Token::Array(
            members.iter().map(|m| Token::Address(*m)).collect(),
        )]);
        let mut tokens = function.decode_output(&encoded).unwrap();
        match tokens.pop() {
            Some(Token::Array(decoded)) => {
                assert_eq!(decoded.len(), 2);
                assert_eq!(decoded[0], Token::Address(members[0]));
            },
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
