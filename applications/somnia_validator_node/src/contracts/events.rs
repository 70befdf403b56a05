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

use ethabi::{
    ethereum_types::{H160, H256, U256},
    RawLog,
    Token,
};

use super::{abi::SOMNIA_AGENTS_ABI, ContractError};

/// A decoded `RequestCreated` log. The payload stays opaque; it is handed to the agent
/// container as-is.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub request_id: U256,
    pub agent_id: U256,
    pub requester: H160,
    pub max_cost: U256,
    pub payload: Vec<u8>,
    pub subcommittee: Vec<H160>,
    pub tx_hash: H256,
}

impl RequestEvent {
    pub fn is_in_subcommittee(&self, address: &H160) -> bool {
        self.subcommittee.contains(address)
    }

    /// The dedup key for redelivered logs after a reconnect.
    pub fn dedup_key(&self) -> (H256, U256) {
        (self.tx_hash, self.request_id)
    }
}

/// Topic0 of `RequestCreated`, derived canonically from the event signature.
pub fn request_created_topic() -> H256 {
    SOMNIA_AGENTS_ABI
        .event("RequestCreated")
        .expect("RequestCreated is part of the SomniaAgents ABI")
        .signature()
}

pub fn decode_request_created(
    tx_hash: H256,
    topics: Vec<H256>,
    data: Vec<u8>,
) -> Result<RequestEvent, ContractError> {
    let event = SOMNIA_AGENTS_ABI
        .event("RequestCreated")
        .expect("RequestCreated is part of the SomniaAgents ABI");
    let log = event
        .parse_log(RawLog { topics, data })
        .map_err(|e| ContractError::MalformedEvent(e.to_string()))?;

    let mut request_id = None;
    let mut agent_id = None;
    let mut requester = None;
    let mut max_cost = None;
    let mut payload = None;
    let mut subcommittee = None;

    for param in log.params {
        match (param.name.as_str(), param.value) {
            ("requestId", Token::Uint(value)) => request_id = Some(value),
            ("agentId", Token::Uint(value)) => agent_id = Some(value),
            ("requester", Token::Address(value)) => requester = Some(value),
            ("maxCost", Token::Uint(value)) => max_cost = Some(value),
            ("payload", Token::Bytes(value)) => payload = Some(value),
            ("subcommittee", Token::Array(members)) => {
                let members = members
                    .into_iter()
                    .map(|token| match token {
                        Token::Address(address) => Ok(address),
                        other => Err(ContractError::MalformedEvent(format!(
                            "subcommittee member was not an address: {:?}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                subcommittee = Some(members);
            },
            (name, value) => {
                return Err(ContractError::MalformedEvent(format!(
                    "unexpected parameter {}: {:?}",
                    name, value
                )))
            },
        }
    }

    Ok(RequestEvent {
        request_id: request_id.ok_or_else(|| ContractError::MalformedEvent("missing requestId".to_string()))?,
        agent_id: agent_id.ok_or_else(|| ContractError::MalformedEvent("missing agentId".to_string()))?,
        requester: requester.ok_or_else(|| ContractError::MalformedEvent("missing requester".to_string()))?,
        max_cost: max_cost.ok_or_else(|| ContractError::MalformedEvent("missing maxCost".to_string()))?,
        payload: payload.ok_or_else(|| ContractError::MalformedEvent("missing payload".to_string()))?,
        subcommittee: subcommittee
            .ok_or_else(|| ContractError::MalformedEvent("missing subcommittee".to_string()))?,
        tx_hash,
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub fn u256_topic(value: U256) -> H256 {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        H256(buf)
    }

    pub fn address_topic(address: H160) -> H256 {
        H256::from(address)
    }

    /// Build the topics and data of a RequestCreated log the way the contract emits them.
    pub fn encode_request_created(
        request_id: U256,
        agent_id: U256,
        requester: H160,
        max_cost: U256,
        payload: &[u8],
        subcommittee: &[H160],
    ) -> (Vec<H256>, Vec<u8>) {
        let topics = vec![
            request_created_topic(),
            u256_topic(request_id),
            u256_topic(agent_id),
            address_topic(requester),
        ];
        let data = ethabi::encode(&[
            Token::Uint(max_cost),
            Token::Bytes(payload.to_vec()),
            Token::Array(subcommittee.iter().map(|a| Token::Address(*a)).collect()),
        ]);
        (topics, data)
    }

    #[test]
    fn decode_round_trip() {
        let requester = H160::repeat_byte(0x11);
        let member_a = H160::repeat_byte(0x22);
        let member_b = H160::repeat_byte(0x33);
        let payload = vec![0x77, 0x16, 0x02, 0xf7];
        let (topics, data) = encode_request_created(
            U256::from(12u64),
            U256::from(3u64),
            requester,
            U256::from(1_000_000u64),
            &payload,
            &[member_a, member_b],
        );

        let event = decode_request_created(H256::repeat_byte(0xab), topics, data).unwrap();
        assert_eq!(event.request_id, U256::from(12u64));
        assert_eq!(event.agent_id, U256::from(3u64));
        assert_eq!(event.requester, requester);
        assert_eq!(event.max_cost, U256::from(1_000_000u64));
        assert_eq!(event.payload, payload);
        assert_eq!(event.subcommittee, vec![member_a, member_b]);
        assert_eq!(event.tx_hash, H256::repeat_byte(0xab));
    }

    #[test]
    fn subcommittee_membership() {
        let member = H160::repeat_byte(0x22);
        let outsider = H160::repeat_byte(0x44);
        let (topics, data) = encode_request_created(
            U256::from(15u64),
            U256::from(3u64),
            H160::repeat_byte(0x11),
            U256::zero(),
            &[],
            &[member],
        );
        let event = decode_request_created(H256::zero(), topics, data).unwrap();
        assert!(event.is_in_subcommittee(&member));
        assert!(!event.is_in_subcommittee(&outsider));
    }

    #[test]
    fn wrong_topic0_is_rejected() {
        let (mut topics, data) = encode_request_created(
            U256::one(),
            U256::one(),
            H160::zero(),
            U256::zero(),
            &[],
            &[],
        );
        topics[0] = H256::repeat_byte(0xff);
        assert!(matches!(
            decode_request_created(H256::zero(), topics, data),
            Err(ContractError::MalformedEvent(_))
        ));
    }

    #[test]
    fn truncated_data_is_rejected() {
        let (topics, data) = encode_request_created(
            U256::one(),
            U256::one(),
            H160::zero(),
            U256::zero(),
            &[1, 2, 3],
            &[],
        );
        assert!(decode_request_created(H256::zero(), topics, data[..32].to_vec()).is_err());
    }
}
