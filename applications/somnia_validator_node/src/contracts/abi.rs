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

//! The minimal ABI surface the node consumes, parsed once at startup.

use ethabi::{ethereum_types::U256, Contract};
use once_cell::sync::Lazy;

use crate::helpers::to_hex_prefixed;

const AGENT_REGISTRY_ABI_JSON: &str = r#"[
  {
    "type": "function",
    "name": "getAgent",
    "stateMutability": "view",
    "inputs": [{ "name": "agentId", "type": "uint256" }],
    "outputs": [
      {
        "name": "agent",
        "type": "tuple",
        "components": [
          { "name": "id", "type": "uint256" },
          { "name": "owner", "type": "address" },
          { "name": "metadataUrl", "type": "string" },
          { "name": "containerImageUrl", "type": "string" },
          { "name": "cost", "type": "uint256" }
        ]
      }
    ]
  }
]"#;

const COMMITTEE_ABI_JSON: &str = r#"[
  {
    "type": "function",
    "name": "heartbeatMembership",
    "stateMutability": "nonpayable",
    "inputs": [],
    "outputs": []
  },
  {
    "type": "function",
    "name": "leaveMembership",
    "stateMutability": "nonpayable",
    "inputs": [],
    "outputs": []
  },
  {
    "type": "function",
    "name": "getActiveMembers",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{ "name": "members", "type": "address[]" }]
  }
]"#;

const SOMNIA_AGENTS_ABI_JSON: &str = r#"[
  {
    "type": "function",
    "name": "submitResponse",
    "stateMutability": "nonpayable",
    "inputs": [
      { "name": "requestId", "type": "uint256" },
      { "name": "result", "type": "bytes" },
      { "name": "receipt", "type": "uint256" },
      { "name": "price", "type": "uint256" }
    ],
    "outputs": []
  },
  {
    "type": "function",
    "name": "agentRegistry",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{ "name": "registry", "type": "address" }]
  },
  {
    "type": "function",
    "name": "committee",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{ "name": "committee", "type": "address" }]
  },
  {
    "type": "event",
    "name": "RequestCreated",
    "anonymous": false,
    "inputs": [
      { "name": "requestId", "type": "uint256", "indexed": true },
      { "name": "agentId", "type": "uint256", "indexed": true },
      { "name": "requester", "type": "address", "indexed": true },
      { "name": "maxCost", "type": "uint256", "indexed": false },
      { "name": "payload", "type": "bytes", "indexed": false },
      { "name": "subcommittee", "type": "address[]", "indexed": false }
    ]
  }
]"#;

pub static AGENT_REGISTRY_ABI: Lazy<Contract> =
    Lazy::new(|| Contract::load(AGENT_REGISTRY_ABI_JSON.as_bytes()).expect("AgentRegistry ABI is valid"));

pub static COMMITTEE_ABI: Lazy<Contract> =
    Lazy::new(|| Contract::load(COMMITTEE_ABI_JSON.as_bytes()).expect("Committee ABI is valid"));

pub static SOMNIA_AGENTS_ABI: Lazy<Contract> =
    Lazy::new(|| Contract::load(SOMNIA_AGENTS_ABI_JSON.as_bytes()).expect("SomniaAgents ABI is valid"));

/// Selector of the standard `Error(string)` revert.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decode the revert data of a failed call. Standard `Error(string)` reverts yield the message
/// itself; anything else (custom errors, malformed data) is returned as hex so operators can
/// look the selector up against the contract source.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.len() >= 68 && data[..4] == ERROR_STRING_SELECTOR {
        let len = U256::from_big_endian(&data[36..68]);
        if len <= U256::from(data.len() - 68) {
            if let Ok(reason) = std::str::from_utf8(&data[68..68 + len.as_usize()]) {
                return reason.to_string();
            }
        }
    }
    to_hex_prefixed(data)
}

#[cfg(test)]
mod test {
    use ethabi::{ethereum_types::H256, Token};

    use super::*;

    fn encode_error_string(message: &str) -> Vec<u8> {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(ethabi::encode(&[Token::String(message.to_string())]));
        data
    }

    #[test]
    fn abis_parse() {
        assert!(AGENT_REGISTRY_ABI.function("getAgent").is_ok());
        assert!(COMMITTEE_ABI.function("heartbeatMembership").is_ok());
        assert!(COMMITTEE_ABI.function("leaveMembership").is_ok());
        assert!(COMMITTEE_ABI.function("getActiveMembers").is_ok());
        assert!(SOMNIA_AGENTS_ABI.function("submitResponse").is_ok());
        assert!(SOMNIA_AGENTS_ABI.event("RequestCreated").is_ok());
    }

    #[test]
    fn request_created_topic_is_canonical() {
        let event = SOMNIA_AGENTS_ABI.event("RequestCreated").unwrap();
        assert_eq!(
            event.signature(),
            // keccak256("RequestCreated(uint256,uint256,address,uint256,bytes,address[])")
            ethabi::long_signature(
                "RequestCreated",
                &event.inputs.iter().map(|p| p.kind.clone()).collect::<Vec<_>>()
            )
        );
        assert_ne!(event.signature(), H256::zero());
    }

    #[test]
    fn decode_standard_error_string() {
        let data = encode_error_string("already finalized");
        assert_eq!(decode_revert_reason(&data), "already finalized");
    }

    #[test]
    fn decode_custom_error_falls_back_to_hex() {
        let data = vec![0x12, 0x34, 0x56, 0x78, 0xaa];
        assert_eq!(decode_revert_reason(&data), "0x12345678aa");
    }

    #[test]
    fn decode_truncated_error_falls_back_to_hex() {
        let mut data = encode_error_string("already finalized");
        // Claiming a longer string than the data carries must not panic.
        data.truncate(70);
        assert!(decode_revert_reason(&data).starts_with("0x"));
    }

    #[test]
    fn decode_empty_revert_data() {
        assert_eq!(decode_revert_reason(&[]), "0x");
    }
}
