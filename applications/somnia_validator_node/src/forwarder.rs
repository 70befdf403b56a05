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

//! Delivers request payloads to agent containers and interprets their replies.

use std::{sync::Arc, time::Duration};

use json::json;
use log::*;
use serde_json as json;
use thiserror::Error;

use crate::{
    docker::{ContainerError, ContainerManager},
    helpers::{from_hex_prefixed, to_hex_prefixed},
};

const LOG_TARGET: &str = "somnia::validator_node::forwarder";

/// Cap on a single container round trip, protecting the worker pool from a wedged container.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A container's reply. `body` is the bytes submitted on chain; `receipt` is the execution
/// trace the container chose to emit, if any.
#[derive(Debug)]
pub struct ForwardReply {
    pub status: u16,
    pub body: Vec<u8>,
    pub receipt: Option<json::Value>,
}

pub struct AgentForwarder {
    containers: Arc<ContainerManager>,
    client: reqwest::Client,
}

impl AgentForwarder {
    pub fn new(containers: Arc<ContainerManager>) -> Self {
        Self {
            containers,
            client: reqwest::Client::new(),
        }
    }

    /// Route `payload` to the container serving `image_url`, starting or rolling it over first
    /// when needed.
    pub async fn forward(
        &self,
        image_url: &str,
        request_id: &str,
        payload: &[u8],
    ) -> Result<ForwardReply, ForwardError> {
        let (host_port, started) = self.containers.ensure(image_url).await?;
        if started {
            debug!(target: LOG_TARGET, "Started a fresh container for {}", image_url);
        }

        let response = self
            .client
            .post(format!("http://localhost:{}/", host_port))
            .header("X-Request-Id", request_id)
            .json(&envelope(request_id, payload))
            .timeout(FORWARD_TIMEOUT)
            .send()
            .await?;

        let status = response.status().as_u16();
        let raw = response.bytes().await?;
        let (body, receipt) = parse_reply(&raw);
        Ok(ForwardReply { status, body, receipt })
    }
}

fn envelope(request_id: &str, payload: &[u8]) -> json::Value {
    json!({
        "requestId": request_id,
        "request": to_hex_prefixed(payload),
    })
}

/// Interpret a container reply.
///
/// - JSON with a `result` hex string: `result` decodes to the on-chain bytes; the object is the
///   receipt when it also carries `steps`.
/// - JSON without `result`: the whole object is the receipt and the raw body goes on chain.
/// - Anything else: raw passthrough, no receipt.
fn parse_reply(raw: &[u8]) -> (Vec<u8>, Option<json::Value>) {
    let value = match json::from_slice::<json::Value>(raw) {
        Ok(value) if value.is_object() => value,
        _ => return (raw.to_vec(), None),
    };

    match value.get("result").and_then(json::Value::as_str) {
        Some(result_hex) => {
            let body = match from_hex_prefixed(result_hex) {
                Ok(body) => body,
                Err(_) => {
                    warn!(target: LOG_TARGET, "Container result field was not valid hex, forwarding raw body");
                    raw.to_vec()
                },
            };
            let receipt = if value.get("steps").is_some() { Some(value) } else { None };
            (body, receipt)
        },
        None => (raw.to_vec(), Some(value)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn envelope_wraps_payload_as_hex() {
        let value = envelope("12", &[0x77, 0x16, 0x02]);
        assert_eq!(value["requestId"], "12");
        assert_eq!(value["request"], "0x771602");
    }

    #[test]
    fn reply_with_result_decodes_hex_body() {
        let raw = br#"{"result":"0x00e2"}"#;
        let (body, receipt) = parse_reply(raw);
        assert_eq!(body, vec![0x00, 0xe2]);
        // No steps, so nothing to upload.
        assert!(receipt.is_none());
    }

    #[test]
    fn reply_with_result_and_steps_keeps_receipt() {
        let raw = br#"{"result":"0x00e2","steps":[{"tool":"search"}]}"#;
        let (body, receipt) = parse_reply(raw);
        assert_eq!(body, vec![0x00, 0xe2]);
        let receipt = receipt.unwrap();
        assert_eq!(receipt["steps"][0]["tool"], "search");
    }

    #[test]
    fn json_without_result_is_a_receipt_with_raw_passthrough() {
        let raw = br#"{"steps":[],"note":"no result field"}"#;
        let (body, receipt) = parse_reply(raw);
        assert_eq!(body, raw.to_vec());
        assert!(receipt.is_some());
    }

    #[test]
    fn non_json_is_raw_passthrough() {
        let raw = b"\x01\x02\x03 not json";
        let (body, receipt) = parse_reply(raw);
        assert_eq!(body, raw.to_vec());
        assert!(receipt.is_none());
    }

    #[test]
    fn bare_json_scalars_are_raw_passthrough() {
        let raw = b"42";
        let (body, receipt) = parse_reply(raw);
        assert_eq!(body, raw.to_vec());
        assert!(receipt.is_none());
    }

    #[test]
    fn invalid_result_hex_falls_back_to_raw() {
        let raw = br#"{"result":"0xzz"}"#;
        let (body, receipt) = parse_reply(raw);
        assert_eq!(body, raw.to_vec());
        assert!(receipt.is_none());
    }
}
