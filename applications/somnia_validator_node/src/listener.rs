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

//! Subscribes to `RequestCreated` logs over WebSocket and feeds the worker queue.
//!
//! The subscription reconnects forever (5 s apart) until shutdown. Redelivered logs after a
//! reconnect are absorbed by an LRU of `(txHash, requestId)` pairs, and events whose
//! subcommittee does not elect this node are dropped before they reach the queue.

use std::{num::NonZeroUsize, sync::Mutex, time::Duration};

use ethabi::ethereum_types::{H160, H256, U256};
use futures::{SinkExt, StreamExt};
use json::json;
use log::*;
use lru::LruCache;
use serde::Deserialize;
use serde_json as json;
use somnia_shutdown::ShutdownSignal;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{
    contracts::{decode_request_created, request_created_topic, RequestEvent},
    helpers::{encode_address, from_hex_prefixed, parse_h256, to_hex_prefixed},
};

const LOG_TARGET: &str = "somnia::validator_node::listener";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Backpressure beats unbounded queueing: a full queue drops the request and another
/// subcommittee member picks it up.
pub const QUEUE_CAPACITY: usize = 10_000;
const DEDUP_CAPACITY: usize = 10_000;

#[derive(Debug, Error)]
enum ListenerError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Subscription stream closed by the server")]
    ConnectionClosed,
}

/// Rewrite the configured HTTP RPC endpoint into its WebSocket variant.
pub fn derive_ws_url(rpc_url: &str) -> String {
    let ws = if let Some(rest) = rpc_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = rpc_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        rpc_url.to_string()
    };
    format!("{}/ws", ws.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogMessage {
    topics: Vec<String>,
    data: String,
    transaction_hash: String,
}

pub struct EventListener {
    ws_url: String,
    contract_address: H160,
    node_address: H160,
    sender: mpsc::Sender<RequestEvent>,
    processed: Mutex<LruCache<(H256, U256), ()>>,
}

impl EventListener {
    pub fn new(
        rpc_url: &str,
        contract_address: H160,
        node_address: H160,
        sender: mpsc::Sender<RequestEvent>,
    ) -> Self {
        Self {
            ws_url: derive_ws_url(rpc_url),
            contract_address,
            node_address,
            sender,
            processed: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEDUP_CAPACITY).expect("dedup capacity is non-zero"),
            )),
        }
    }

    /// Subscribe and dispatch until shutdown. Connection failures and server-side closes retry
    /// forever with a fixed delay.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        loop {
            match self.run_subscription(&mut shutdown).await {
                Ok(()) => break,
                Err(err) => info!(
                    target: LOG_TARGET,
                    "Subscription dropped: {}; reconnecting in {:?}", err, RECONNECT_DELAY
                ),
            }
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {},
                _ = shutdown.wait() => break,
            }
        }
        debug!(target: LOG_TARGET, "Event listener stopped");
    }

    /// One subscription session: connect, subscribe, pump messages. `Ok(())` means shutdown.
    async fn run_subscription(&self, shutdown: &mut ShutdownSignal) -> Result<(), ListenerError> {
        let (mut ws, _) = tokio::select! {
            connected = connect_async(self.ws_url.as_str()) => connected?,
            _ = shutdown.wait() => return Ok(()),
        };

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["logs", {
                "address": [encode_address(&self.contract_address)],
                "topics": [[to_hex_prefixed(request_created_topic().as_bytes())]],
            }],
        });
        ws.send(Message::Text(subscribe.to_string())).await?;
        info!(
            target: LOG_TARGET,
            "Subscribed to RequestCreated logs of {} via {}",
            encode_address(&self.contract_address),
            self.ws_url
        );

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                },
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Ping(payload))) => ws.send(Message::Pong(payload)).await?,
                    Some(Ok(Message::Close(_))) | None => return Err(ListenerError::ConnectionClosed),
                    Some(Ok(_)) => {},
                    Some(Err(err)) => return Err(err.into()),
                },
            }
        }
    }

    /// Handle one text frame from the subscription. Malformed frames are logged and skipped.
    fn handle_frame(&self, text: &str) {
        let frame: json::Value = match json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(target: LOG_TARGET, "Discarding unparseable frame: {}", err);
                return;
            },
        };

        // The confirmation frame carries our subscription id under `result`.
        if frame.get("method").and_then(json::Value::as_str) != Some("eth_subscription") {
            if let Some(id) = frame.get("result").and_then(json::Value::as_str) {
                debug!(target: LOG_TARGET, "Subscription confirmed with id {}", id);
            }
            return;
        }

        let log = match frame.pointer("/params/result") {
            Some(log) => log.clone(),
            None => {
                warn!(target: LOG_TARGET, "Subscription notification without a log body");
                return;
            },
        };

        match self.decode_log(log) {
            Ok(event) => self.dispatch(event),
            Err(err) => {
                crate::metrics::events_malformed().inc();
                warn!(target: LOG_TARGET, "Skipping malformed log: {}", err);
            },
        }
    }

    fn decode_log(&self, log: json::Value) -> Result<RequestEvent, String> {
        let raw: RawLogMessage = json::from_value(log).map_err(|e| e.to_string())?;
        let tx_hash = parse_h256(&raw.transaction_hash).map_err(|e| e.to_string())?;
        let topics = raw
            .topics
            .iter()
            .map(|topic| parse_h256(topic))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        let data = from_hex_prefixed(&raw.data).map_err(|e| e.to_string())?;
        decode_request_created(tx_hash, topics, data).map_err(|e| e.to_string())
    }

    fn dispatch(&self, event: RequestEvent) {
        crate::metrics::events_seen().inc();

        if self.already_processed(&event) {
            debug!(
                target: LOG_TARGET,
                "Request {} in tx {} was already dispatched, skipping redelivery",
                event.request_id,
                event.tx_hash
            );
            return;
        }

        if !event.is_in_subcommittee(&self.node_address) {
            crate::metrics::events_filtered().inc();
            debug!(
                target: LOG_TARGET,
                "Not elected for request {}, dropping", event.request_id
            );
            return;
        }

        match self.sender.try_send(event) {
            Ok(()) => {
                crate::metrics::requests_received().inc();
                crate::metrics::queue_depth().set((QUEUE_CAPACITY - self.sender.capacity()) as i64);
            },
            Err(mpsc::error::TrySendError::Full(event)) => {
                crate::metrics::events_dropped().inc();
                warn!(
                    target: LOG_TARGET,
                    "Worker queue is full, dropping request {}; other subcommittee members will cover it",
                    event.request_id
                );
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(target: LOG_TARGET, "Worker queue is closed, dropping event");
            },
        }
    }

    /// Check-and-mark in one step so a redelivered log can never be dispatched twice.
    fn already_processed(&self, event: &RequestEvent) -> bool {
        let mut processed = self.processed.lock().unwrap();
        processed.put(event.dedup_key(), ()).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::contracts::events::test::encode_request_created;

    fn listener(node: H160, capacity: usize) -> (EventListener, mpsc::Receiver<RequestEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let listener = EventListener::new(
            "https://rpc.example.com",
            H160::repeat_byte(0xc0),
            node,
            sender,
        );
        (listener, receiver)
    }

    fn notification_frame(request_id: u64, subcommittee: &[H160], tx_byte: u8) -> String {
        let (topics, data) = encode_request_created(
            U256::from(request_id),
            U256::from(3u64),
            H160::repeat_byte(0x11),
            U256::from(9u64),
            &[0xaa, 0xbb],
            subcommittee,
        );
        json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0x1",
                "result": {
                    "topics": topics.iter().map(|t| to_hex_prefixed(t.as_bytes())).collect::<Vec<_>>(),
                    "data": to_hex_prefixed(&data),
                    "transactionHash": to_hex_prefixed(H256::repeat_byte(tx_byte).as_bytes()),
                },
            },
        })
        .to_string()
    }

    #[test]
    fn ws_url_derivation() {
        assert_eq!(derive_ws_url("https://rpc.example.com"), "wss://rpc.example.com/ws");
        assert_eq!(derive_ws_url("http://127.0.0.1:8545"), "ws://127.0.0.1:8545/ws");
        assert_eq!(derive_ws_url("https://rpc.example.com/"), "wss://rpc.example.com/ws");
    }

    #[test]
    fn elected_events_reach_the_queue() {
        let node = H160::repeat_byte(0x22);
        let (listener, mut receiver) = listener(node, 16);
        listener.handle_frame(&notification_frame(12, &[node], 0x01));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.request_id, U256::from(12u64));
        assert_eq!(event.payload, vec![0xaa, 0xbb]);
    }

    #[test]
    fn unelected_events_are_filtered() {
        let node = H160::repeat_byte(0x22);
        let (listener, mut receiver) = listener(node, 16);
        listener.handle_frame(&notification_frame(15, &[H160::repeat_byte(0x33)], 0x01));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn redeliveries_are_deduplicated() {
        let node = H160::repeat_byte(0x22);
        let (listener, mut receiver) = listener(node, 16);
        let frame = notification_frame(20, &[node], 0x01);
        listener.handle_frame(&frame);
        listener.handle_frame(&frame);

        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());

        // The same request id in a different transaction is a distinct delivery.
        listener.handle_frame(&notification_frame(20, &[node], 0x02));
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn full_queue_drops_events() {
        let node = H160::repeat_byte(0x22);
        let (listener, mut receiver) = listener(node, 1);
        listener.handle_frame(&notification_frame(1, &[node], 0x01));
        listener.handle_frame(&notification_frame(2, &[node], 0x02));

        assert_eq!(receiver.try_recv().unwrap().request_id, U256::one());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn malformed_frames_are_skipped() {
        let node = H160::repeat_byte(0x22);
        let (listener, mut receiver) = listener(node, 16);
        listener.handle_frame("not json at all");
        listener.handle_frame(r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{}}"#);
        listener.handle_frame(
            r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"result":{"topics":["0x12"],"data":"0x","transactionHash":"0x00"}}}"#,
        );
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn confirmation_frames_are_ignored() {
        let node = H160::repeat_byte(0x22);
        let (listener, mut receiver) = listener(node, 16);
        listener.handle_frame(r#"{"jsonrpc":"2.0","id":1,"result":"0xsub1"}"#);
        assert!(receiver.try_recv().is_err());
    }
}
