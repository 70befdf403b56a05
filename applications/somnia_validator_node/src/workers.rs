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

//! The request worker pool: resolve agent, forward to its container, submit the vote, upload
//! the receipt. Workers are independent; requests are processed out of order.

use std::sync::Arc;

use ethabi::ethereum_types::U256;
use json::json;
use log::*;
use serde_json as json;
use somnia_shutdown::ShutdownSignal;
use tokio::{sync::{mpsc, Mutex}, task, task::JoinHandle};

use crate::{
    contracts::{abi::decode_revert_reason, RequestEvent, SomniaAgentsContract},
    forwarder::AgentForwarder,
    helpers::to_hex_prefixed,
    receipts::ReceiptUploader,
    registry::AgentRegistryCache,
};

const LOG_TARGET: &str = "somnia::validator_node::workers";

/// The receipt-CID slot of `submitResponse`; the contract does not index receipts off-chain yet.
fn receipt_cid_placeholder() -> U256 {
    U256::zero()
}

/// Everything a worker needs to take a request from event to submitted vote.
pub struct RequestContext {
    pub registry: Arc<AgentRegistryCache>,
    pub forwarder: Arc<AgentForwarder>,
    pub somnia_agents: SomniaAgentsContract,
    pub receipts: Arc<ReceiptUploader>,
}

/// Spawn `count` workers draining the shared queue until shutdown or queue closure.
pub fn spawn_workers(
    count: usize,
    context: Arc<RequestContext>,
    receiver: mpsc::Receiver<RequestEvent>,
    shutdown: ShutdownSignal,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..count)
        .map(|worker_id| {
            task::spawn(worker_loop(
                worker_id,
                context.clone(),
                receiver.clone(),
                shutdown.clone(),
            ))
        })
        .collect()
}

async fn worker_loop(
    worker_id: usize,
    context: Arc<RequestContext>,
    receiver: Arc<Mutex<mpsc::Receiver<RequestEvent>>>,
    mut shutdown: ShutdownSignal,
) {
    debug!(target: LOG_TARGET, "Worker {} started", worker_id);
    loop {
        // Only the receive is serialized; processing runs with the lock released.
        let event = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = shutdown.wait() => None,
                event = receiver.recv() => event,
            }
        };
        let event = match event {
            Some(event) => event,
            None => break,
        };
        process_request(&context, event).await;
        crate::metrics::requests_processed().inc();
    }
    debug!(target: LOG_TARGET, "Worker {} stopped", worker_id);
}

/// Take one request through the full pipeline. Every failure mode is terminal for the request
/// and logged; other subcommittee members vote independently.
async fn process_request(context: &RequestContext, event: RequestEvent) {
    let request_id = event.request_id;

    let agent = match context.registry.lookup(event.agent_id).await {
        Ok(agent) => agent,
        Err(err) => {
            error!(
                target: LOG_TARGET,
                "Dropping request {}: agent {} lookup failed: {}", request_id, event.agent_id, err
            );
            return;
        },
    };

    let reply = match context
        .forwarder
        .forward(&agent.container_image_url, &request_id.to_string(), &event.payload)
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            crate::metrics::forward_failures().inc();
            error!(
                target: LOG_TARGET,
                "Dropping request {}: forwarding to {} failed: {}", request_id, agent.container_image_url, err
            );
            return;
        },
    };
    if reply.status >= 400 {
        // The reply bytes are still this node's vote; the status only flags the container.
        crate::metrics::forward_failures().inc();
        warn!(
            target: LOG_TARGET,
            "Container for agent {} answered request {} with status {}", event.agent_id, request_id, reply.status
        );
    }

    if let Some(mut receipt) = reply.receipt {
        if let Some(object) = receipt.as_object_mut() {
            object.insert("agentId".to_string(), json!(event.agent_id.to_string()));
            object.insert("request".to_string(), json!(to_hex_prefixed(&event.payload)));
        }
        context.receipts.upload(request_id, receipt);
    }

    submit_response(context, &event, &reply.body).await;
}

async fn submit_response(context: &RequestContext, event: &RequestEvent, body: &[u8]) {
    let request_id = event.request_id;
    let receipt = match context
        .somnia_agents
        .submit_response(request_id, body, receipt_cid_placeholder(), event.max_cost)
        .await
    {
        Ok(receipt) => receipt,
        Err(err) => {
            error!(
                target: LOG_TARGET,
                "Submitting response for request {} failed: {}", request_id, err
            );
            return;
        },
    };

    if receipt.is_success() {
        crate::metrics::submits_sent().inc();
        info!(
            target: LOG_TARGET,
            "Submitted response for request {} ({} bytes) in tx {}",
            request_id,
            body.len(),
            receipt.transaction_hash.as_deref().unwrap_or("unknown")
        );
        return;
    }

    // Reverted. Replay the identical call at the failed block to decode the reason, then move
    // on: a revert usually means another validator finalized first or the subcommittee changed.
    crate::metrics::submits_reverted().inc();
    let reason = match context
        .somnia_agents
        .replay_submit_response(
            request_id,
            body,
            receipt_cid_placeholder(),
            event.max_cost,
            receipt.block_number(),
        )
        .await
    {
        Ok(Some(data)) => decode_revert_reason(&data),
        Ok(None) => "unknown".to_string(),
        Err(err) => {
            warn!(
                target: LOG_TARGET,
                "Replaying reverted submit for request {} failed: {}", request_id, err
            );
            "unknown".to_string()
        },
    };
    error!(
        target: LOG_TARGET,
        "submitResponse for request {} reverted in tx {} at block {:?}: revertReason=\"{}\"",
        request_id,
        receipt.transaction_hash.as_deref().unwrap_or("unknown"),
        receipt.block_number(),
        reason
    );
}
