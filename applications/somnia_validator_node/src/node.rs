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

//! Wires the components together and owns the shutdown choreography.

use std::sync::Arc;

use log::*;
use somnia_shutdown::Shutdown;
use tokio::{signal, sync::mpsc, task};

use crate::{
    admin,
    config::ValidatorNodeConfig,
    contracts::{AgentRegistryContract, CommitteeContract, SomniaAgentsContract},
    docker::{ensure_sandbox_network, ContainerManager},
    exit_codes::{ExitCode, ExitError},
    forwarder::AgentForwarder,
    heartbeat::CommitteeHeartbeat,
    helpers::{encode_address, parse_address},
    listener::{EventListener, QUEUE_CAPACITY},
    metrics,
    receipts::ReceiptUploader,
    registry::AgentRegistryCache,
    rpc::SessionRpcClient,
    workers::{spawn_workers, RequestContext},
};

const LOG_TARGET: &str = "somnia::validator_node::node";

pub async fn run_node(config: ValidatorNodeConfig) -> Result<(), ExitError> {
    let mut shutdown = Shutdown::new();
    let mut heartbeat_shutdown = Shutdown::new();

    // Session transport. Resolving the wallet address validates both the seed and the endpoint.
    let rpc = Arc::new(SessionRpcClient::new(
        config.rpc_url.clone(),
        config.session_seed.clone(),
    ));
    let node_address = rpc
        .get_session_address()
        .await
        .map_err(|e| ExitError::new(ExitCode::RpcError, e))?;
    info!(
        target: LOG_TARGET,
        "Session RPC signs for this node as {}", encode_address(&node_address)
    );
    metrics::install(&node_address);

    // Resolve the contract trio from the single configured root address.
    let contract_address = parse_address(&config.somnia_agents_contract)
        .map_err(|e| ExitError::new(ExitCode::ConfigError, e))?;
    let somnia_agents = SomniaAgentsContract::new(rpc.clone(), contract_address);
    let registry_address = somnia_agents
        .agent_registry()
        .await
        .map_err(|e| ExitError::new(ExitCode::ContractError, e))?;
    let committee_address = somnia_agents
        .committee()
        .await
        .map_err(|e| ExitError::new(ExitCode::ContractError, e))?;
    info!(
        target: LOG_TARGET,
        "Resolved agentRegistry={} committee={}",
        encode_address(&registry_address),
        encode_address(&committee_address)
    );
    let registry_contract = AgentRegistryContract::new(rpc.clone(), registry_address);
    let committee = CommitteeContract::new(rpc.clone(), committee_address);

    match committee.get_active_members().await {
        Ok(members) => info!(target: LOG_TARGET, "Committee has {} active members", members.len()),
        Err(err) => warn!(target: LOG_TARGET, "Could not read active committee members: {}", err),
    }

    // Container runtime. Connecting validates the docker socket before any request arrives.
    let containers = Arc::new(
        ContainerManager::connect(&config).map_err(|e| ExitError::new(ExitCode::DockerError, e))?,
    );
    if let Some(sandbox) = &config.sandbox_network {
        ensure_sandbox_network(containers.docker(), sandbox)
            .await
            .map_err(|e| ExitError::new(ExitCode::DockerError, e))?;
    }

    let heartbeat = CommitteeHeartbeat::new(committee, config.committee_interval());
    let heartbeat_handle = task::spawn(heartbeat.run(heartbeat_shutdown.to_signal()));

    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    let listener = EventListener::new(&config.rpc_url, contract_address, node_address, sender);
    let listener_handle = task::spawn(listener.run(shutdown.to_signal()));

    let receipts = Arc::new(ReceiptUploader::new(config.receipts_url().map(str::to_string)));
    if !receipts.is_enabled() {
        info!(target: LOG_TARGET, "Receipt uploads are disabled");
    }
    let context = Arc::new(RequestContext {
        registry: Arc::new(AgentRegistryCache::new(registry_contract)),
        forwarder: Arc::new(AgentForwarder::new(containers.clone())),
        somnia_agents,
        receipts,
    });
    let worker_handles = spawn_workers(config.max_workers, context, receiver, shutdown.to_signal());

    // The admin surface comes up last so /health cannot answer before the node is subscribed.
    if let Some(bind_address) = config.admin_bind_address {
        task::spawn(admin::serve(bind_address, shutdown.to_signal()));
    }

    println!("Validator node started!");
    info!(
        target: LOG_TARGET,
        "Watching {} with {} workers", encode_address(&contract_address), config.max_workers
    );

    wait_for_exit_signal().await?;

    // Teardown order matters: leave the committee while the rest still runs, then stop taking
    // work and drain, then tear the containers down.
    info!(target: LOG_TARGET, "Shutting down");
    heartbeat_shutdown.trigger();
    let _ = heartbeat_handle.await;

    shutdown.trigger();
    let _ = listener_handle.await;
    for handle in worker_handles {
        let _ = handle.await;
    }

    containers.stop_all().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_exit_signal() -> Result<(), ExitError> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| ExitError::new(ExitCode::UnknownError, e))?;
    tokio::select! {
        _ = signal::ctrl_c() => info!(target: LOG_TARGET, "SIGINT received"),
        _ = sigterm.recv() => info!(target: LOG_TARGET, "SIGTERM received"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_exit_signal() -> Result<(), ExitError> {
    signal::ctrl_c()
        .await
        .map_err(|e| ExitError::new(ExitCode::UnknownError, e))?;
    info!(target: LOG_TARGET, "Interrupt received");
    Ok(())
}
