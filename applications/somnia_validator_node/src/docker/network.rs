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

//! Sandbox bridge network for agent containers.

use bollard::{
    models::{Ipam, IpamConfig},
    network::{CreateNetworkOptions, InspectNetworkOptions},
    Docker,
};
use log::*;

use super::error::ContainerError;
use crate::config::SandboxNetworkConfig;

const LOG_TARGET: &str = "somnia::validator_node::sandbox_network";

pub async fn network_exists(docker: &Docker, network_name: &str) -> bool {
    let options = InspectNetworkOptions {
        verbose: false,
        scope: "local",
    };
    docker.inspect_network(network_name, Some(options)).await.is_ok()
}

/// Create the sandbox network when it does not exist yet. Agent containers are attached to it at
/// create time.
pub async fn ensure_sandbox_network(docker: &Docker, config: &SandboxNetworkConfig) -> Result<(), ContainerError> {
    if network_exists(docker, &config.name).await {
        info!(target: LOG_TARGET, "Sandbox network {} already exists", config.name);
        return Ok(());
    }

    let ipam = if config.subnet.is_some() || config.gateway.is_some() {
        Ipam {
            driver: Some("default".to_string()),
            config: Some(vec![IpamConfig {
                subnet: config.subnet.clone(),
                gateway: config.gateway.clone(),
                ..Default::default()
            }]),
            ..Default::default()
        }
    } else {
        Ipam::default()
    };

    let options = CreateNetworkOptions {
        name: config.name.as_str(),
        check_duplicate: true,
        driver: "bridge",
        internal: false,
        attachable: false,
        ingress: false,
        ipam,
        enable_ipv6: false,
        options: Default::default(),
        labels: Default::default(),
    };
    let created = docker.create_network(options).await?;
    if let Some(id) = created.id {
        info!(target: LOG_TARGET, "Sandbox network {} (id:{}) created", config.name, id);
    }
    if let Some(warning) = created.warning {
        warn!(
            target: LOG_TARGET,
            "Creating sandbox network {} had warnings: {}", config.name, warning
        );
    }
    Ok(())
}
