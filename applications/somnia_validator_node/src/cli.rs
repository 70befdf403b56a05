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

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::config::ValidatorNodeConfig;

#[derive(Parser, Debug)]
#[clap(author, version, about = "The Somnia agent-execution validator node", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[clap(short, long, env = "SOMNIA_NODE_CONFIG")]
    pub config: Option<PathBuf>,
    /// HTTPS JSON-RPC endpoint of the session RPC node
    #[clap(long, env = "SOMNIA_RPC_URL")]
    pub rpc_url: Option<String>,
    /// Address of the root SomniaAgents contract
    #[clap(long, env = "SOMNIA_AGENTS_CONTRACT")]
    pub somnia_agents_contract: Option<String>,
    /// 32-byte hex session seed. Prefer the environment variable over the flag.
    #[clap(long, env = "SOMNIA_SESSION_SEED", hide_env_values = true)]
    pub session_seed: Option<String>,
    /// Base URL of the receipt store
    #[clap(long, env = "SOMNIA_RECEIPTS_URL")]
    pub receipts_url: Option<String>,
    /// Directory where downloaded agent image tars are cached
    #[clap(long)]
    pub cache_dir: Option<PathBuf>,
    /// First host port handed out to agent containers
    #[clap(long)]
    pub start_port: Option<u16>,
    /// Number of concurrent request workers
    #[clap(long)]
    pub max_workers: Option<usize>,
    /// Seconds between committee membership heartbeats
    #[clap(long)]
    pub committee_interval: Option<u64>,
    /// Container runtime name passed through to the container API
    #[clap(long)]
    pub container_runtime: Option<String>,
    /// Bind address of the admin HTTP server
    #[clap(long)]
    pub admin_bind_address: Option<SocketAddr>,
}

impl Cli {
    /// Apply the flags that were actually given on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ValidatorNodeConfig) {
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(contract) = &self.somnia_agents_contract {
            config.somnia_agents_contract = contract.clone();
        }
        if let Some(seed) = &self.session_seed {
            config.session_seed = seed.clone();
        }
        if let Some(receipts_url) = &self.receipts_url {
            config.receipts_url = receipts_url.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(start_port) = self.start_port {
            config.start_port = start_port;
        }
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }
        if let Some(committee_interval) = self.committee_interval {
            config.committee_interval = committee_interval;
        }
        if let Some(container_runtime) = &self.container_runtime {
            config.container_runtime = Some(container_runtime.clone());
        }
        if let Some(admin_bind_address) = self.admin_bind_address {
            config.admin_bind_address = Some(admin_bind_address);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overrides_apply_only_given_flags() {
        let cli = Cli::parse_from([
            "somnia_validator_node",
            "--max-workers",
            "4",
            "--container-runtime",
            "runsc",
        ]);
        let mut config = ValidatorNodeConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.max_workers, 4);
        assert_eq!(config.container_runtime.as_deref(), Some("runsc"));
        // Untouched fields keep their defaults.
        assert_eq!(config.start_port, 10000);
        assert!(config.rpc_url.is_empty());
    }
}
