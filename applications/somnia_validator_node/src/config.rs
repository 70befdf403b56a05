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

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    cli::Cli,
    exit_codes::{ExitCode, ExitError},
};

/// Validator node configuration. Populated from an optional TOML file, then overridden by
/// CLI flags and their backing environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorNodeConfig {
    /// HTTPS JSON-RPC endpoint of the session RPC node. The WebSocket endpoint for event
    /// subscriptions is derived from this URL.
    pub rpc_url: String,
    /// Address of the root SomniaAgents contract. The registry and committee contract
    /// addresses are resolved from it at startup.
    pub somnia_agents_contract: String,
    /// 32-byte hex secret identifying this node's wallet to the session RPC.
    pub session_seed: String,
    /// Base URL of the receipt store. Empty disables receipt uploads.
    pub receipts_url: String,
    /// Directory where downloaded agent image tars are cached.
    pub cache_dir: PathBuf,
    /// First host port handed out to agent containers. Allocation is monotonic from here.
    pub start_port: u16,
    /// Number of concurrent request workers.
    pub max_workers: usize,
    /// Seconds between committee membership heartbeats.
    pub committee_interval: u64,
    /// Optional container runtime name passed through to the container API (e.g. "runsc").
    pub container_runtime: Option<String>,
    /// Sandbox network for agent containers. Created on startup when missing.
    pub sandbox_network: Option<SandboxNetworkConfig>,
    /// Bind address of the admin HTTP server (health, metrics, version). Unset disables it.
    pub admin_bind_address: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxNetworkConfig {
    /// Name of the bridge network agent containers are attached to.
    pub name: String,
    /// Subnet in CIDR notation, e.g. "172.28.0.0/16".
    pub subnet: Option<String>,
    /// Gateway address within the subnet.
    pub gateway: Option<String>,
}

impl Default for SandboxNetworkConfig {
    fn default() -> Self {
        Self {
            name: "somnia_agents".to_string(),
            subnet: None,
            gateway: None,
        }
    }
}

impl Default for ValidatorNodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            somnia_agents_contract: String::new(),
            session_seed: String::new(),
            receipts_url: String::new(),
            cache_dir: PathBuf::from("data/agent_images"),
            start_port: 10000,
            max_workers: 20,
            committee_interval: 30,
            container_runtime: None,
            sandbox_network: None,
            admin_bind_address: None,
        }
    }
}

impl ValidatorNodeConfig {
    /// Load the configuration file (when given), then apply CLI/env overrides and validate the
    /// required fields.
    pub fn load_from(cli: &Cli) -> Result<Self, ExitError> {
        let mut builder = config::Config::builder();
        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::from(path.clone()));
        }
        let mut cfg: ValidatorNodeConfig = builder
            .build()
            .map_err(|e| ExitError::new(ExitCode::ConfigError, &e))?
            .try_deserialize()
            .map_err(|e| ExitError::new(ExitCode::ConfigError, &e))?;

        cli.apply_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn committee_interval(&self) -> Duration {
        Duration::from_secs(self.committee_interval)
    }

    pub fn receipts_url(&self) -> Option<&str> {
        if self.receipts_url.is_empty() {
            None
        } else {
            Some(self.receipts_url.as_str())
        }
    }

    fn validate(&self) -> Result<(), ExitError> {
        if self.rpc_url.is_empty() {
            return Err(ExitError::new(ExitCode::ConfigError, "rpc_url is not set"));
        }
        if self.somnia_agents_contract.is_empty() {
            return Err(ExitError::new(
                ExitCode::ConfigError,
                "somnia_agents_contract is not set",
            ));
        }
        if self.session_seed.is_empty() {
            return Err(ExitError::new(ExitCode::ConfigError, "session_seed is not set"));
        }
        if self.max_workers == 0 {
            return Err(ExitError::new(ExitCode::ConfigError, "max_workers must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    fn cli_with_required_flags() -> Cli {
        Cli::parse_from([
            "somnia_validator_node",
            "--rpc-url",
            "https://rpc.example.com",
            "--somnia-agents-contract",
            "0x00000000000000000000000000000000000000aa",
            "--session-seed",
            "aa".repeat(32).as_str(),
        ])
    }

    #[test]
    fn defaults_are_sane() {
        let config = ValidatorNodeConfig::default();
        assert_eq!(config.max_workers, 20);
        assert_eq!(config.committee_interval(), Duration::from_secs(30));
        assert_eq!(config.start_port, 10000);
        assert!(config.receipts_url().is_none());
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let cli = Cli::parse_from(["somnia_validator_node"]);
        let err = ValidatorNodeConfig::load_from(&cli).unwrap_err();
        assert_eq!(err.exit_code, ExitCode::ConfigError);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "rpc_url = \"https://file.example.com\"\nmax_workers = 5\nstart_port = 20000"
        )
        .unwrap();

        let mut cli = cli_with_required_flags();
        cli.config = Some(file.path().to_path_buf());
        let config = ValidatorNodeConfig::load_from(&cli).unwrap();

        assert_eq!(config.rpc_url, "https://rpc.example.com");
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.start_port, 20000);
    }

    #[test]
    fn file_only_configuration_loads() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            concat!(
                "rpc_url = \"https://file.example.com\"\n",
                "somnia_agents_contract = \"0x00000000000000000000000000000000000000bb\"\n",
                "session_seed = \"{}\"\n",
                "[sandbox_network]\n",
                "name = \"sandbox\"\n",
                "subnet = \"172.28.0.0/16\"\n"
            ),
            "bb".repeat(32)
        )
        .unwrap();

        let mut cli = Cli::parse_from(["somnia_validator_node"]);
        cli.config = Some(file.path().to_path_buf());
        let config = ValidatorNodeConfig::load_from(&cli).unwrap();

        assert_eq!(config.rpc_url, "https://file.example.com");
        let sandbox = config.sandbox_network.unwrap();
        assert_eq!(sandbox.name, "sandbox");
        assert_eq!(sandbox.subnet.as_deref(), Some("172.28.0.0/16"));
        assert!(sandbox.gateway.is_none());
    }
}
