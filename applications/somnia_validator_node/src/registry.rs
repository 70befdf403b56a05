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

//! A TTL cache in front of the agent registry contract.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use ethabi::ethereum_types::U256;
use log::*;

use crate::contracts::{Agent, AgentRegistryContract, ContractError};

const LOG_TARGET: &str = "somnia::validator_node::registry";

const AGENT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    agent: Agent,
    fetched_at: Instant,
}

/// Read-mostly agent lookups. Fresh entries are served under a read lock; misses fetch from
/// chain with no lock held and then insert. Lookup failures are never cached, so an
/// unregistered agent costs one RPC per request that names it.
pub struct AgentRegistryCache {
    registry: AgentRegistryContract,
    entries: RwLock<HashMap<U256, CacheEntry>>,
    ttl: Duration,
}

impl AgentRegistryCache {
    pub fn new(registry: AgentRegistryContract) -> Self {
        Self {
            registry,
            entries: RwLock::new(HashMap::new()),
            ttl: AGENT_CACHE_TTL,
        }
    }

    pub async fn lookup(&self, agent_id: U256) -> Result<Agent, ContractError> {
        if let Some(agent) = self.cached(agent_id) {
            return Ok(agent);
        }

        let agent = self.registry.get_agent(agent_id).await?;
        debug!(
            target: LOG_TARGET,
            "Fetched agent {} ({}) from the registry", agent_id, agent.container_image_url
        );
        self.insert(agent_id, agent.clone());
        Ok(agent)
    }

    fn cached(&self, agent_id: U256) -> Option<Agent> {
        let entries = self.entries.read().unwrap();
        entries
            .get(&agent_id)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.agent.clone())
    }

    fn insert(&self, agent_id: U256, agent: Agent) {
        self.entries.write().unwrap().insert(agent_id, CacheEntry {
            agent,
            fetched_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use ethabi::ethereum_types::H160;

    use super::*;
    use crate::rpc::SessionRpcClient;

    fn unreachable_cache(ttl: Duration) -> AgentRegistryCache {
        let rpc = Arc::new(SessionRpcClient::new(
            "http://127.0.0.1:1".to_string(),
            "00".repeat(32),
        ));
        let mut cache = AgentRegistryCache::new(AgentRegistryContract::new(rpc, H160::repeat_byte(0x01)));
        cache.ttl = ttl;
        cache
    }

    fn test_agent(id: u64) -> Agent {
        Agent {
            id: U256::from(id),
            owner: H160::repeat_byte(0x11),
            metadata_url: "https://example.com/meta.json".to_string(),
            container_image_url: "https://example.com/agent.tar".to_string(),
            cost: U256::from(5u64),
        }
    }

    #[test]
    fn fresh_entries_are_served_from_cache() {
        let cache = unreachable_cache(Duration::from_secs(60));
        cache.insert(U256::from(3u64), test_agent(3));
        let agent = cache.cached(U256::from(3u64)).unwrap();
        assert_eq!(agent.id, U256::from(3u64));
    }

    #[test]
    fn stale_entries_are_not_served() {
        let cache = unreachable_cache(Duration::from_millis(0));
        cache.insert(U256::from(3u64), test_agent(3));
        assert!(cache.cached(U256::from(3u64)).is_none());
    }

    #[test]
    fn unknown_ids_miss() {
        let cache = unreachable_cache(Duration::from_secs(60));
        assert!(cache.cached(U256::from(9u64)).is_none());
    }

    #[tokio::test]
    async fn lookup_miss_surfaces_fetch_errors() {
        // The backing RPC endpoint is unreachable, so a miss must fail rather than serve
        // anything stale.
        let cache = unreachable_cache(Duration::from_secs(60));
        assert!(cache.lookup(U256::from(1u64)).await.is_err());
    }
}
