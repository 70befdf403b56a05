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

//! Keeps the node eligible for subcommittee elections with periodic membership heartbeats.

use std::time::Duration;

use log::*;
use somnia_shutdown::ShutdownSignal;
use tokio::time;

use crate::contracts::CommitteeContract;

const LOG_TARGET: &str = "somnia::validator_node::heartbeat";

/// Bound on the farewell `leaveMembership` transaction during shutdown.
const LEAVE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CommitteeHeartbeat {
    committee: CommitteeContract,
    interval: Duration,
}

impl CommitteeHeartbeat {
    pub fn new(committee: CommitteeContract, interval: Duration) -> Self {
        Self { committee, interval }
    }

    /// Heartbeat until shutdown, then leave the committee so elections stop selecting this node
    /// while it is down. A failed heartbeat is retried on the next tick, without backoff.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!(
            target: LOG_TARGET,
            "Heartbeating committee membership every {:?}", self.interval
        );
        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.beat().await,
                _ = shutdown.wait() => break,
            }
        }
        self.leave().await;
    }

    async fn beat(&self) {
        match self.committee.heartbeat_membership().await {
            Ok(receipt) if receipt.is_success() => {
                crate::metrics::heartbeats_sent().inc();
                debug!(target: LOG_TARGET, "Membership heartbeat confirmed");
            },
            Ok(_) => warn!(
                target: LOG_TARGET,
                "Membership heartbeat reverted; retrying on the next tick"
            ),
            Err(err) => warn!(
                target: LOG_TARGET,
                "Membership heartbeat failed: {}; retrying on the next tick", err
            ),
        }
    }

    async fn leave(&self) {
        info!(target: LOG_TARGET, "Leaving the committee");
        match time::timeout(LEAVE_TIMEOUT, self.committee.leave_membership()).await {
            Ok(Ok(receipt)) if receipt.is_success() => info!(target: LOG_TARGET, "Left the committee"),
            Ok(Ok(_)) => warn!(target: LOG_TARGET, "leaveMembership reverted"),
            Ok(Err(err)) => warn!(target: LOG_TARGET, "leaveMembership failed: {}", err),
            Err(_) => warn!(
                target: LOG_TARGET,
                "leaveMembership did not confirm within {:?}", LEAVE_TIMEOUT
            ),
        }
    }
}
