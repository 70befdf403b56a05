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

use std::collections::HashMap;

use once_cell::sync::Lazy;
use somnia_metrics::{IntCounter, IntGauge, Registry};

use crate::helpers::encode_address;

/// Install a registry carrying this node's identity labels. Must run before any meter below is
/// first touched.
pub fn install(node_address: &ethabi::ethereum_types::H160) {
    let mut labels = HashMap::with_capacity(2);
    labels.insert("app".to_string(), "somnia_validator_node".to_string());
    labels.insert("node_address".to_string(), encode_address(node_address));
    let registry = Registry::new_custom(Some("somnia".to_string()), Some(labels)).unwrap();
    somnia_metrics::set_default_registry(registry);
}

pub fn events_seen() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::listener::events_seen",
            "Number of RequestCreated logs decoded from the subscription",
        )
        .unwrap()
    });

    &METER
}

pub fn events_malformed() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::listener::events_malformed",
            "Number of subscription logs that failed to decode",
        )
        .unwrap()
    });

    &METER
}

pub fn events_filtered() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::listener::events_filtered",
            "Number of events dropped because this node was not in the subcommittee",
        )
        .unwrap()
    });

    &METER
}

pub fn events_dropped() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::listener::events_dropped",
            "Number of elected events dropped because the worker queue was full",
        )
        .unwrap()
    });

    &METER
}

pub fn requests_received() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::workers::requests_received",
            "Number of requests enqueued for the worker pool",
        )
        .unwrap()
    });

    &METER
}

pub fn requests_processed() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::workers::requests_processed",
            "Number of requests taken through the worker pipeline",
        )
        .unwrap()
    });

    &METER
}

pub fn queue_depth() -> &'static IntGauge {
    static METER: Lazy<IntGauge> = Lazy::new(|| {
        somnia_metrics::register_int_gauge(
            "validator_node::workers::queue_depth",
            "Requests currently waiting in the worker queue",
        )
        .unwrap()
    });

    &METER
}

pub fn forward_failures() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::forwarder::failures",
            "Number of container round trips that failed or answered with an error status",
        )
        .unwrap()
    });

    &METER
}

pub fn submits_sent() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::chain::submits_sent",
            "Number of submitResponse transactions confirmed on chain",
        )
        .unwrap()
    });

    &METER
}

pub fn submits_reverted() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::chain::submits_reverted",
            "Number of submitResponse transactions that reverted",
        )
        .unwrap()
    });

    &METER
}

pub fn heartbeats_sent() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::chain::heartbeats_sent",
            "Number of confirmed committee heartbeats",
        )
        .unwrap()
    });

    &METER
}

pub fn containers_started() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::containers::started",
            "Number of agent containers started",
        )
        .unwrap()
    });

    &METER
}

pub fn containers_stopped() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::containers::stopped",
            "Number of agent containers stopped on version rollover",
        )
        .unwrap()
    });

    &METER
}

pub fn containers_running() -> &'static IntGauge {
    static METER: Lazy<IntGauge> = Lazy::new(|| {
        somnia_metrics::register_int_gauge(
            "validator_node::containers::running",
            "Agent containers currently managed by this node",
        )
        .unwrap()
    });

    &METER
}

pub fn image_downloads() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::images::downloads",
            "Number of agent image tars downloaded",
        )
        .unwrap()
    });

    &METER
}

pub fn receipts_uploaded() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::receipts::uploaded",
            "Number of receipts accepted by the receipt store",
        )
        .unwrap()
    });

    &METER
}

pub fn receipt_upload_failures() -> &'static IntCounter {
    static METER: Lazy<IntCounter> = Lazy::new(|| {
        somnia_metrics::register_int_counter(
            "validator_node::receipts::upload_failures",
            "Number of receipt uploads that failed",
        )
        .unwrap()
    });

    &METER
}
