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

//! Best-effort delivery of container receipts to the external receipt store.

use ethabi::ethereum_types::U256;
use log::*;
use serde_json as json;

const LOG_TARGET: &str = "somnia::validator_node::receipts";

pub struct ReceiptUploader {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl ReceiptUploader {
    /// `base_url` of the receipt store; `None` disables uploads entirely.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: base_url.map(|base| endpoint(&base)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Post the receipt keyed by the request id. Fire-and-forget: the POST runs on its own task
    /// and failures are logged, never retried.
    pub fn upload(&self, request_id: U256, receipt: json::Value) {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => return,
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            post(client, endpoint, request_id, receipt).await;
        });
    }
}

async fn post(client: reqwest::Client, endpoint: String, request_id: U256, receipt: json::Value) {
    let result = client
        .post(&endpoint)
        .query(&[("requestId", request_id.to_string())])
        .json(&receipt)
        .send()
        .await;
    match result {
        Ok(response) if response.status().is_success() => {
            crate::metrics::receipts_uploaded().inc();
            debug!(target: LOG_TARGET, "Uploaded receipt for request {}", request_id);
        },
        Ok(response) => {
            crate::metrics::receipt_upload_failures().inc();
            warn!(
                target: LOG_TARGET,
                "Receipt store answered {} for request {}",
                response.status(),
                request_id
            );
        },
        Err(err) => {
            crate::metrics::receipt_upload_failures().inc();
            warn!(
                target: LOG_TARGET,
                "Receipt upload for request {} failed: {}", request_id, err
            );
        },
    }
}

fn endpoint(base: &str) -> String {
    format!("{}/agent-receipts", base.trim_end_matches('/'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoint_handles_trailing_slashes() {
        assert_eq!(endpoint("https://receipts.example.com"), "https://receipts.example.com/agent-receipts");
        assert_eq!(
            endpoint("https://receipts.example.com/"),
            "https://receipts.example.com/agent-receipts"
        );
    }

    #[test]
    fn disabled_without_base_url() {
        let uploader = ReceiptUploader::new(None);
        assert!(!uploader.is_enabled());
        let uploader = ReceiptUploader::new(Some("https://receipts.example.com".to_string()));
        assert!(uploader.is_enabled());
    }

    #[test]
    fn request_ids_are_decimal() {
        // The store is keyed by the exact decimal request id from the event.
        let id = U256::from(1_234_567_890u64);
        assert_eq!(id.to_string(), "1234567890");
    }
}
