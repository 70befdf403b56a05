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

//! The admin HTTP surface: health, prometheus scrape and build info.

use std::net::SocketAddr;

use json::json;
use log::*;
use serde_json as json;
use somnia_shutdown::ShutdownSignal;
use warp::{http::StatusCode, Filter};

const LOG_TARGET: &str = "somnia::validator_node::admin";

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn serve(bind_address: SocketAddr, mut shutdown: ShutdownSignal) {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "healthy", "version": APP_VERSION })));

    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            let (body, status) = match somnia_metrics::render() {
                Ok(body) => (body, StatusCode::OK),
                Err(err) => (err.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
            };
            warp::reply::with_header(
                warp::reply::with_status(body, status),
                "content-type",
                "text/plain; version=0.0.4",
            )
        });

    let version = warp::path("version")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "package": env!("CARGO_PKG_NAME"),
                "version": APP_VERSION,
            }))
        });

    let routes = health.or(metrics).or(version);
    let server = warp::serve(routes).try_bind_with_graceful_shutdown(bind_address, async move {
        shutdown.wait().await;
    });
    match server {
        Ok((addr, serving)) => {
            info!(target: LOG_TARGET, "Admin server listening on {}", addr);
            serving.await;
            info!(target: LOG_TARGET, "Admin server stopped");
        },
        Err(err) => error!(
            target: LOG_TARGET,
            "Admin server failed to bind {}: {}", bind_address, err
        ),
    }
}
