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

//! Keeps at most one agent container running per image version, reusing live containers across
//! requests and rolling stale versions out when the image URL starts serving new content.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc,
        RwLock,
    },
    time::{Duration, Instant},
};

use bollard::{
    container::{Config, CreateContainerOptions, NetworkingConfig, RemoveContainerOptions, StopContainerOptions},
    image::ImportImageOptions,
    models::{EndpointSettings, HostConfig, PortBinding, PortMap},
    Docker,
};
use futures::{StreamExt, TryStreamExt};
use log::*;
use tokio::sync::Mutex;
use tokio_util::codec::{BytesCodec, FramedRead};

use super::{
    error::ContainerError,
    image_store::ImageStore,
    models::{container_name, ContainerId, ContainerRecord},
};
use crate::config::ValidatorNodeConfig;

const LOG_TARGET: &str = "somnia::validator_node::container_manager";

const CONTAINER_PORT: &str = "80/tcp";
const VERSION_LABEL: &str = "version";
const MANAGED_BY_LABEL: (&str, &str) = ("managed-by", "somnia-validator");
const READINESS_ATTEMPTS: u32 = 30;
const READINESS_INTERVAL: Duration = Duration::from_secs(1);
const STOP_TIMEOUT_SECS: i64 = 10;

pub struct ContainerManager {
    docker: Docker,
    images: ImageStore,
    runtime: Option<String>,
    sandbox_network: Option<String>,
    by_version: RwLock<HashMap<String, ContainerRecord>>,
    // Serializes start attempts per version hash; the outer map read path stays lock-free of it.
    start_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_port: AtomicU16,
    probe: reqwest::Client,
}

impl ContainerManager {
    /// Connect to the local container runtime. Fails fast when the docker socket is unreachable
    /// so startup can exit non-zero.
    pub fn connect(config: &ValidatorNodeConfig) -> Result<Self, ContainerError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            images: ImageStore::new(config.cache_dir.clone()),
            runtime: config.container_runtime.clone(),
            sandbox_network: config.sandbox_network.as_ref().map(|net| net.name.clone()),
            by_version: RwLock::new(HashMap::new()),
            start_locks: Mutex::new(HashMap::new()),
            next_port: AtomicU16::new(config.start_port),
            probe: reqwest::Client::new(),
        })
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    pub fn running_containers(&self) -> usize {
        self.by_version.read().unwrap().len()
    }

    /// Make sure a container serving the current version of `url` is running and return its host
    /// port, along with whether this call started it.
    pub async fn ensure(&self, url: &str) -> Result<(u16, bool), ContainerError> {
        let version_hash = self.images.remote_version(url).await?;

        if let Some(record) = self.live_record(&version_hash).await {
            return Ok((record.host_port, false));
        }

        self.stop_stale_versions(url, &version_hash).await;

        let start_lock = self.start_lock(&version_hash).await;
        let _guard = start_lock.lock().await;
        // A concurrent caller may have started this version while we waited for the lock.
        if let Some(record) = self.live_record(&version_hash).await {
            return Ok((record.host_port, false));
        }

        let record = self.start_container(url, &version_hash).await?;
        let host_port = record.host_port;
        self.by_version
            .write()
            .unwrap()
            .insert(version_hash.clone(), record);
        crate::metrics::containers_running().set(self.running_containers() as i64);
        Ok((host_port, true))
    }

    /// Stop and remove every managed container. Called once during shutdown.
    pub async fn stop_all(&self) {
        let records: Vec<ContainerRecord> = {
            let mut by_version = self.by_version.write().unwrap();
            by_version.drain().map(|(_, record)| record).collect()
        };
        for record in records {
            info!(
                target: LOG_TARGET,
                "Stopping container {} ({})", record.name, record.id
            );
            self.stop_and_remove(&record.id).await;
        }
        crate::metrics::containers_running().set(0);
    }

    /// The record for `version_hash` if its container is confirmed running. A record whose
    /// container died is dropped here.
    async fn live_record(&self, version_hash: &str) -> Option<ContainerRecord> {
        let record = self.by_version.read().unwrap().get(version_hash).cloned()?;
        if self.container_is_running(record.id.as_str()).await {
            return Some(record);
        }
        warn!(
            target: LOG_TARGET,
            "Container {} for version {} is no longer running, dropping its record", record.name, record.version_hash
        );
        self.by_version.write().unwrap().remove(version_hash);
        None
    }

    /// Stop containers serving `url` under a different version hash. Their records leave the map
    /// before any Docker API call is made.
    async fn stop_stale_versions(&self, url: &str, current_hash: &str) {
        let stale: Vec<ContainerRecord> = {
            let mut by_version = self.by_version.write().unwrap();
            let hashes: Vec<String> = by_version
                .values()
                .filter(|record| record.url == url && record.version_hash != current_hash)
                .map(|record| record.version_hash.clone())
                .collect();
            hashes.into_iter().filter_map(|hash| by_version.remove(&hash)).collect()
        };

        for record in stale {
            info!(
                target: LOG_TARGET,
                "Version rollover for {}: stopping stale container {} ({})", url, record.name, record.version_hash
            );
            self.stop_and_remove(&record.id).await;
            crate::metrics::containers_stopped().inc();
        }
    }

    async fn start_lock(&self, version_hash: &str) -> Arc<Mutex<()>> {
        let mut locks = self.start_locks.lock().await;
        locks.entry(version_hash.to_string()).or_default().clone()
    }

    async fn start_container(&self, url: &str, version_hash: &str) -> Result<ContainerRecord, ContainerError> {
        let tar_path = self.images.ensure_image(url, version_hash).await?;
        let image_tag = self.load_image(&tar_path).await?;

        let name = container_name(version_hash);
        self.remove_orphan(&name).await;

        let host_port = self.next_port.fetch_add(1, Ordering::SeqCst);
        let id = self.create_and_start(&name, &image_tag, version_hash, host_port).await?;

        if let Err(err) = self.wait_for_ready(&name, host_port).await {
            // Roll back so a wedged container does not hold the version slot.
            error!(
                target: LOG_TARGET,
                "Container {} failed its readiness probe, rolling back: {}", name, err
            );
            self.stop_and_remove(&id).await;
            return Err(err);
        }

        info!(
            target: LOG_TARGET,
            "Container {} for {} is serving on host port {}", name, url, host_port
        );
        crate::metrics::containers_started().inc();
        Ok(ContainerRecord {
            id,
            name,
            url: url.to_string(),
            version_hash: version_hash.to_string(),
            host_port,
            started_at: Instant::now(),
        })
    }

    /// Load the image tar into the runtime and return the tag it reports.
    async fn load_image(&self, tar_path: &std::path::Path) -> Result<String, ContainerError> {
        debug!(target: LOG_TARGET, "Loading image tar {}", tar_path.display());
        let file = tokio::fs::File::open(tar_path).await?;
        let stream = FramedRead::new(file, BytesCodec::new()).map_ok(|chunk| chunk.freeze());
        let body = hyper::Body::wrap_stream(stream);

        let mut progress = self
            .docker
            .import_image(ImportImageOptions { quiet: false }, body, None);

        let mut tag = None;
        while let Some(info) = progress.next().await {
            let info = info?;
            if let Some(error) = info.error {
                return Err(ContainerError::ImageLoad(error));
            }
            if let Some(message) = info.stream {
                if let Some(loaded) = parse_loaded_image_tag(&message) {
                    tag = Some(loaded);
                }
            }
        }
        tag.ok_or_else(|| ContainerError::ImageLoad("runtime did not report a loaded image".to_string()))
    }

    /// Remove a same-named container left behind by a previous process.
    async fn remove_orphan(&self, name: &str) {
        if self.docker.inspect_container(name, None).await.is_ok() {
            info!(target: LOG_TARGET, "Reclaiming orphaned container {}", name);
            self.stop_and_remove(&ContainerId::from(name.to_string())).await;
        }
    }

    async fn create_and_start(
        &self,
        name: &str,
        image_tag: &str,
        version_hash: &str,
        host_port: u16,
    ) -> Result<ContainerId, ContainerError> {
        let mut port_map = PortMap::new();
        port_map.insert(
            CONTAINER_PORT.to_string(),
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(host_port.to_string()),
            }]),
        );
        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(CONTAINER_PORT.to_string(), HashMap::new());

        let mut labels = HashMap::new();
        labels.insert(VERSION_LABEL.to_string(), version_hash.to_string());
        labels.insert(MANAGED_BY_LABEL.0.to_string(), MANAGED_BY_LABEL.1.to_string());

        let networking_config = self.sandbox_network.as_ref().map(|network| {
            let mut endpoints = HashMap::new();
            endpoints.insert(network.clone(), EndpointSettings::default());
            NetworkingConfig {
                endpoints_config: endpoints,
            }
        });

        let options = Some(CreateContainerOptions {
            name: name.to_string(),
        });
        let config = Config::<String> {
            image: Some(image_tag.to_string()),
            exposed_ports: Some(exposed_ports),
            labels: Some(labels),
            host_config: Some(HostConfig {
                port_bindings: Some(port_map),
                runtime: self.runtime.clone(),
                ..Default::default()
            }),
            networking_config,
            ..Default::default()
        };

        let created = self.docker.create_container(options, config).await?;
        let id = ContainerId::from(created.id);
        if let Err(err) = self
            .docker
            .start_container(id.as_str(), None::<bollard::container::StartContainerOptions<String>>)
            .await
        {
            self.stop_and_remove(&id).await;
            return Err(err.into());
        }
        Ok(id)
    }

    /// Probe `GET /` once per second until the container answers. Any HTTP reply means the
    /// process is listening; only transport failures keep the probe going.
    async fn wait_for_ready(&self, name: &str, host_port: u16) -> Result<(), ContainerError> {
        let url = format!("http://localhost:{}/", host_port);
        for attempt in 1..=READINESS_ATTEMPTS {
            match self.probe.get(&url).timeout(READINESS_INTERVAL).send().await {
                Ok(response) => {
                    debug!(
                        target: LOG_TARGET,
                        "Container {} answered readiness probe {} with status {}",
                        name,
                        attempt,
                        response.status()
                    );
                    return Ok(());
                },
                Err(_) => tokio::time::sleep(READINESS_INTERVAL).await,
            }
        }
        Err(ContainerError::ReadinessTimeout {
            name: name.to_string(),
            attempts: READINESS_ATTEMPTS,
        })
    }

    async fn stop_and_remove(&self, id: &ContainerId) {
        if let Err(err) = self
            .docker
            .stop_container(id.as_str(), Some(StopContainerOptions { t: STOP_TIMEOUT_SECS }))
            .await
        {
            debug!(target: LOG_TARGET, "Stopping container {} failed: {}", id, err);
        }
        if let Err(err) = self
            .docker
            .remove_container(
                id.as_str(),
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!(target: LOG_TARGET, "Removing container {} failed: {}", id, err);
        }
    }

    async fn container_is_running(&self, id: &str) -> bool {
        match self.docker.inspect_container(id, None).await {
            Ok(info) => info.state.and_then(|state| state.running).unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Parse the tag out of the runtime's "Loaded image: <tag>" load output. Tarballs without repo
/// tags report "Loaded image ID: <id>" instead; both forms identify the image for `create`.
fn parse_loaded_image_tag(message: &str) -> Option<String> {
    let line = message.trim();
    line.strip_prefix("Loaded image: ")
        .or_else(|| line.strip_prefix("Loaded image ID: "))
        .map(|tag| tag.trim().to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_loaded_image_variants() {
        assert_eq!(
            parse_loaded_image_tag("Loaded image: agent:latest\n"),
            Some("agent:latest".to_string())
        );
        assert_eq!(
            parse_loaded_image_tag("Loaded image ID: sha256:deadbeef\n"),
            Some("sha256:deadbeef".to_string())
        );
        assert_eq!(parse_loaded_image_tag("Pulling layer 1/3"), None);
        assert_eq!(parse_loaded_image_tag(""), None);
    }

    #[test]
    fn port_allocation_is_monotonic() {
        let next_port = AtomicU16::new(10000);
        let first = next_port.fetch_add(1, Ordering::SeqCst);
        let second = next_port.fetch_add(1, Ordering::SeqCst);
        let third = next_port.fetch_add(1, Ordering::SeqCst);
        assert_eq!((first, second, third), (10000, 10001, 10002));
    }
}
