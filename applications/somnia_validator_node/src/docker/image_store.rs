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

//! Downloads agent image tars and caches them on disk, keyed by a version hash derived from the
//! image URL's response headers.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use futures::StreamExt;
use log::*;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, ETAG, HeaderMap, LAST_MODIFIED};
use sha2::{Digest, Sha256};
use tokio::{io::AsyncWriteExt, sync::Mutex};

use super::error::ImageStoreError;

const LOG_TARGET: &str = "somnia::validator_node::image_store";

const HEAD_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_ACCEPT: &str = "application/x-tar, application/octet-stream, */*";

/// Derive the 16-hex-char version hash from a version identifier string.
pub fn version_hash(identifier: &str) -> String {
    let digest = Sha256::digest(identifier.as_bytes());
    hex::encode(&digest[..8])
}

/// The version identifier for an image URL, in header priority order. Two nodes seeing
/// different headers may disagree; within one node the identifier is stable for identical
/// headers.
fn version_identifier(url: &str, headers: &HeaderMap) -> String {
    let header = |name| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(etag) = header(ETAG) {
        return format!("etag:{}", etag);
    }
    if let Some(modified) = header(LAST_MODIFIED) {
        return format!("modified:{}", modified);
    }
    if let Some(size) = header(CONTENT_LENGTH) {
        return format!("size:{}", size);
    }
    format!("url:{}", url)
}

pub struct ImageStore {
    client: reqwest::Client,
    cache_dir: PathBuf,
    // Single-flight per URL; the downloaded tar is the shared result.
    download_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ImageStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
            download_locks: Mutex::new(HashMap::new()),
        }
    }

    /// HEAD the image URL and derive the current version hash.
    pub async fn remote_version(&self, url: &str) -> Result<String, ImageStoreError> {
        let response = self.client.head(url).timeout(HEAD_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(ImageStoreError::ProbeFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let identifier = version_identifier(url, response.headers());
        Ok(version_hash(&identifier))
    }

    pub fn tar_path(&self, version_hash: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.tar", version_hash))
    }

    /// Return the local tar for `version_hash`, downloading it when missing. Concurrent callers
    /// for the same URL share one download.
    pub async fn ensure_image(&self, url: &str, version_hash: &str) -> Result<PathBuf, ImageStoreError> {
        let path = self.tar_path(version_hash);
        if tar_is_usable(&path).await {
            return Ok(path);
        }

        let lock = self.download_lock(url).await;
        let _guard = lock.lock().await;
        // A racing caller may have completed the download while we waited.
        if tar_is_usable(&path).await {
            return Ok(path);
        }

        self.download(url, &path).await?;
        crate::metrics::image_downloads().inc();
        Ok(path)
    }

    async fn download_lock(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.download_locks.lock().await;
        locks.entry(url.to_string()).or_default().clone()
    }

    async fn download(&self, url: &str, dest: &PathBuf) -> Result<(), ImageStoreError> {
        info!(target: LOG_TARGET, "Downloading agent image {} to {}", url, dest.display());
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let response = self.client.get(url).header(ACCEPT, DOWNLOAD_ACCEPT).send().await?;
        if !response.status().is_success() {
            return Err(ImageStoreError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Stream into a sibling temp file and rename, so a crash mid-download can never leave a
        // truncated tar that later lookups would trust.
        let tmp = dest.with_extension("tar.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, dest).await?;

        debug!(target: LOG_TARGET, "Image {} stored at {}", url, dest.display());
        Ok(())
    }
}

async fn tar_is_usable(path: &PathBuf) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(entries: &[(reqwest::header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn identifier_prefers_etag() {
        let map = headers(&[
            (ETAG, "\"abc\""),
            (LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT"),
            (CONTENT_LENGTH, "123"),
        ]);
        assert_eq!(version_identifier("https://x/img.tar", &map), "etag:\"abc\"");
    }

    #[test]
    fn identifier_falls_back_in_priority_order() {
        let map = headers(&[
            (LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT"),
            (CONTENT_LENGTH, "123"),
        ]);
        assert_eq!(
            version_identifier("https://x/img.tar", &map),
            "modified:Wed, 21 Oct 2015 07:28:00 GMT"
        );

        let map = headers(&[(CONTENT_LENGTH, "123")]);
        assert_eq!(version_identifier("https://x/img.tar", &map), "size:123");

        let map = headers(&[]);
        assert_eq!(version_identifier("https://x/img.tar", &map), "url:https://x/img.tar");
    }

    #[test]
    fn version_hash_is_stable_and_short() {
        let first = version_hash("etag:\"abc\"");
        let second = version_hash("etag:\"abc\"");
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, version_hash("etag:\"def\""));
    }

    #[test]
    fn tar_paths_are_keyed_by_hash() {
        let store = ImageStore::new(PathBuf::from("/tmp/images"));
        assert_eq!(
            store.tar_path("0011223344556677"),
            PathBuf::from("/tmp/images/0011223344556677.tar")
        );
    }

    #[tokio::test]
    async fn empty_tars_are_not_usable() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.tar");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(!tar_is_usable(&empty).await);

        let full = dir.path().join("full.tar");
        tokio::fs::write(&full, b"data").await.unwrap();
        assert!(tar_is_usable(&full).await);

        assert!(!tar_is_usable(&dir.path().join("missing.tar")).await);
    }

    #[tokio::test]
    async fn cached_tar_skips_the_network() {
        // The store points at an unreachable host, so a hit must come from disk alone.
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());
        let hash = version_hash("etag:\"abc\"");
        tokio::fs::write(store.tar_path(&hash), b"tarball").await.unwrap();

        let path = store.ensure_image("http://127.0.0.1:1/img.tar", &hash).await.unwrap();
        assert_eq!(path, store.tar_path(&hash));
    }
}
