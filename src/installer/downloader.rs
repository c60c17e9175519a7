//! File downloader
//!
//! Streams to a uniquely named `.part` file next to the destination and
//! renames it into place once the digest checks out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::core::config::NetworkConfig;
use crate::core::{PackwrightError, PackwrightResult};
use crate::installer::integrity::IntegrityChecker;
use crate::installer::progress::ProgressTracker;
use crate::platform::FileHashes;

const RETRY_BASE_DELAY_MS: u64 = 500;

/// An open response body
pub struct ByteStream {
    pub content_length: Option<u64>,
    pub chunks: BoxStream<'static, PackwrightResult<Vec<u8>>>,
}

/// Source of file bodies
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> PackwrightResult<ByteStream>;
}

/// HTTP transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(network: &NetworkConfig) -> PackwrightResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(network.user_agent.clone())
            .timeout(Duration::from_secs(network.download_timeout))
            .connect_timeout(Duration::from_secs(network.timeout))
            .build()
            .map_err(|e| PackwrightError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str) -> PackwrightResult<ByteStream> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackwrightError::download(url, format!("HTTP {}", status)));
        }

        Ok(ByteStream {
            content_length: response.content_length(),
            chunks: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(PackwrightError::from))
                .boxed(),
        })
    }
}

/// One file to fetch
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    /// Name shown in progress and errors
    pub label: String,
    pub hashes: FileHashes,
}

/// What happened to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Bytes transferred
    Downloaded(u64),
    /// Destination already held the expected file
    AlreadyPresent,
}

/// Downloader with retry on transient failures
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    retries: u32,
}

impl Downloader {
    /// Create a new downloader
    pub fn new(transport: Arc<dyn Transport>, retries: u32) -> Self {
        Self { transport, retries }
    }

    /// Download one file. Cancellation interrupts the transfer and removes
    /// the partial file; anything else that fails becomes `DownloadFailed`.
    pub async fn download(
        &self,
        task: &DownloadTask,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> PackwrightResult<DownloadStatus> {
        if self.already_present(task).await {
            tracing::debug!("{} already present, skipping", task.label);
            return Ok(DownloadStatus::AlreadyPresent);
        }

        if let Some(parent) = task.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempt = 0;
        loop {
            match self.transfer(task, progress, cancel).await {
                Ok(bytes) => return Ok(DownloadStatus::Downloaded(bytes)),
                Err(PackwrightError::Cancelled) => return Err(PackwrightError::Cancelled),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY_MS * (1 << (attempt - 1));
                    tracing::warn!(
                        "Download of {} failed ({}), retry {}/{} in {}ms",
                        task.label,
                        e,
                        attempt,
                        self.retries,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(PackwrightError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    }
                }
                Err(e @ PackwrightError::DownloadFailed { .. }) => return Err(e),
                Err(e) => return Err(PackwrightError::download(&task.label, e)),
            }
        }
    }

    async fn already_present(&self, task: &DownloadTask) -> bool {
        let Some(expected) = task.hashes.sha1.clone() else {
            return false;
        };
        if !task.destination.is_file() {
            return false;
        }
        let path = task.destination.clone();
        match tokio::task::spawn_blocking(move || crate::utils::sha1_file(&path)).await {
            Ok(Ok(actual)) => actual.eq_ignore_ascii_case(&expected),
            _ => false,
        }
    }

    async fn transfer(
        &self,
        task: &DownloadTask,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> PackwrightResult<u64> {
        let part = part_path(&task.destination);
        let result = self.transfer_to(task, &part, progress, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&part).await;
        }
        result
    }

    async fn transfer_to(
        &self,
        task: &DownloadTask,
        part: &Path,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> PackwrightResult<u64> {
        let mut body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PackwrightError::Cancelled),
            opened = self.transport.open(&task.url) => opened?,
        };
        tracing::debug!("Downloading {} ({:?} bytes)", task.label, body.content_length);

        let mut file = tokio::fs::File::create(part).await?;
        let mut checker = IntegrityChecker::new(&task.hashes);
        let mut written = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PackwrightError::Cancelled),
                chunk = body.chunks.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            checker.update(&chunk);
            written += chunk.len() as u64;
            progress.add_bytes(chunk.len() as u64);
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(expected) = body.content_length {
            if expected != written {
                return Err(PackwrightError::Network(format!(
                    "{} truncated: {} of {} bytes",
                    task.label, written, expected
                )));
            }
        }

        if let Err(e) = checker.verify(&task.label) {
            tracing::error!("Integrity check failed for {}, partial file removed", task.label);
            return Err(e);
        }

        tokio::fs::rename(part, &task.destination).await?;
        Ok(written)
    }
}

/// Unique sibling of `destination` that concurrent writers never share
fn part_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}
