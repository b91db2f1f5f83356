//! HTTP utilities
//!
//! Centralized HTTP client shared by every resolver and by the orchestrator.
//! It owns the retry schedule and the streaming download into an exclusive
//! temporary file.

use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use super::files::{create_temp_path, publish_exclusive, remove_temp_file};
use super::{FileOperation, FileSource, HarvestError, Result};
use crate::downloader::config::HarvestConfig;

/// HTTP client with retry and streaming download support
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_schedule: Arc<Vec<Duration>>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| HarvestError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
            field: None,
            suggestion: None,
        })?;

        Ok(Self {
            client,
            retry_schedule: Arc::new(config.retry_schedule()),
        })
    }

    /// Send a request, retrying transient failures
    ///
    /// Only connection errors, timeouts, 5xx and 429 are retried; any other
    /// status is handed back to the caller, which decides whether it is a
    /// soft "not found" or a hard failure. `build` is called once per attempt.
    pub async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempts = AtomicUsize::new(0);
        let result = RetryIf::spawn(
            self.retry_schedule.iter().copied(),
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                if attempt > 0 {
                    warn!("Retry attempt {} for {}", attempt, url);
                }
                let request = build(&self.client);
                async move {
                    debug!("Request: {}", url);
                    let response = request.send().await.map_err(|source| HarvestError::HttpRequest {
                        url: url.to_string(),
                        source,
                    })?;
                    let status = response.status();
                    debug!("Response: {} {}", status, url);
                    if status.is_server_error() || status.as_u16() == 429 {
                        return Err(HarvestError::HttpStatus {
                            url: url.to_string(),
                            status,
                        });
                    }
                    Ok(response)
                }
            },
            |error: &HarvestError| error.is_recoverable(),
        )
        .await;

        let attempts = attempts.into_inner();
        match result {
            Err(error) if attempts > 1 && error.is_recoverable() => Err(HarvestError::MaxRetriesExceeded {
                url: url.to_string(),
                max_retries: attempts - 1,
                last_error: Box::new(error),
            }),
            other => other,
        }
    }

    /// Download a file's bytes to `dest_path`, never overwriting anything
    ///
    /// Bytes are streamed into `<dest>.part`, replacing any stale one, and
    /// then published under the final name. A non-success status leaves
    /// nothing on disk.
    pub async fn download_to_file(&self, source: &FileSource, dest_path: &Path) -> Result<u64> {
        debug!("Stream downloading: {} to {}", source.url, dest_path.display());

        let response = self.send(&source.url, |client| source.to_request(client)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                url: source.url.clone(),
                status,
            });
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::file_system(parent, FileOperation::CreateDir, e))?;
        }

        // A leftover .part belongs to an interrupted run; the final name is
        // what guards against double downloads.
        let temp_path = create_temp_path(dest_path);
        remove_temp_file(&temp_path).await;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(|e| HarvestError::file_system(&temp_path, FileOperation::Create, e))?;

        let written = stream_body(response, &mut file, &source.url, &temp_path).await;
        drop(file);

        let size = match written {
            Ok(size) => size,
            Err(error) => {
                remove_temp_file(&temp_path).await;
                return Err(error);
            }
        };

        if let Err(error) = publish_exclusive(&temp_path, dest_path).await {
            remove_temp_file(&temp_path).await;
            return Err(error);
        }

        debug!("Download completed: {} bytes", size);
        Ok(size)
    }
}

async fn stream_body(
    response: Response,
    file: &mut fs::File,
    url: &str,
    temp_path: &Path,
) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| HarvestError::HttpRequest {
            url: url.to_string(),
            source: e,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| HarvestError::file_system(temp_path, FileOperation::Write, e))?;
        downloaded += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| HarvestError::file_system(temp_path, FileOperation::Write, e))?;
    Ok(downloaded)
}

/// Read a response body as JSON, keeping the URL for error context
pub async fn read_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    let body = response.text().await.map_err(|e| HarvestError::HttpRequest {
        url: url.to_string(),
        source: e,
    })?;
    serde_json::from_str(&body).map_err(|e| {
        debug!("Unexpected response body from {}: {}", url, body);
        HarvestError::Decode {
            url: url.to_string(),
            source: e,
        }
    })
}

/// Fail with `HttpStatus` unless the response is a success
pub fn ensure_success(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HarvestError::HttpStatus {
            url: url.to_string(),
            status,
        })
    }
}
