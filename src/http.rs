//! Update check over HTTP.
//!
//! This module defines the `UpdateChecker` trait so the module can learn about newer
//! releases without depending on a specific transport, enabling testability with a
//! mock implementation.

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Published release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub version: String,
}

/// Trait for fetching the latest published version.
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// Latest published version string.
    ///
    /// # Errors
    /// Returns an error if the manifest can't be fetched or parsed.
    async fn latest_version(&self) -> Result<String>;
}

/// Whether `latest` is a newer release than `current`.
///
/// Versions are compared numerically component by component (`1.10` > `1.9`);
/// missing components count as zero. Non-numeric components fall back to string
/// comparison.
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<String> {
        v.trim()
            .trim_start_matches('v')
            .split(['.', '-', '+'])
            .map(str::to_string)
            .collect()
    };
    let latest = parse(latest);
    let current = parse(current);

    for i in 0..latest.len().max(current.len()) {
        let l = latest.get(i).map(String::as_str).unwrap_or("0");
        let c = current.get(i).map(String::as_str).unwrap_or("0");
        let ordering = match (l.parse::<u64>(), c.parse::<u64>()) {
            (Ok(l), Ok(c)) => l.cmp(&c),
            _ => l.cmp(c),
        };
        match ordering {
            CmpOrdering::Greater => return true,
            CmpOrdering::Less => return false,
            CmpOrdering::Equal => {}
        }
    }
    false
}

/// Ask `checker` whether a newer version than `current` exists.
///
/// Failures are logged and treated as "no update".
pub async fn check_for_update<C: UpdateChecker + ?Sized>(checker: &C, current: &str) -> bool {
    match checker.latest_version().await {
        Ok(latest) => {
            let newer = is_newer_version(&latest, current);
            tracing::info!(
                current_version = %current,
                latest_version = %latest,
                update_available = newer,
                "Checked for updates"
            );
            newer
        }
        Err(e) => {
            tracing::warn!(error = %e, "Update check failed");
            false
        }
    }
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Fetches a JSON [`ReleaseManifest`] from a fixed URL.
#[derive(Clone)]
pub struct ReqwestUpdateChecker {
    client: reqwest::Client,
    manifest_url: String,
    timeout_ms: u64,
}

impl ReqwestUpdateChecker {
    pub fn new(manifest_url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            manifest_url: manifest_url.into(),
            timeout_ms,
        }
    }
}

#[async_trait]
impl UpdateChecker for ReqwestUpdateChecker {
    #[tracing::instrument(skip(self), fields(url = %self.manifest_url))]
    async fn latest_version(&self) -> Result<String> {
        tracing::debug!(timeout_ms = self.timeout_ms, "Fetching release manifest");

        let response = self
            .client
            .get(&self.manifest_url)
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let manifest: ReleaseManifest = serde_json::from_str(&body)?;
        Ok(manifest.version)
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Mock update checker for testing.
///
/// Returns queued responses in FIFO order; once the queue is empty every call fails.
#[derive(Clone, Default)]
pub struct MockUpdateChecker {
    responses: Arc<Mutex<Vec<Result<String>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockUpdateChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checker whose first call reports `version`.
    pub fn with_version(version: &str) -> Self {
        let mock = Self::new();
        mock.add_response(Ok(version.to_string()));
        mock
    }

    pub fn add_response(&self, response: Result<String>) {
        self.responses.lock().push(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateChecker for MockUpdateChecker {
    async fn latest_version(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Err(crate::error::EssentialsError::Other(anyhow::anyhow!(
                "No mock release manifest configured"
            )));
        }
        responses.remove(0)
    }
}
