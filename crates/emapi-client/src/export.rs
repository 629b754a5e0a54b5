//! Paginated event export
//!
//! The pipeline creates an export on the service, then fetches its pages in
//! order starting at page 1. Each page arrives gzip compressed; a page that
//! decompresses to nothing ends the run. Failed fetches are retried on the
//! same page with linear backoff. One failure counter covers the whole run,
//! so the total time spent waiting is bounded regardless of the page count.
//! The export is always deleted on the service once it was created.

use crate::services::dm_plus::{Compression, EventColumn, ExportFilter, ExportFormat};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Retry policy for page fetches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRetryPolicy {
    /// Failures allowed over the whole run before it fails
    pub max_attempts: u32,
    /// Wait per failure; the n-th failure waits `n * backoff_unit`
    pub backoff_unit: Duration,
}

impl Default for ExportRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl ExportRetryPolicy {
    /// Read `EMAPI_EXPORT_MAX_ATTEMPTS` and `EMAPI_EXPORT_BACKOFF_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the policy from an arbitrary variable source
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: lookup("EMAPI_EXPORT_MAX_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            backoff_unit: lookup("EMAPI_EXPORT_BACKOFF_MS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.backoff_unit, Duration::from_millis),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Wait after the given failure count
    pub fn backoff(&self, failures: u32) -> Duration {
        self.backoff_unit.saturating_mul(failures)
    }
}

/// Parameters of one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub page_size: u32,
    pub filters: Vec<ExportFilter>,
    pub columns: Vec<EventColumn>,
    pub format: ExportFormat,
    pub compression: Compression,
}

impl ExportRequest {
    /// Export over `[start, end)` with standard columns and no filters
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, page_size: u32) -> Self {
        Self {
            start,
            end,
            page_size,
            filters: Vec::new(),
            columns: EventColumn::standard(),
            format: ExportFormat::default(),
            compression: Compression::default(),
        }
    }

    pub fn with_filter(mut self, filter: ExportFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_columns(mut self, columns: Vec<EventColumn>) -> Self {
        self.columns = columns;
        self
    }
}

/// Export created on the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTicket {
    pub export_id: String,
    pub approximate_count: u64,
}

/// Export pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Created,
    Exporting { page: u32 },
    Completed,
    Failed,
}

/// Remote side of an export
#[async_trait]
pub trait ExportService: Send + Sync {
    async fn create_export(&self, request: &ExportRequest) -> Result<ExportTicket>;

    /// Compressed data of one page
    async fn export_page(&self, export_id: &str, page: u32, request: &ExportRequest) -> Result<Bytes>;

    async fn delete_export(&self, export_id: &str) -> Result<()>;
}

/// Append-only export destination
#[async_trait]
pub trait ExportSink: Send {
    async fn append(&mut self, chunk: &[u8]) -> Result<()>;
}

/// Appends pages to a file, creating it when missing
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ExportSink for FileSink {
    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(chunk).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps pages in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub chunks: Vec<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pages joined
    pub fn contents(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.chunks.push(chunk.to_vec());
        Ok(())
    }
}

/// Summary of a completed export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub export_id: String,
    pub approximate_count: u64,
    pub pages_written: u32,
    pub bytes_written: u64,
    /// Page fetches issued, retries included
    pub fetch_attempts: u32,
    /// Error of the final delete call, if it failed
    pub cleanup_error: Option<String>,
}

impl ExportReport {
    pub const fn cleanup_succeeded(&self) -> bool {
        self.cleanup_error.is_none()
    }
}

/// Drives one export from creation to cleanup
#[derive(Debug)]
pub struct ExportPipeline<S> {
    service: S,
    policy: ExportRetryPolicy,
    state: ExportState,
}

impl<S: ExportService> ExportPipeline<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            policy: ExportRetryPolicy::default(),
            state: ExportState::Created,
        }
    }

    pub fn with_policy(mut self, policy: ExportRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Run the export and append every page to `sink`
    pub async fn run(
        &mut self,
        request: &ExportRequest,
        sink: &mut dyn ExportSink,
    ) -> Result<ExportReport> {
        self.state = ExportState::Created;
        let ticket = self.service.create_export(request).await?;
        info!(
            "Export {} created, ~{} records",
            ticket.export_id, ticket.approximate_count
        );

        let mut report = ExportReport {
            export_id: ticket.export_id.clone(),
            approximate_count: ticket.approximate_count,
            pages_written: 0,
            bytes_written: 0,
            fetch_attempts: 0,
            cleanup_error: None,
        };

        let outcome = self.export_pages(&ticket.export_id, request, sink, &mut report).await;
        self.state = if outcome.is_ok() {
            ExportState::Completed
        } else {
            ExportState::Failed
        };

        if let Err(e) = self.service.delete_export(&ticket.export_id).await {
            warn!("Failed to delete export {}: {}", ticket.export_id, e);
            report.cleanup_error = Some(e.to_string());
        }

        outcome?;
        info!(
            "Export {} completed: {} page(s), {} bytes",
            report.export_id, report.pages_written, report.bytes_written
        );
        Ok(report)
    }

    async fn export_pages(
        &mut self,
        export_id: &str,
        request: &ExportRequest,
        sink: &mut dyn ExportSink,
        report: &mut ExportReport,
    ) -> Result<()> {
        let mut page = 1_u32;
        let mut failures = 0_u32;

        loop {
            self.state = ExportState::Exporting { page };
            report.fetch_attempts += 1;

            let data = match self.fetch_page(export_id, page, request).await {
                Ok(data) => data,
                Err(e) => {
                    failures += 1;
                    if failures >= self.policy.max_attempts {
                        warn!(
                            "Export {} page {} failed, giving up after {} attempt(s): {}",
                            export_id, page, failures, e
                        );
                        return Err(Error::ExportFailed {
                            export_id: export_id.to_string(),
                            page,
                            attempts: failures,
                            source: Box::new(e),
                        });
                    }
                    let wait = self.policy.backoff(failures);
                    warn!(
                        "Export {} page {} failed (attempt {}), retrying in {:?}: {}",
                        export_id, page, failures, wait, e
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            if data.is_empty() {
                debug!("Export {} page {} is empty, done", export_id, page);
                return Ok(());
            }

            sink.append(&data).await?;
            report.pages_written += 1;
            report.bytes_written += u64::try_from(data.len()).unwrap_or(u64::MAX);
            debug!(
                "Export {} page {}: wrote {} bytes",
                export_id,
                page,
                data.len()
            );
            page += 1;
        }
    }

    async fn fetch_page(&self, export_id: &str, page: u32, request: &ExportRequest) -> Result<Vec<u8>> {
        let compressed = self.service.export_page(export_id, page, request).await?;
        decompress(&compressed)
    }
}

/// Gunzip one page; an empty payload is an empty page
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(Error::Decompress)?;
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let policy = ExportRetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(4), Duration::from_secs(4));

        let fast = policy.with_backoff_unit(Duration::from_millis(10));
        assert_eq!(fast.backoff(3), Duration::from_millis(30));
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(b"").unwrap().is_empty());
        assert!(matches!(
            decompress(b"not gzip at all"),
            Err(Error::Decompress(_))
        ));
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Export.csv");

        let mut sink = FileSink::new(&path);
        sink.append(b"a,b\n").await.unwrap();
        sink.append(b"c,d\n").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\nc,d\n");
    }
}
