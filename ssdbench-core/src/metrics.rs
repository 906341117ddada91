//! # Metrics
//!
//! I/O counters accumulated across a run and a named wall-clock timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Filesystem
    files_written: AtomicU64,
    files_read: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    appends: AtomicU64,

    // Stream writer
    chunks_submitted: AtomicU64,
    saturation_waits: AtomicU64,

    // Record store
    rows_inserted: AtomicU64,
    point_reads: AtomicU64,
    count_queries: AtomicU64,

    // Archives
    archives_written: AtomicU64,
    archive_bytes: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_append(&self, bytes: u64) {
        self.inner.appends.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_file_written(&self) {
        self.inner.files_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_read(&self, bytes: u64) {
        self.inner.files_read.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a finished stream transfer
    pub fn record_stream(&self, bytes: u64, chunks: u64, saturation_waits: u64) {
        self.inner.files_written.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.inner.chunks_submitted.fetch_add(chunks, Ordering::Relaxed);
        self.inner.saturation_waits.fetch_add(saturation_waits, Ordering::Relaxed);
    }

    pub fn record_rows_inserted(&self, rows: u64, bytes: u64) {
        self.inner.rows_inserted.fetch_add(rows, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_point_read(&self, bytes: u64) {
        self.inner.point_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_count_query(&self) {
        self.inner.count_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archive(&self, bytes: u64) {
        self.inner.archives_written.fetch_add(1, Ordering::Relaxed);
        self.inner.archive_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            files_written: load(&self.inner.files_written),
            files_read: load(&self.inner.files_read),
            bytes_written: load(&self.inner.bytes_written),
            bytes_read: load(&self.inner.bytes_read),
            appends: load(&self.inner.appends),
            chunks_submitted: load(&self.inner.chunks_submitted),
            saturation_waits: load(&self.inner.saturation_waits),
            rows_inserted: load(&self.inner.rows_inserted),
            point_reads: load(&self.inner.point_reads),
            count_queries: load(&self.inner.count_queries),
            archives_written: load(&self.inner.archives_written),
            archive_bytes: load(&self.inner.archive_bytes),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_written: u64,
    pub files_read: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub appends: u64,
    pub chunks_submitted: u64,
    pub saturation_waits: u64,
    pub rows_inserted: u64,
    pub point_reads: u64,
    pub count_queries: u64,
    pub archives_written: u64,
    pub archive_bytes: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Start new timer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer, log and return the duration
    pub fn stop(self) -> Duration {
        let duration = self.elapsed();
        tracing::debug!(
            name = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}
