//! Chunked ingestion: source stream ─► sequential record sink.
//!
//! For each chunk, in arrival order:
//!
//! 1. stop reading from the source,
//! 2. issue exactly one insert into the sink,
//! 3. resume reading only after the insert is acknowledged.
//!
//! At most one insert is in flight, so row id order equals source byte
//! order. Ingestion is a non-transactional append: a failure mid-stream
//! leaves the rows inserted so far in place.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use ssdbench_core::error::{Error, Result};

/// Sink accepting one row per chunk, acknowledging each insert with its id.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn insert(&self, payload: Bytes) -> Result<i64>;
}

/// Summary of a completed ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows: u64,
    pub bytes: u64,
    pub first_id: Option<i64>,
    pub last_id: Option<i64>,
}

/// Read `source` in `chunk_size` chunks and insert each one into `sink`.
///
/// Every chunk except the last is exactly `chunk_size` bytes. Returns the
/// number of rows inserted.
pub async fn ingest<R, S>(source: &mut R, sink: &S, chunk_size: usize) -> Result<u64>
where
    R: AsyncRead + Unpin + Send,
    S: RecordSink + ?Sized,
{
    Ok(ingest_with_stats(source, sink, chunk_size).await?.rows)
}

/// Same as [`ingest`], reporting bytes and the id range as well.
pub async fn ingest_with_stats<R, S>(source: &mut R, sink: &S, chunk_size: usize) -> Result<IngestStats>
where
    R: AsyncRead + Unpin + Send,
    S: RecordSink + ?Sized,
{
    if chunk_size == 0 {
        return Err(Error::Configuration {
            message: "chunk_size must be greater than zero".to_string(),
        });
    }

    let mut stats = IngestStats::default();

    loop {
        let chunk = read_chunk(source, chunk_size).await?;
        if chunk.is_empty() {
            break;
        }

        let len = chunk.len() as u64;
        let id = sink.insert(chunk).await?;

        stats.rows += 1;
        stats.bytes += len;
        stats.first_id.get_or_insert(id);
        stats.last_id = Some(id);
    }

    debug!(rows = stats.rows, bytes = stats.bytes, "Ingestion complete");
    Ok(stats)
}

/// Fill one chunk, reading until it is full or the source is exhausted.
async fn read_chunk<R>(source: &mut R, chunk_size: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;

    while filled < chunk_size {
        let n = source
            .read(&mut buf[filled..])
            .await
            .map_err(|e| Error::io(format!("read source: {}", e), e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
