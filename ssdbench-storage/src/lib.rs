//! # ssdbench Storage Primitives
//!
//! The I/O engine the benchmark phases are built from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Large-object write                     │
//! │                                                             │
//! │  StreamTransfer ──submit──> ChunkSink (FileSink) ──> disk   │
//! │        ▲                        │ saturated                 │
//! │        └──────── drained ◄──────┘                           │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Chunked ingestion                      │
//! │                                                             │
//! │  AsyncRead ──chunk──> ingest ──insert──> RecordStore        │
//! │      ▲                              │ ack (row id)          │
//! │      └───────── resume ◄────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod archive;
pub mod fs;
pub mod ingest;
pub mod record_store;
pub mod stream;

pub use archive::{compress, compress_with_stats, ArchiveSource, ArchiveStats};
pub use ingest::{ingest, ingest_with_stats, IngestStats, RecordSink};
pub use record_store::{RecordStore, StoreOptions, CHUNK_TABLE};
pub use stream::{write_stream, ChunkSink, FileSink, StreamStats, StreamTransfer};
