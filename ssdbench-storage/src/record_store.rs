//! # Record Store
//!
//! Append-only chunk table on top of an embedded SQLite file.
//!
//! ```text
//!  async callers                      worker thread (owns Connection)
//!  ─────────────                      ───────────────────────────────
//!  insert() ──┐
//!  count()  ──┼──► mpsc ──► serve requests one at a time ──► oneshot reply
//!  get()    ──┘
//! ```
//!
//! The connection lives on a dedicated thread so blocking SQLite calls never
//! stall the async runtime. Requests are served strictly in send order.
//!
//! Lifecycle: `open_or_create` ─► Open ─► `close` ─► Closed (terminal). Any
//! operation on a closed handle fails with [`Error::Closed`]. Reopening the
//! same path layers onto existing rows.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use ssdbench_core::error::{Error, Result};

use crate::ingest::RecordSink;

/// Name of the single chunk table
pub const CHUNK_TABLE: &str = "file_chunks";

const REQUEST_QUEUE_DEPTH: usize = 64;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS file_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk BLOB
)";

const WAL_PRAGMAS: &[&str] = &["PRAGMA journal_mode=WAL;", "PRAGMA synchronous=NORMAL;"];

/// Connection settings applied when a store is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Write-ahead journal with `synchronous=NORMAL`. Off keeps SQLite's
    /// rollback journal and full sync on every commit.
    pub wal: bool,
}

enum Request {
    Insert {
        payload: Bytes,
        reply: oneshot::Sender<Result<i64>>,
    },
    Count {
        reply: oneshot::Sender<Result<u64>>,
    },
    Get {
        id: i64,
        reply: oneshot::Sender<Result<Option<Bytes>>>,
    },
}

/// Handle to one open record store file.
pub struct RecordStore {
    path: PathBuf,
    tx: Mutex<Option<mpsc::Sender<Request>>>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl RecordStore {
    /// Open the store at `path`, creating the file and table if absent.
    /// Uses SQLite's default journal and sync settings.
    pub async fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::default()).await
    }

    pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel::<Request>(REQUEST_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker_path = path.clone();
        let worker = std::thread::Builder::new()
            .name("record-store".into())
            .spawn(move || match open_connection(&worker_path, options) {
                Ok(conn) => {
                    let _ = ready_tx.send(Ok(()));
                    serve(conn, rx, &worker_path);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| Error::io("spawn record store worker", e))?;

        ready_rx.await.map_err(|_| Error::Internal {
            message: format!("record store worker for {:?} exited during open", path),
        })??;

        debug!(path = ?path, wal = options.wal, "Record store open");
        Ok(Self {
            path,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Append one row, returning its id.
    pub async fn insert(&self, payload: Bytes) -> Result<i64> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Insert { payload, reply }, rx).await
    }

    /// Rows currently in the table, including every insert acknowledged
    /// before the call.
    pub async fn count(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Count { reply }, rx).await
    }

    /// Payload of row `id`, or [`Error::NotFound`].
    pub async fn get_by_id(&self, id: i64) -> Result<Bytes> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Get { id, reply }, rx)
            .await?
            .ok_or_else(|| Error::NotFound {
                table: CHUNK_TABLE.to_string(),
                id,
            })
    }

    /// Release the connection. Waits for queued requests to finish.
    pub async fn close(&self) -> Result<()> {
        let Some(tx) = self.tx.lock().take() else {
            return Err(self.closed());
        };
        drop(tx);

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| Error::Internal {
                    message: format!("join record store worker: {}", e),
                })?
                .map_err(|_| Error::Internal {
                    message: format!("record store worker for {:?} panicked", self.path),
                })?;
        }

        debug!(path = ?self.path, "Record store closed");
        Ok(())
    }

    async fn request<T>(&self, request: Request, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        let tx = self.tx.lock().clone().ok_or_else(|| self.closed())?;
        tx.send(request).await.map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    fn closed(&self) -> Error {
        Error::Closed {
            path: self.path.clone(),
        }
    }
}

#[async_trait]
impl RecordSink for RecordStore {
    async fn insert(&self, payload: Bytes) -> Result<i64> {
        RecordStore::insert(self, payload).await
    }
}

fn store_error(path: &Path, e: rusqlite::Error) -> Error {
    Error::Store {
        message: format!("{:?}: {}", path, e),
    }
}

fn open_connection(path: &Path, options: StoreOptions) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| store_error(path, e))?;
    let pragmas: &[&str] = if options.wal { WAL_PRAGMAS } else { &[] };
    for pragma in pragmas {
        // journal_mode returns a row, so go through query_row rather than execute
        conn.query_row(pragma, [], |_| Ok(()))
            .optional()
            .map_err(|e| store_error(path, e))?;
    }
    conn.execute(SCHEMA, []).map_err(|e| store_error(path, e))?;
    Ok(conn)
}

fn serve(conn: Connection, mut rx: mpsc::Receiver<Request>, path: &Path) {
    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Insert { payload, reply } => {
                let result = conn
                    .execute(
                        "INSERT INTO file_chunks (chunk) VALUES (?1)",
                        params![payload.as_ref()],
                    )
                    .map(|_| conn.last_insert_rowid())
                    .map_err(|e| store_error(path, e));
                let _ = reply.send(result);
            }
            Request::Count { reply } => {
                let result = conn
                    .query_row("SELECT COUNT(*) FROM file_chunks", [], |row| row.get::<_, i64>(0))
                    .map(|n| n as u64)
                    .map_err(|e| store_error(path, e));
                let _ = reply.send(result);
            }
            Request::Get { id, reply } => {
                let result = conn
                    .query_row("SELECT chunk FROM file_chunks WHERE id = ?1", params![id], |row| {
                        row.get::<_, Vec<u8>>(0)
                    })
                    .optional()
                    .map(|blob| blob.map(Bytes::from))
                    .map_err(|e| store_error(path, e));
                let _ = reply.send(result);
            }
        }
    }

    if let Err((_, e)) = conn.close() {
        warn!(path = ?path, error = %e, "Record store close reported an error");
    }
}
