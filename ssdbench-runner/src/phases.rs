//! # Phase Library
//!
//! The benchmark workload, one function per phase. Phase functions take
//! explicit parameters so each can be run on its own; [`standard_phases`]
//! wires them to a [`BenchConfig`] in the canonical order:
//!
//! ```text
//!  1 append_single_file              7 store_count
//!  2 small_files_concurrent_write    8 store_random_reads
//!  3 small_files_concurrent_read     9 refill_append_and_small_files
//!  4 large_files_stream_write       10 refill_small_files
//!  5 large_files_stream_read        11 archive_outputs
//!  6 store_ingest                   12 cleanup
//! ```
//!
//! Every phase that creates files has an untimed setup step that removes the
//! previous artifacts at its paths, so repeated runs measure fresh writes.
//! The `clear_*` functions are those setup steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use ssdbench_core::{
    config::{ArchiveConfig, BenchConfig, WorkspaceConfig},
    error::{Error, IoResultExt, Result},
    metrics::Metrics,
    utils::{chunk_count, csv_row, format_bytes, CSV_HEADER},
};
use ssdbench_storage::{
    archive::{compress_with_stats, ArchiveSource},
    fs,
    ingest::{ingest_with_stats, IngestStats},
    record_store::{RecordStore, StoreOptions},
    stream::{FileSink, StreamTransfer},
};

use crate::driver::Phase;
use crate::fanout::FanOut;

pub const APPEND_SINGLE_FILE: &str = "append_single_file";
pub const SMALL_FILES_WRITE: &str = "small_files_concurrent_write";
pub const SMALL_FILES_READ: &str = "small_files_concurrent_read";
pub const LARGE_FILES_WRITE: &str = "large_files_stream_write";
pub const LARGE_FILES_READ: &str = "large_files_stream_read";
pub const STORE_INGEST: &str = "store_ingest";
pub const STORE_COUNT: &str = "store_count";
pub const STORE_RANDOM_READS: &str = "store_random_reads";
pub const REFILL_APPEND_AND_SMALL_FILES: &str = "refill_append_and_small_files";
pub const REFILL_SMALL_FILES: &str = "refill_small_files";
pub const ARCHIVE_OUTPUTS: &str = "archive_outputs";
pub const CLEANUP: &str = "cleanup";

/// Canonical run order
pub const PHASE_NAMES: [&str; 12] = [
    APPEND_SINGLE_FILE,
    SMALL_FILES_WRITE,
    SMALL_FILES_READ,
    LARGE_FILES_WRITE,
    LARGE_FILES_READ,
    STORE_INGEST,
    STORE_COUNT,
    STORE_RANDOM_READS,
    REFILL_APPEND_AND_SMALL_FILES,
    REFILL_SMALL_FILES,
    ARCHIVE_OUTPUTS,
    CLEANUP,
];

const SMALL_PREFIX: &str = "small";
const REFILL_PREFIX: &str = "small_retest";
const STORE_EXTENSION: &str = "sqlite";

/// Resolved paths of every artifact location.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub append_file: PathBuf,
    pub small_files_dir: PathBuf,
    pub large_files_dir: PathBuf,
    pub store_dir: PathBuf,
    pub archive_dir: PathBuf,
}

impl Workspace {
    /// Relative entries resolve under `root`; absolute entries are kept.
    pub fn from_config(config: &WorkspaceConfig) -> Self {
        let under_root = |p: &Path| config.root.join(p);
        Self {
            root: config.root.clone(),
            append_file: under_root(&config.append_file),
            small_files_dir: under_root(&config.small_files_dir),
            large_files_dir: under_root(&config.large_files_dir),
            store_dir: under_root(&config.store_dir),
            archive_dir: under_root(&config.archive_dir),
        }
    }

    pub fn small_file(&self, prefix: &str, index: usize) -> PathBuf {
        self.small_files_dir.join(format!("{}_{}.csv", prefix, index))
    }

    pub fn large_file(&self, index: usize) -> PathBuf {
        self.large_files_dir.join(format!("large_{}.csv", index))
    }

    pub fn store_file(&self, index: usize) -> PathBuf {
        self.store_dir.join(format!("bigdata_{}.{}", index, STORE_EXTENSION))
    }
}

/// Everything a phase closure needs, cheap to clone.
#[derive(Clone)]
pub struct PhaseContext {
    pub config: Arc<BenchConfig>,
    pub workspace: Arc<Workspace>,
    pub metrics: Metrics,
}

impl PhaseContext {
    pub fn new(config: BenchConfig) -> Self {
        let workspace = Workspace::from_config(&config.workspace);
        Self {
            config: Arc::new(config),
            workspace: Arc::new(workspace),
            metrics: Metrics::new(),
        }
    }
}

/// All phases in canonical order.
pub fn standard_phases(ctx: &PhaseContext) -> Vec<Phase> {
    PHASE_NAMES
        .iter()
        .filter_map(|name| build_phase(ctx, name))
        .collect()
}

/// The named subset, in canonical order regardless of how `names` is ordered.
pub fn select_phases(ctx: &PhaseContext, names: &[String]) -> Result<Vec<Phase>> {
    if let Some(unknown) = names.iter().find(|n| !PHASE_NAMES.contains(&n.as_str())) {
        return Err(Error::Configuration {
            message: format!(
                "unknown phase '{}' (expected one of: {})",
                unknown,
                PHASE_NAMES.join(", ")
            ),
        });
    }

    Ok(PHASE_NAMES
        .iter()
        .filter(|name| names.iter().any(|n| n == *name))
        .filter_map(|name| build_phase(ctx, name))
        .collect())
}

fn build_phase(ctx: &PhaseContext, name: &str) -> Option<Phase> {
    let ctx = ctx.clone();
    let prep = ctx.clone();
    let phase = match name {
        APPEND_SINGLE_FILE => Phase::with_setup(
            name,
            move || async move { clear_append_target(&prep.workspace).await },
            move || async move {
                let c = &ctx.config.append;
                append_single_file(&ctx.workspace.append_file, c.appends, c.iterations, &ctx.metrics).await?;
                Ok(())
            },
        ),
        SMALL_FILES_WRITE => Phase::with_setup(
            name,
            move || async move {
                clear_small_files(&prep.workspace, SMALL_PREFIX, prep.config.small_files.file_count).await
            },
            move || async move {
                let c = &ctx.config.small_files;
                write_small_files(&ctx.workspace, SMALL_PREFIX, c.file_count, c.writes_per_file, &ctx.metrics).await
            },
        ),
        SMALL_FILES_READ => Phase::new(name, move || async move {
            let c = &ctx.config.small_files;
            read_small_files(&ctx.workspace, c.file_count, c.read_rounds, &ctx.metrics).await?;
            Ok(())
        }),
        LARGE_FILES_WRITE => Phase::with_setup(
            name,
            move || async move { clear_large_files(&prep.workspace, prep.config.large_files.file_count).await },
            move || async move {
                let c = &ctx.config.large_files;
                write_large_files(
                    &ctx.workspace,
                    c.file_count,
                    c.file_size,
                    c.chunk_size,
                    c.high_water_mark,
                    &ctx.metrics,
                )
                .await
            },
        ),
        LARGE_FILES_READ => Phase::new(name, move || async move {
            read_large_files(&ctx.workspace.large_files_dir, ctx.config.large_files.chunk_size, &ctx.metrics)
                .await?;
            Ok(())
        }),
        STORE_INGEST => Phase::with_setup(
            name,
            move || async move { clear_stores(&prep.workspace, prep.config.store.files_to_convert).await },
            move || async move {
                let c = &ctx.config.store;
                let options = StoreOptions { wal: c.wal_journal };
                ingest_large_files(&ctx.workspace, c.files_to_convert, c.chunk_size, options, &ctx.metrics).await?;
                Ok(())
            },
        ),
        STORE_COUNT => Phase::new(name, move || async move {
            count_store_rows(&ctx.workspace.store_dir, ctx.config.store.count_rounds, &ctx.metrics).await?;
            Ok(())
        }),
        STORE_RANDOM_READS => Phase::new(name, move || async move {
            random_store_reads(
                &ctx.workspace.store_dir,
                ctx.config.store.random_reads_per_store,
                &ctx.metrics,
            )
            .await?;
            Ok(())
        }),
        REFILL_APPEND_AND_SMALL_FILES => Phase::with_setup(
            name,
            move || async move {
                clear_append_target(&prep.workspace).await?;
                clear_small_files(&prep.workspace, REFILL_PREFIX, prep.config.refill.file_count).await
            },
            move || async move {
                let c = &ctx.config.refill;
                append_single_file(&ctx.workspace.append_file, c.appends, c.iterations, &ctx.metrics).await?;
                write_small_files(&ctx.workspace, REFILL_PREFIX, c.file_count, c.writes_per_file, &ctx.metrics).await
            },
        ),
        REFILL_SMALL_FILES => Phase::with_setup(
            name,
            move || async move {
                clear_small_files(&prep.workspace, REFILL_PREFIX, prep.config.refill.file_count).await
            },
            move || async move {
                let c = &ctx.config.refill;
                write_small_files(&ctx.workspace, REFILL_PREFIX, c.file_count, c.writes_per_file, &ctx.metrics).await
            },
        ),
        ARCHIVE_OUTPUTS => Phase::with_setup(
            name,
            move || async move { clear_archives(&prep.workspace, &prep.config.archive).await },
            move || async move {
                archive_outputs(&ctx.workspace, &ctx.config.archive, &ctx.metrics).await?;
                Ok(())
            },
        ),
        CLEANUP => Phase::new(name, move || async move { cleanup(&ctx.workspace).await }),
        _ => return None,
    };
    Some(phase)
}

/// Remove the append target left by a previous run.
pub async fn clear_append_target(workspace: &Workspace) -> Result<()> {
    fs::remove_file_if_exists(&workspace.append_file).await?;
    Ok(())
}

/// Remove `<prefix>_<i>.csv` for every `i` below `file_count`.
pub async fn clear_small_files(workspace: &Workspace, prefix: &str, file_count: usize) -> Result<()> {
    for i in 0..file_count {
        fs::remove_file_if_exists(&workspace.small_file(prefix, i)).await?;
    }
    Ok(())
}

pub async fn clear_large_files(workspace: &Workspace, file_count: usize) -> Result<()> {
    for i in 0..file_count {
        fs::remove_file_if_exists(&workspace.large_file(i)).await?;
    }
    Ok(())
}

/// Remove the first `files_to_convert` store files with their journal sidecars.
pub async fn clear_stores(workspace: &Workspace, files_to_convert: usize) -> Result<()> {
    for i in 0..files_to_convert {
        remove_store(&workspace.store_file(i)).await?;
    }
    Ok(())
}

pub async fn clear_archives(workspace: &Workspace, config: &ArchiveConfig) -> Result<()> {
    for path in archive_paths(workspace, config) {
        fs::remove_file_if_exists(&path).await?;
    }
    Ok(())
}

fn archive_paths(workspace: &Workspace, config: &ArchiveConfig) -> [PathBuf; 3] {
    [
        workspace.archive_dir.join("small_files.zip"),
        workspace.archive_dir.join(format!("large_csv_{}.zip", config.large_file_prefix)),
        workspace.archive_dir.join(format!("db_files_{}.zip", config.store_file_prefix)),
    ]
}

/// Write header plus `appends` rows to `path`, one open/append/close per row.
/// The header write truncates whatever was at `path`.
pub async fn write_append_target(path: &Path, appends: u64, metrics: &Metrics) -> Result<Duration> {
    tokio::fs::write(path, CSV_HEADER).await.with_path("write", path)?;

    let start = Instant::now();
    for n in 1..=appends {
        let row = csv_row(n);
        fs::append(path, row.as_bytes()).await?;
        metrics.record_append(row.len() as u64);
    }
    Ok(start.elapsed())
}

/// Repeat [`write_append_target`] `iterations` times from scratch and
/// return the mean append-loop time.
pub async fn append_single_file(path: &Path, appends: u64, iterations: u32, metrics: &Metrics) -> Result<Duration> {
    if let Some(parent) = path.parent() {
        fs::ensure_dir(parent).await?;
    }

    let runs = iterations.max(1);
    let mut total = Duration::ZERO;
    for run in 1..=runs {
        let elapsed = write_append_target(path, appends, metrics).await?;
        debug!(run, elapsed_secs = elapsed.as_secs_f64(), "Append run finished");
        total += elapsed;
    }

    let average = total / runs;
    info!(
        path = ?path,
        appends,
        runs,
        "Append average over {} runs: {:.3}s",
        runs,
        average.as_secs_f64()
    );
    Ok(average)
}

/// Concurrently write `file_count` small CSVs named `<prefix>_<i>.csv`.
pub async fn write_small_files(
    workspace: &Workspace,
    prefix: &str,
    file_count: usize,
    writes_per_file: u64,
    metrics: &Metrics,
) -> Result<()> {
    fs::ensure_dir(&workspace.small_files_dir).await?;

    let mut fan = FanOut::new(format!("{}_files", prefix));
    for i in 0..file_count {
        let path = workspace.small_file(prefix, i);
        let metrics = metrics.clone();
        let member = path.display().to_string();
        fan.spawn(member, async move {
            write_append_target(&path, writes_per_file, &metrics).await?;
            metrics.record_file_written();
            Ok(())
        });
    }
    fan.join().await?;
    Ok(())
}

/// `rounds` rounds of reading every `small_<i>.csv` concurrently. Returns bytes read.
pub async fn read_small_files(
    workspace: &Workspace,
    file_count: usize,
    rounds: u32,
    metrics: &Metrics,
) -> Result<u64> {
    let mut total = 0u64;

    for round in 1..=rounds {
        let mut fan = FanOut::new(format!("small_read_round_{}", round));
        for i in 0..file_count {
            let path = workspace.small_file(SMALL_PREFIX, i);
            let metrics = metrics.clone();
            fan.spawn(path.display().to_string(), async move {
                let text = tokio::fs::read_to_string(&path).await.with_path("read", &path)?;
                metrics.record_file_read(text.len() as u64);
                Ok(text.len() as u64)
            });
        }
        total += fan.join().await?.into_iter().sum::<u64>();
    }

    debug!(rounds, bytes = total, "Small file reads finished");
    Ok(total)
}

/// Concurrently stream `file_count` files of `file_size` bytes each.
pub async fn write_large_files(
    workspace: &Workspace,
    file_count: usize,
    file_size: u64,
    chunk_size: usize,
    high_water_mark: usize,
    metrics: &Metrics,
) -> Result<()> {
    fs::ensure_dir(&workspace.large_files_dir).await?;

    let mut fan = FanOut::new("large_files");
    for i in 0..file_count {
        let path = workspace.large_file(i);
        let metrics = metrics.clone();
        fan.spawn(path.display().to_string(), async move {
            let mut sink = FileSink::create(&path, high_water_mark).await?;
            let stats = StreamTransfer::new(file_size, chunk_size)?.run(&mut sink).await?;
            metrics.record_stream(stats.bytes_written, stats.chunks, stats.saturation_waits);
            Ok(())
        });
    }
    fan.join().await?;

    info!(
        files = file_count,
        each = %format_bytes(file_size),
        chunks_per_file = chunk_count(file_size, chunk_size),
        "Large files written"
    );
    Ok(())
}

/// Read every file in `dir` to end-of-stream concurrently. Returns bytes read.
pub async fn read_large_files(dir: &Path, chunk_size: usize, metrics: &Metrics) -> Result<u64> {
    let files = fs::list_files_sorted(dir, None).await?;

    let mut fan = FanOut::new("large_reads");
    for path in files {
        let metrics = metrics.clone();
        fan.spawn(path.display().to_string(), async move {
            let bytes = drain_file(&path, chunk_size).await?;
            metrics.record_file_read(bytes);
            Ok(bytes)
        });
    }
    let total: u64 = fan.join().await?.into_iter().sum();

    debug!(bytes = total, "Large file reads finished");
    Ok(total)
}

async fn drain_file(path: &Path, chunk_size: usize) -> Result<u64> {
    let mut file = tokio::fs::File::open(path).await.with_path("open", path)?;
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).await.with_path("read", path)?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
    }
}

/// Ingest the first `files_to_convert` large files (name order) into one
/// store each, sequentially. Returns total rows.
///
/// Rows are appended to whatever a store already holds; run
/// [`clear_stores`] first for a fresh ingestion.
pub async fn ingest_large_files(
    workspace: &Workspace,
    files_to_convert: usize,
    chunk_size: usize,
    options: StoreOptions,
    metrics: &Metrics,
) -> Result<u64> {
    fs::ensure_dir(&workspace.store_dir).await?;
    let sources = fs::list_files_sorted(&workspace.large_files_dir, None).await?;

    let mut total_rows = 0;
    for (index, source_path) in sources.into_iter().take(files_to_convert).enumerate() {
        let store_path = workspace.store_file(index);
        let store = RecordStore::open_with(&store_path, options).await?;
        let ingested = ingest_file(&source_path, &store, chunk_size).await;
        let closed = store.close().await;

        let stats = ingested?;
        closed?;

        metrics.record_rows_inserted(stats.rows, stats.bytes);
        total_rows += stats.rows;
        info!(
            source = ?source_path,
            store = ?store_path,
            rows = stats.rows,
            "Converted file into record store"
        );
    }

    Ok(total_rows)
}

async fn ingest_file(source_path: &Path, store: &RecordStore, chunk_size: usize) -> Result<IngestStats> {
    let mut source = tokio::fs::File::open(source_path)
        .await
        .with_path("open", source_path)?;
    ingest_with_stats(&mut source, store, chunk_size).await
}

/// Remove a store file together with its journal sidecars.
async fn remove_store(path: &Path) -> Result<()> {
    fs::remove_file_if_exists(path).await?;
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        fs::remove_file_if_exists(Path::new(&sidecar)).await?;
    }
    Ok(())
}

/// `rounds` rounds of open, count, close over every store file. Returns the
/// row total seen in the last round.
pub async fn count_store_rows(store_dir: &Path, rounds: u32, metrics: &Metrics) -> Result<u64> {
    let stores = fs::list_files_sorted(store_dir, Some(STORE_EXTENSION)).await?;
    let mut last_total = 0;

    for round in 1..=rounds {
        let mut total = 0;
        for path in &stores {
            let store = RecordStore::open_or_create(path).await?;
            let counted = store.count().await;
            store.close().await?;
            total += counted?;
            metrics.record_count_query();
        }
        debug!(round, rounds, rows = total, "Store count round finished");
        last_total = total;
    }

    Ok(last_total)
}

/// Per store: `reads` point lookups of uniformly random ids in `[1, count]`.
/// Empty stores are skipped. Returns bytes read.
pub async fn random_store_reads(store_dir: &Path, reads: u32, metrics: &Metrics) -> Result<u64> {
    let stores = fs::list_files_sorted(store_dir, Some(STORE_EXTENSION)).await?;
    let mut rng = StdRng::from_entropy();
    let mut total = 0;

    for path in &stores {
        let store = RecordStore::open_or_create(path).await?;
        let sampled = sample_store(&store, reads, &mut rng, metrics).await;
        store.close().await?;
        total += sampled?;
        info!(store = ?path, reads, "Random reads finished");
    }

    Ok(total)
}

async fn sample_store(store: &RecordStore, reads: u32, rng: &mut StdRng, metrics: &Metrics) -> Result<u64> {
    let count = store.count().await?;
    if count == 0 {
        debug!(store = ?store.path(), "Skipping empty store");
        return Ok(0);
    }

    let mut bytes = 0u64;
    for _ in 0..reads {
        let id = rng.gen_range(1..=count) as i64;
        let chunk = store.get_by_id(id).await?;
        metrics.record_point_read(chunk.len() as u64);
        bytes += chunk.len() as u64;
    }
    Ok(bytes)
}

/// Per-archive outcome of [`archive_outputs`]
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Compress the small-file tree, a prefix of the large files and a prefix of
/// the store files into three zip archives.
pub async fn archive_outputs(
    workspace: &Workspace,
    config: &ArchiveConfig,
    metrics: &Metrics,
) -> Result<Vec<ArchiveReport>> {
    fs::ensure_dir(&workspace.archive_dir).await?;

    let large: Vec<PathBuf> = fs::list_files_sorted(&workspace.large_files_dir, None)
        .await?
        .into_iter()
        .take(config.large_file_prefix)
        .collect();
    let stores: Vec<PathBuf> = fs::list_files_sorted(&workspace.store_dir, Some(STORE_EXTENSION))
        .await?
        .into_iter()
        .take(config.store_file_prefix)
        .collect();

    let sources = [
        ArchiveSource::Directory(workspace.small_files_dir.clone()),
        ArchiveSource::Files(large),
        ArchiveSource::Files(stores),
    ];

    let mut reports = Vec::with_capacity(sources.len());
    for (path, source) in archive_paths(workspace, config).into_iter().zip(sources) {
        let stats = compress_with_stats(source, &path, config.compression_level).await?;
        metrics.record_archive(stats.archive_bytes);
        info!(
            archive = ?path,
            entries = stats.entries,
            size = %format_bytes(stats.archive_bytes),
            "Archive complete ({} bytes)",
            stats.archive_bytes
        );
        reports.push(ArchiveReport {
            path,
            bytes: stats.archive_bytes,
        });
    }

    Ok(reports)
}

/// Remove every artifact location of the workspace, then the root itself if
/// nothing else is left in it. Unrelated files under the root are kept.
pub async fn cleanup(workspace: &Workspace) -> Result<()> {
    fs::remove_file_if_exists(&workspace.append_file).await?;
    for dir in [
        &workspace.small_files_dir,
        &workspace.large_files_dir,
        &workspace.store_dir,
        &workspace.archive_dir,
    ] {
        if fs::remove_dir_all_if_exists(dir).await? {
            debug!(dir = ?dir, "Removed");
        }
    }

    if fs::remove_dir_if_empty(&workspace.root).await? {
        info!(root = ?workspace.root, "Workspace removed");
    } else {
        info!(root = ?workspace.root, "Benchmark artifacts removed");
    }
    Ok(())
}
