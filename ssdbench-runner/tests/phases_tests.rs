//! # Phase Library Tests
//!
//! Runs each phase against a tiny workload rooted in a temp directory.

use std::path::Path;

use tempfile::TempDir;

use ssdbench_core::{BenchConfig, Error, Metrics};
use ssdbench_runner::phases::{
    self, append_single_file, archive_outputs, clear_stores, count_store_rows,
    ingest_large_files, random_store_reads, read_large_files, read_small_files,
    write_append_target, write_large_files, write_small_files,
};
use ssdbench_runner::{select_phases, standard_phases, Driver, PhaseContext, Workspace, PHASE_NAMES};
use ssdbench_storage::{RecordStore, StoreOptions};

const MIB: usize = 1024 * 1024;

fn tiny_config(root: &Path) -> BenchConfig {
    let mut config = BenchConfig::quick();
    config.workspace.root = root.to_path_buf();
    config.append.appends = 20;
    config.append.iterations = 2;
    config.small_files.file_count = 6;
    config.small_files.writes_per_file = 5;
    config.small_files.read_rounds = 2;
    config.large_files.file_count = 3;
    config.large_files.file_size = 2 * MIB as u64 + 100;
    config.large_files.chunk_size = MIB;
    config.store.files_to_convert = 2;
    config.store.count_rounds = 2;
    config.store.random_reads_per_store = 4;
    config.refill.appends = 10;
    config.refill.iterations = 1;
    config.refill.file_count = 4;
    config.refill.writes_per_file = 3;
    config.archive.compression_level = 1;
    config.archive.large_file_prefix = 2;
    config.archive.store_file_prefix = 1;
    config
}

fn workspace_for(temp_dir: &TempDir) -> Workspace {
    Workspace::from_config(&tiny_config(temp_dir.path()).workspace)
}

#[tokio::test]
async fn test_append_target_contents() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("single.csv");
    let metrics = Metrics::new();

    write_append_target(&path, 5, &metrics).await.unwrap();

    let text = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(
        text,
        "id,value\n1,value_1\n2,value_2\n3,value_3\n4,value_4\n5,value_5\n"
    );
    assert_eq!(text.lines().count(), 6);
    assert_eq!(metrics.snapshot().appends, 5);
}

#[tokio::test]
async fn test_append_runs_start_from_scratch() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("single.csv");
    let metrics = Metrics::new();

    append_single_file(&path, 10, 3, &metrics).await.unwrap();
    let first = tokio::fs::read(&path).await.unwrap();
    append_single_file(&path, 10, 3, &metrics).await.unwrap();
    let second = tokio::fs::read(&path).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(String::from_utf8(second).unwrap().lines().count(), 11);
    assert_eq!(metrics.snapshot().appends, 60);
}

#[tokio::test]
async fn test_small_files_written_and_read() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_for(&temp_dir);
    let metrics = Metrics::new();

    write_small_files(&workspace, "small", 6, 5, &metrics).await.unwrap();
    write_small_files(&workspace, "small", 6, 5, &metrics).await.unwrap();

    for i in 0..6 {
        let text = tokio::fs::read_to_string(workspace.small_file("small", i)).await.unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.ends_with("5,value_5\n"));
    }

    let one_file = tokio::fs::metadata(workspace.small_file("small", 0)).await.unwrap().len();
    let bytes = read_small_files(&workspace, 6, 3, &metrics).await.unwrap();
    assert_eq!(bytes, one_file * 6 * 3);
    assert_eq!(metrics.snapshot().files_written, 12);
    assert_eq!(metrics.snapshot().files_read, 18);
}

#[tokio::test]
async fn test_missing_small_file_fails_read() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_for(&temp_dir);
    let metrics = Metrics::new();

    write_small_files(&workspace, "small", 2, 1, &metrics).await.unwrap();
    let err = read_small_files(&workspace, 3, 1, &metrics).await.unwrap_err();

    match err {
        Error::FanOut { member, source } => {
            assert!(member.ends_with("small_2.csv"));
            assert!(source.is_io());
        }
        other => panic!("expected FanOut error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_large_files_have_exact_size() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_for(&temp_dir);
    let metrics = Metrics::new();
    let size = 2 * MIB as u64 + 100;

    write_large_files(&workspace, 3, size, MIB, 16 * 1024, &metrics).await.unwrap();

    for i in 0..3 {
        let len = tokio::fs::metadata(workspace.large_file(i)).await.unwrap().len();
        assert_eq!(len, size);
    }
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.chunks_submitted, 9);
    assert_eq!(snapshot.bytes_written, 3 * size);

    let read = read_large_files(&workspace.large_files_dir, MIB, &metrics).await.unwrap();
    assert_eq!(read, 3 * size);
}

#[tokio::test]
async fn test_store_phases_on_tiny_files() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_for(&temp_dir);
    let metrics = Metrics::new();

    write_large_files(&workspace, 3, 2 * MIB as u64 + 100, MIB, 16 * 1024, &metrics)
        .await
        .unwrap();

    let rows = ingest_large_files(&workspace, 2, MIB, StoreOptions::default(), &metrics)
        .await
        .unwrap();
    assert_eq!(rows, 6);
    assert!(workspace.store_file(0).exists());
    assert!(workspace.store_file(1).exists());
    assert!(!workspace.store_file(2).exists());

    // Clearing first makes a re-ingestion start from empty stores.
    clear_stores(&workspace, 2).await.unwrap();
    assert!(!workspace.store_file(0).exists());
    let rows = ingest_large_files(&workspace, 2, MIB, StoreOptions::default(), &metrics)
        .await
        .unwrap();
    assert_eq!(rows, 6);

    let counted = count_store_rows(&workspace.store_dir, 3, &metrics).await.unwrap();
    assert_eq!(counted, 6);
    assert_eq!(metrics.snapshot().count_queries, 6);

    let bytes = random_store_reads(&workspace.store_dir, 5, &metrics).await.unwrap();
    assert!(bytes >= 10 * 100);
    assert!(bytes <= 10 * MIB as u64);
    assert_eq!(metrics.snapshot().point_reads, 10);
}

#[tokio::test]
async fn test_store_phases_without_stores() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace_for(&temp_dir);
    tokio::fs::create_dir_all(&workspace.large_files_dir).await.unwrap();
    tokio::fs::create_dir_all(&workspace.store_dir).await.unwrap();
    let metrics = Metrics::new();

    assert_eq!(
        ingest_large_files(&workspace, 10, MIB, StoreOptions::default(), &metrics)
            .await
            .unwrap(),
        0
    );
    assert_eq!(count_store_rows(&workspace.store_dir, 2, &metrics).await.unwrap(), 0);
    assert_eq!(random_store_reads(&workspace.store_dir, 5, &metrics).await.unwrap(), 0);
}

#[tokio::test]
async fn test_archive_outputs_written() {
    let temp_dir = TempDir::new().unwrap();
    let config = tiny_config(temp_dir.path());
    let workspace = Workspace::from_config(&config.workspace);
    let metrics = Metrics::new();

    write_small_files(&workspace, "small", 3, 2, &metrics).await.unwrap();
    write_large_files(&workspace, 3, 4096, 1024, 512, &metrics).await.unwrap();
    ingest_large_files(&workspace, 2, 1024, StoreOptions::default(), &metrics)
        .await
        .unwrap();

    let reports = archive_outputs(&workspace, &config.archive, &metrics).await.unwrap();

    let names: Vec<String> = reports
        .iter()
        .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["small_files.zip", "large_csv_2.zip", "db_files_1.zip"]);
    for report in &reports {
        let len = tokio::fs::metadata(&report.path).await.unwrap().len();
        assert_eq!(len, report.bytes);
        assert!(len > 0);
    }
    assert_eq!(metrics.snapshot().archives_written, 3);
}

#[tokio::test]
async fn test_cleanup_removes_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("bench");
    let workspace = Workspace::from_config(&tiny_config(&root).workspace);
    write_small_files(&workspace, "small", 2, 1, &Metrics::new()).await.unwrap();
    write_append_target(&workspace.append_file, 3, &Metrics::new()).await.unwrap();

    phases::cleanup(&workspace).await.unwrap();
    assert!(!root.exists());

    // Nothing left to remove is not an error.
    phases::cleanup(&workspace).await.unwrap();
}

#[tokio::test]
async fn test_cleanup_keeps_unrelated_files() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = PhaseContext::new(tiny_config(temp_dir.path()));
    let notes = temp_dir.path().join("notes.txt");
    tokio::fs::write(&notes, b"not benchmark data").await.unwrap();

    let selected = vec![
        "small_files_concurrent_write".to_string(),
        "large_files_stream_write".to_string(),
        "cleanup".to_string(),
    ];
    let mut driver = Driver::new();
    driver.run(select_phases(&ctx, &selected).unwrap()).await.unwrap();

    assert!(notes.exists());
    assert!(!ctx.workspace.small_files_dir.exists());
    assert!(!ctx.workspace.large_files_dir.exists());
    assert!(temp_dir.path().exists());
}

#[tokio::test]
async fn test_refill_phases_write_retest_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = tiny_config(temp_dir.path());
    let (file_count, writes, appends) = (
        config.refill.file_count,
        config.refill.writes_per_file,
        config.refill.appends,
    );
    let ctx = PhaseContext::new(config);

    let selected = vec![
        "refill_append_and_small_files".to_string(),
        "refill_small_files".to_string(),
    ];
    let mut driver = Driver::new();
    driver.run(select_phases(&ctx, &selected).unwrap()).await.unwrap();

    for i in 0..file_count {
        let path = ctx.workspace.small_file("small_retest", i);
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.lines().count() as u64, writes + 1);
        assert!(text.starts_with("id,value\n"));
    }
    assert!(!ctx.workspace.small_file("small_retest", file_count).exists());
    assert!(!ctx.workspace.small_file("small", 0).exists());

    let appended = tokio::fs::read_to_string(&ctx.workspace.append_file).await.unwrap();
    assert_eq!(appended.lines().count() as u64, appends + 1);
}

#[tokio::test]
async fn test_store_ingest_phase_reruns_from_empty_stores() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = PhaseContext::new(tiny_config(temp_dir.path()));

    let selected = vec!["large_files_stream_write".to_string(), "store_ingest".to_string()];
    for _ in 0..2 {
        let mut driver = Driver::new();
        driver.run(select_phases(&ctx, &selected).unwrap()).await.unwrap();

        let store = RecordStore::open_or_create(ctx.workspace.store_file(0)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
        store.close().await.unwrap();
    }
}

#[tokio::test]
async fn test_full_run_records_every_phase() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("bench");
    let ctx = PhaseContext::new(tiny_config(&root));

    let mut driver = Driver::new();
    driver.run(standard_phases(&ctx)).await.unwrap();

    assert_eq!(driver.results().names(), PHASE_NAMES.to_vec());
    assert!(!root.exists());

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.rows_inserted, 6);
    assert_eq!(snapshot.archives_written, 3);
}

#[tokio::test]
async fn test_selected_phases_run_in_canonical_order() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = PhaseContext::new(tiny_config(temp_dir.path()));

    let selected = vec![
        "small_files_concurrent_read".to_string(),
        "small_files_concurrent_write".to_string(),
    ];
    let phases = select_phases(&ctx, &selected).unwrap();
    let names: Vec<&str> = phases.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["small_files_concurrent_write", "small_files_concurrent_read"]);

    let mut driver = Driver::new();
    driver.run(phases).await.unwrap();
    assert_eq!(driver.results().len(), 2);
}

#[tokio::test]
async fn test_unknown_phase_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = PhaseContext::new(tiny_config(temp_dir.path()));

    let err = select_phases(&ctx, &["defragment".to_string()]).unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert!(err.to_string().contains("defragment"));
}

#[tokio::test]
async fn test_failed_phase_stops_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = PhaseContext::new(tiny_config(temp_dir.path()));

    // Reading before anything was written fails; cleanup must not run.
    let selected = vec!["small_files_concurrent_read".to_string(), "cleanup".to_string()];
    let mut driver = Driver::new();
    let err = driver.run(select_phases(&ctx, &selected).unwrap()).await.unwrap_err();

    assert_eq!(err.phase_name(), Some("small_files_concurrent_read"));
    assert!(err.root_cause().is_io());
    assert!(driver.results().is_empty());
    assert!(temp_dir.path().exists());
}
