//! # Configuration Management
//!
//! Workload parameters for every benchmark phase. Phase constants (file
//! counts, iteration counts, byte sizes) live here instead of in the phase
//! code so that the same phase library serves both the full run and
//! smaller smoke runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::DEFAULT_CHUNK_SIZE;

const GIB: u64 = 1024 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub workspace: WorkspaceConfig,
    pub append: AppendConfig,
    pub small_files: SmallFilesConfig,
    pub large_files: LargeFilesConfig,
    pub store: StoreConfig,
    pub refill: RefillConfig,
    pub archive: ArchiveConfig,
}

impl BenchConfig {
    /// Load configuration from a TOML file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Configuration {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: BenchConfig = toml::from_str(raw).map_err(|e| Error::Configuration {
            message: format!("Invalid config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Small preset that exercises every phase in seconds instead of hours.
    pub fn quick() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            append: AppendConfig {
                appends: 500,
                iterations: 2,
            },
            small_files: SmallFilesConfig {
                file_count: 50,
                writes_per_file: 20,
                read_rounds: 5,
            },
            large_files: LargeFilesConfig {
                file_count: 4,
                file_size: 8 * 1024 * 1024,
                chunk_size: DEFAULT_CHUNK_SIZE,
                high_water_mark: 16 * 1024,
            },
            store: StoreConfig {
                files_to_convert: 2,
                chunk_size: DEFAULT_CHUNK_SIZE,
                count_rounds: 5,
                random_reads_per_store: 10,
                wal_journal: false,
            },
            refill: RefillConfig {
                appends: 200,
                iterations: 2,
                file_count: 50,
                writes_per_file: 10,
            },
            archive: ArchiveConfig::default(),
        }
    }

    /// Reject parameter combinations that would make a phase meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.large_files.chunk_size == 0 {
            return Err(Error::Configuration {
                message: "large_files.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.large_files.high_water_mark == 0 {
            return Err(Error::Configuration {
                message: "large_files.high_water_mark must be greater than zero".to_string(),
            });
        }
        if self.store.chunk_size == 0 {
            return Err(Error::Configuration {
                message: "store.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.archive.compression_level > 9 {
            return Err(Error::Configuration {
                message: format!(
                    "archive.compression_level must be 0..=9, got {}",
                    self.archive.compression_level
                ),
            });
        }
        Ok(())
    }
}

/// Directory layout under the workspace root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub append_file: PathBuf,
    pub small_files_dir: PathBuf,
    pub large_files_dir: PathBuf,
    pub store_dir: PathBuf,
    pub archive_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./test_data"),
            append_file: PathBuf::from("step1_single.csv"),
            small_files_dir: PathBuf::from("step2_smallfiles"),
            large_files_dir: PathBuf::from("step4_large_csv"),
            store_dir: PathBuf::from("step6_db"),
            archive_dir: PathBuf::from("compressed"),
        }
    }
}

/// Single append-target file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    /// Rows appended per run, one open/write/close each
    pub appends: u64,
    /// Fresh runs whose append loop time is averaged
    pub iterations: u32,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            appends: 50_000,
            iterations: 3,
        }
    }
}

/// Pool of many small text files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallFilesConfig {
    pub file_count: usize,
    pub writes_per_file: u64,
    pub read_rounds: u32,
}

impl Default for SmallFilesConfig {
    fn default() -> Self {
        Self {
            file_count: 1000,
            writes_per_file: 300,
            read_rounds: 100,
        }
    }
}

/// Pool of large streamed files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LargeFilesConfig {
    pub file_count: usize,
    pub file_size: u64,
    pub chunk_size: usize,
    /// Buffered bytes at which a file sink reports saturation
    pub high_water_mark: usize,
}

impl Default for LargeFilesConfig {
    fn default() -> Self {
        Self {
            file_count: 400,
            file_size: GIB,
            chunk_size: DEFAULT_CHUNK_SIZE,
            high_water_mark: 16 * 1024,
        }
    }
}

/// Record store ingestion and queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub files_to_convert: usize,
    pub chunk_size: usize,
    pub count_rounds: u32,
    pub random_reads_per_store: u32,
    /// Open ingestion stores in WAL mode with `synchronous=NORMAL` instead
    /// of SQLite's rollback journal and full sync
    pub wal_journal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            files_to_convert: 10,
            chunk_size: DEFAULT_CHUNK_SIZE,
            count_rounds: 100,
            random_reads_per_store: 100,
            wal_journal: false,
        }
    }
}

/// Small-write workload repeated once the device is partially full
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefillConfig {
    pub appends: u64,
    pub iterations: u32,
    pub file_count: usize,
    pub writes_per_file: u64,
}

impl Default for RefillConfig {
    fn default() -> Self {
        Self {
            appends: 50_000,
            iterations: 5,
            file_count: 1000,
            writes_per_file: 50,
        }
    }
}

/// Archival compression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub compression_level: u32,
    pub large_file_prefix: usize,
    pub store_file_prefix: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 9,
            large_file_prefix: 5,
            store_file_prefix: 5,
        }
    }
}
