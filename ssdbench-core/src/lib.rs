//! # ssdbench Core
//!
//! Building blocks shared by the storage primitives and the phase runner:
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  ssdbench-core                  │
//! ├─────────────────────────────────────────────────┤
//! │  • error    - Error taxonomy                    │
//! │  • config   - Workload parameters (TOML)        │
//! │  • metrics  - I/O counters & timers             │
//! │  • utils    - CSV rows, byte formatting         │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod utils;

// Re-export commonly used types
pub use config::BenchConfig;
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot, Timer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chunk size for streamed transfers and store rows
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
