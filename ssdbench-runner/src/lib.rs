//! # ssdbench Runner
//!
//! Sequences benchmark phases, times them, and reports the results.
//!
//! ```text
//! ┌──────────┐   Vec<Phase>   ┌────────┐  PhaseResults  ┌──────────┐
//! │  phases  │ ─────────────► │ Driver │ ─────────────► │ Reporter │
//! └──────────┘                └────────┘                └──────────┘
//!      │ fan-out phases
//!      ▼
//!  FanOut::spawn ×N ──► join (fail-fast)
//! ```

pub mod driver;
pub mod fanout;
pub mod phases;
pub mod report;

pub use driver::{Driver, Phase, PhaseFuture, PhaseResults};
pub use fanout::{fan_out, FanOut};
pub use phases::{select_phases, standard_phases, PhaseContext, Workspace, PHASE_NAMES};
pub use report::Reporter;
