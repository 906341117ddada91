//! Console rendering of phase results.

use std::fmt::Write;

use ssdbench_core::error::Error;
use ssdbench_core::utils::format_secs;

use crate::driver::PhaseResults;

pub struct Reporter;

impl Reporter {
    /// One `<name>: <seconds>s` line per completed phase, in run order,
    /// followed by the total.
    pub fn render(results: &PhaseResults) -> String {
        let mut out = String::from("===== Phase durations (seconds) =====\n");
        for name in results.names() {
            if let Some(duration) = results.duration(name) {
                let _ = writeln!(out, "{}: {}", name, format_secs(duration));
            }
        }
        let _ = writeln!(out, "total: {}", format_secs(results.total()));
        out
    }

    /// Failing phase and underlying cause.
    pub fn render_failure(error: &Error) -> String {
        match error {
            Error::Phase { phase, source } => format!(
                "Phase '{}' failed [{}]: {}",
                phase,
                source.root_cause().error_code(),
                source
            ),
            other => format!("Run failed [{}]: {}", other.error_code(), other),
        }
    }
}
