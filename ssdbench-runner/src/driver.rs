//! # Phase Driver
//!
//! Runs named phases strictly in order and records each phase's wall time.
//!
//! ```text
//!  phases: [A, B, C]
//!
//!  A ──ok──► record(A) ──► B ──err──► stop, Error::Phase { "B", cause }
//!                                      results = { A }
//! ```
//!
//! A phase's entry is written only after its action completed successfully.
//! The driver is the only writer of the result map.
//!
//! A phase may carry an untimed setup step (removing stale artifacts). It
//! runs to completion before the phase's timer starts.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, error, info};

use ssdbench_core::{
    error::{Error, Result},
    metrics::Timer,
};

pub type PhaseFuture = BoxFuture<'static, Result<()>>;

type PhaseAction = Box<dyn FnOnce() -> PhaseFuture + Send>;

/// One named, timed unit of benchmark work.
pub struct Phase {
    name: String,
    setup: Option<PhaseAction>,
    action: PhaseAction,
}

impl Phase {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            setup: None,
            action: Box::new(move || action().boxed()),
        }
    }

    /// Phase whose `setup` runs before timing starts.
    pub fn with_setup<S, SFut, F, Fut>(name: impl Into<String>, setup: S, action: F) -> Self
    where
        S: FnOnce() -> SFut + Send + 'static,
        SFut: Future<Output = Result<()>> + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            setup: Some(Box::new(move || setup().boxed())),
            ..Self::new(name, action)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase").field("name", &self.name).finish()
    }
}

/// Phase name ─► elapsed duration, in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseResults {
    entries: Vec<(String, Duration)>,
}

impl PhaseResults {
    fn record(&mut self, name: String, duration: Duration) {
        self.entries.push((name, duration));
    }

    /// Elapsed seconds for `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.duration(name).map(|d| d.as_secs_f64())
    }

    pub fn duration(&self, name: &str) -> Option<Duration> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| *d)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// (name, seconds) in the order the phases ran
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_secs_f64()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn total(&self) -> Duration {
        self.entries.iter().map(|(_, d)| *d).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sequential phase scheduler.
#[derive(Debug, Default)]
pub struct Driver {
    results: PhaseResults,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `phases` in order. Stops at the first failure and returns it
    /// wrapped in [`Error::Phase`]; results of earlier phases stay available
    /// through [`Driver::results`].
    pub async fn run(&mut self, phases: Vec<Phase>) -> Result<()> {
        let mut seen: HashSet<&str> = self.results.entries.iter().map(|(n, _)| n.as_str()).collect();
        for phase in &phases {
            if !seen.insert(phase.name()) {
                return Err(Error::Configuration {
                    message: format!("duplicate phase name '{}'", phase.name()),
                });
            }
        }

        for Phase { name, setup, action } in phases {
            if let Some(setup) = setup {
                debug!(phase = %name, "Preparing phase");
                if let Err(e) = run_task(setup()).await {
                    return Err(phase_failed(name, e));
                }
            }

            info!("===== [{}] start =====", name);
            let timer = Timer::new(name.clone());

            match run_task(action()).await {
                Ok(()) => {
                    let duration = timer.stop();
                    info!(
                        phase = %name,
                        duration_secs = duration.as_secs_f64(),
                        "===== [{}] done: {:.3}s =====",
                        name,
                        duration.as_secs_f64()
                    );
                    self.results.record(name, duration);
                }
                Err(e) => return Err(phase_failed(name, e)),
            }
        }

        Ok(())
    }

    pub fn results(&self) -> &PhaseResults {
        &self.results
    }

    pub fn into_results(self) -> PhaseResults {
        self.results
    }
}

/// Spawned so a panicking phase surfaces as an error instead of unwinding
/// through the driver.
async fn run_task(task: PhaseFuture) -> Result<()> {
    match tokio::spawn(task).await {
        Ok(result) => result,
        Err(e) => Err(Error::Internal {
            message: format!("phase task aborted: {}", e),
        }),
    }
}

fn phase_failed(name: String, e: Error) -> Error {
    error!(phase = %name, code = e.error_code(), error = %e, "Phase failed");
    Error::Phase {
        phase: name,
        source: Box::new(e),
    }
}
