//! Fail-fast concurrent fan-out.
//!
//! Members are launched together on the runtime and joined in completion
//! order. The first member error ends the join and is returned as
//! [`Error::FanOut`] naming that member; members still in flight are aborted
//! when the fan-out is dropped. Completion order between members is
//! unspecified.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::debug;

use ssdbench_core::error::{Error, Result};

/// A set of independent sub-tasks joined as one unit.
pub struct FanOut<T> {
    label: String,
    set: JoinSet<(String, Result<T>)>,
    launched: usize,
}

impl<T: Send + 'static> FanOut<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            set: JoinSet::new(),
            launched: 0,
        }
    }

    /// Launch `task` immediately under the given member name.
    pub fn spawn<F>(&mut self, member: impl Into<String>, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let member = member.into();
        self.set.spawn(async move { (member, task.await) });
        self.launched += 1;
    }

    pub fn len(&self) -> usize {
        self.launched
    }

    pub fn is_empty(&self) -> bool {
        self.launched == 0
    }

    /// Wait for every member, or for the first failure.
    ///
    /// Outputs are returned in completion order.
    pub async fn join(mut self) -> Result<Vec<T>> {
        let mut outputs = Vec::with_capacity(self.launched);

        while let Some(joined) = self.set.join_next().await {
            match joined {
                Ok((_, Ok(value))) => outputs.push(value),
                Ok((member, Err(e))) => {
                    debug!(
                        fan_out = %self.label,
                        member = %member,
                        outstanding = self.set.len(),
                        "Fan-out member failed"
                    );
                    return Err(Error::FanOut {
                        member,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    return Err(Error::Internal {
                        message: format!("fan-out '{}' member task failed: {}", self.label, e),
                    });
                }
            }
        }

        Ok(outputs)
    }
}

/// Launch every `(member, task)` pair concurrently and join them fail-fast.
pub async fn fan_out<T, F, I>(label: &str, members: I) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
    I: IntoIterator<Item = (String, F)>,
{
    let mut fan = FanOut::new(label);
    for (member, task) in members {
        fan.spawn(member, task);
    }
    fan.join().await
}
