//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::algs::sync::StopRule;
use crate::amr_error::AmrError;

/// Which synchronization realization [`Engine::run`](crate::engine::Engine::run) uses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Realization {
    /// Barrier-synchronized thread team over shared buffers.
    #[default]
    SharedMemory,
    /// Master/worker message passing, each rank simulated by a thread of
    /// this process. For real MPI runs use
    /// [`run_master`](crate::engine::run_master) / [`run_worker`](crate::engine::run_worker).
    DistributedLocal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxConfig {
    /// Blend between old value (0) and fully diffused value (1). Not clamped.
    pub affect_rate: f64,
    /// Relative convergence tolerance, `>= 0`.
    pub epsilon: f64,
    /// Compute workers: threads for shared memory, worker ranks otherwise.
    pub workers: usize,
    /// Fail with [`AmrError::IterationLimit`] after this many iterations.
    pub max_iterations: Option<u64>,
    pub realization: Realization,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            affect_rate: 0.1,
            epsilon: 0.1,
            workers: 1,
            max_iterations: None,
            realization: Realization::SharedMemory,
        }
    }
}

impl RelaxConfig {
    pub fn new(affect_rate: f64, epsilon: f64) -> Self {
        Self {
            affect_rate,
            epsilon,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    pub fn with_realization(mut self, realization: Realization) -> Self {
        self.realization = realization;
        self
    }

    pub fn validate(&self) -> Result<(), AmrError> {
        if self.workers == 0 {
            return Err(AmrError::InvalidWorkerCount(0));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(AmrError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if !self.affect_rate.is_finite() {
            return Err(AmrError::InvalidConfig(format!(
                "affect_rate must be finite, got {}",
                self.affect_rate
            )));
        }
        Ok(())
    }

    pub fn stop_rule(&self) -> StopRule {
        StopRule {
            epsilon: self.epsilon,
            max_iterations: self.max_iterations,
        }
    }
}
