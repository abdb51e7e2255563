use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algs::convergence::MaxMin;

/// Final report of one run.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub affect_rate: f64,
    pub epsilon: f64,
    pub iterations: u64,
    pub max: f64,
    pub min: f64,
}

impl RunResult {
    pub fn new(affect_rate: f64, epsilon: f64, iterations: u64, extrema: MaxMin) -> Self {
        Self {
            affect_rate,
            epsilon,
            iterations,
            max: extrema.max,
            min: extrema.min,
        }
    }

    pub fn extrema(&self) -> MaxMin {
        MaxMin {
            max: self.max,
            min: self.min,
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========================================")?;
        writeln!(f, "params:")?;
        writeln!(f, "=> affect_rate {:.6}", self.affect_rate)?;
        writeln!(f, "=> epsilon     {:.6}", self.epsilon)?;
        writeln!(f)?;
        writeln!(f, "results:")?;
        writeln!(f, "=> iterations {}", self.iterations)?;
        writeln!(f, "=> max-DSV    {:.6}", self.max)?;
        writeln!(f, "=> min-DSV    {:.6}", self.min)?;
        write!(f, "========================================")
    }
}
