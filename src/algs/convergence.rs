//! Global extrema and the stopping predicate.
//!
//! A run stops once the relative spread of the committed field is within
//! `epsilon`. The relative spread is `(max - min) / max`, with explicit edge
//! cases:
//!
//! - a spread of exactly zero (uniform field, including all zeros) is
//!   converged, so no division happens;
//! - `max == 0` with a nonzero spread is `+inf`, never converged;
//! - a NaN or infinite extremum is an error, never "converged".
//!
//! A negative `max` gives a negative relative spread, so an all-negative
//! field passes any `epsilon >= 0`.

use serde::{Deserialize, Serialize};

use crate::amr_error::AmrError;

/// `{max, min}` over the committed field.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaxMin {
    pub max: f64,
    pub min: f64,
}

impl MaxMin {
    /// One pass over `values`. An empty slice yields `{-inf, +inf}`.
    ///
    /// NaN entries propagate into the result so [`check_finite`](Self::check_finite)
    /// can reject them.
    pub fn of(values: &[f64]) -> Self {
        values.iter().fold(
            MaxMin {
                max: f64::NEG_INFINITY,
                min: f64::INFINITY,
            },
            |acc, &v| {
                if v.is_nan() {
                    return MaxMin { max: v, min: v };
                }
                if acc.max.is_nan() {
                    return acc;
                }
                MaxMin {
                    max: acc.max.max(v),
                    min: acc.min.min(v),
                }
            },
        )
    }

    #[inline]
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }

    /// `(max - min) / max`; zero for a uniform field, `+inf` when only `max`
    /// is zero.
    pub fn relative_spread(&self) -> f64 {
        let spread = self.spread();
        if spread == 0.0 {
            return 0.0;
        }
        if self.max == 0.0 {
            return f64::INFINITY;
        }
        spread / self.max
    }

    pub fn check_finite(&self, iterations: u64) -> Result<(), AmrError> {
        if self.max.is_finite() && self.min.is_finite() {
            Ok(())
        } else {
            Err(AmrError::NonFiniteField {
                iterations,
                max: self.max,
                min: self.min,
            })
        }
    }

    /// Stopping predicate: relative spread `<= epsilon`.
    pub fn is_converged(&self, epsilon: f64) -> bool {
        self.relative_spread() <= epsilon
    }
}

/// Extrema of `values` plus the stopping decision, failing on non-finite data.
pub fn evaluate(values: &[f64], epsilon: f64, iterations: u64) -> Result<(MaxMin, bool), AmrError> {
    let extrema = MaxMin::of(values);
    extrema.check_finite(iterations)?;
    Ok((extrema, extrema.is_converged(epsilon)))
}
