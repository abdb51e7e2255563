//! Static contiguous partitioning of box indices across workers.
//!
//! Worker `w` of `k` owns `[w * (n / k), (w + 1) * (n / k))`, except the last
//! worker, whose range runs to `n` and absorbs the remainder. When `n < k`
//! every worker but the last gets an empty range; empty ranges are valid
//! no-op assignments.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::amr_error::AmrError;

/// Half-open range `[start, end)` of box indices owned by one worker.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub start: usize,
    pub end: usize,
}

impl WorkerAssignment {
    pub const EMPTY: WorkerAssignment = WorkerAssignment { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "assignment [{start}, {end}) is reversed");
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Range owned by `worker` out of `workers`, for a mesh of `n` boxes.
pub fn assignment_for(n: usize, workers: usize, worker: usize) -> WorkerAssignment {
    debug_assert!(worker < workers);
    let chunk = n / workers;
    let start = worker * chunk;
    let end = if worker + 1 == workers {
        n
    } else {
        (worker + 1) * chunk
    };
    WorkerAssignment::new(start, end)
}

/// Split `[0, n)` into `workers` contiguous, disjoint ranges ordered by worker id.
pub fn partition(n: usize, workers: usize) -> Result<Vec<WorkerAssignment>, AmrError> {
    if n == 0 {
        return Err(AmrError::EmptyMesh);
    }
    if workers == 0 {
        return Err(AmrError::InvalidWorkerCount(workers));
    }
    Ok((0..workers).map(|w| assignment_for(n, workers, w)).collect())
}
