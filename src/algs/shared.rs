//! Shared-memory realization: a fixed team of OS threads and one reusable
//! barrier.
//!
//! Worker 0 is the coordinator. Per iteration every worker passes the barrier
//! twice:
//!
//! 1. at the end of COMPUTING (inside [`Transport::gather`]); the coordinator
//!    then commits and evaluates while everyone else already waits at
//! 2. the BROADCASTING barrier, after which the decision is read from shared
//!    memory.
//!
//! "current" sits behind an `RwLock` that is only write-locked by the
//! coordinator between the two barriers. "next" is split into one slot per
//! worker, each behind its own `Mutex` that only its owner locks during
//! COMPUTING, so neither lock is ever contended inside a phase. Commit swaps
//! each slot with its range of "current", which is the per-range form of the
//! current/next role swap.

use std::sync::{Arc, Barrier};

use parking_lot::{Mutex, RwLock};

use crate::algs::convergence::MaxMin;
use crate::algs::partition::{WorkerAssignment, partition};
use crate::algs::relax::Relaxation;
use crate::algs::sync::{Decision, ParticipantOutcome, StopRule, Transport, check_lockstep, drive};
use crate::amr_error::AmrError;
use crate::data::dsv::check_field_len;
use crate::topology::mesh::Mesh;

/// State shared by every thread of the team for one run.
#[derive(Debug)]
pub struct SharedField {
    current: RwLock<Vec<f64>>,
    next: Vec<Mutex<Vec<f64>>>,
    assignments: Vec<WorkerAssignment>,
    decision: Mutex<Decision>,
}

impl SharedField {
    pub fn new(initial: Vec<f64>, workers: usize) -> Result<Self, AmrError> {
        let assignments = partition(initial.len(), workers)?;
        let next = assignments
            .iter()
            .map(|a| Mutex::new(initial[a.range()].to_vec()))
            .collect();
        Ok(Self {
            current: RwLock::new(initial),
            next,
            assignments,
            decision: Mutex::new(Decision::Continue),
        })
    }

    pub fn workers(&self) -> usize {
        self.assignments.len()
    }

    pub fn assignment(&self, worker: usize) -> WorkerAssignment {
        self.assignments[worker]
    }

    /// Swap every worker's "next" slot into its range of "current".
    fn commit(&self) {
        let mut current = self.current.write();
        for (slot, a) in self.next.iter().zip(&self.assignments) {
            current[a.range()].swap_with_slice(&mut slot.lock());
        }
    }

    pub fn into_current(self) -> Vec<f64> {
        self.current.into_inner()
    }
}

/// One worker thread's view of the team.
pub struct ThreadTransport<'a> {
    worker: usize,
    field: &'a SharedField,
    barrier: &'a Barrier,
}

impl<'a> ThreadTransport<'a> {
    pub fn new(worker: usize, field: &'a SharedField, barrier: &'a Barrier) -> Self {
        Self {
            worker,
            field,
            barrier,
        }
    }
}

impl Transport for ThreadTransport<'_> {
    fn rank(&self) -> usize {
        self.worker
    }

    fn is_coordinator(&self) -> bool {
        self.worker == 0
    }

    fn barrier(&mut self) -> Result<(), AmrError> {
        self.barrier.wait();
        Ok(())
    }

    fn compute(&mut self, kernel: &Relaxation<'_>) -> Result<(), AmrError> {
        let owned = self.field.assignment(self.worker);
        if owned.is_empty() {
            return Ok(());
        }
        let current = self.field.current.read();
        let mut slot = self.field.next[self.worker].lock();
        kernel.relax_range(&current, owned, &mut slot);
        Ok(())
    }

    fn gather(&mut self) -> Result<(), AmrError> {
        self.barrier.wait();
        if self.is_coordinator() {
            self.field.commit();
        }
        Ok(())
    }

    fn evaluate(&self) -> MaxMin {
        MaxMin::of(&self.field.current.read())
    }

    fn broadcast(&mut self, decision: Option<Decision>) -> Result<Decision, AmrError> {
        if let Some(d) = decision {
            *self.field.decision.lock() = d;
        }
        self.barrier.wait();
        Ok(*self.field.decision.lock())
    }
}

/// Reusable barrier, rebuilt only when the team size changes.
#[derive(Debug, Default)]
pub struct BarrierPool {
    cached: Option<(usize, Arc<Barrier>)>,
}

impl BarrierPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, workers: usize) -> Arc<Barrier> {
        match &self.cached {
            Some((n, b)) if *n == workers => Arc::clone(b),
            _ => {
                log::debug!("building barrier for {workers} workers");
                let b = Arc::new(Barrier::new(workers));
                self.cached = Some((workers, Arc::clone(&b)));
                b
            }
        }
    }

    /// Team size of the cached barrier, if any.
    pub fn workers(&self) -> Option<usize> {
        self.cached.as_ref().map(|(n, _)| *n)
    }
}

/// Outcome of a threaded run: coordinator result plus the final field.
#[derive(Clone, Debug, PartialEq)]
pub struct SharedRun {
    pub iterations: u64,
    pub extrema: MaxMin,
    pub field: Vec<f64>,
}

/// Run the barrier-synchronized team to termination.
///
/// `barrier` must have been built for exactly `workers` participants.
pub fn run_team(
    mesh: &Mesh,
    initial: Vec<f64>,
    affect_rate: f64,
    stop: StopRule,
    workers: usize,
    barrier: &Barrier,
) -> Result<SharedRun, AmrError> {
    check_field_len(mesh.len(), &initial)?;
    let field = SharedField::new(initial, workers)?;
    let kernel = Relaxation::new(mesh, affect_rate);

    let results: Vec<Result<ParticipantOutcome, AmrError>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let field = &field;
                let kernel = &kernel;
                s.spawn(move || {
                    let mut t = ThreadTransport::new(w, field, barrier);
                    drive(&mut t, kernel, stop)
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(w, h)| h.join().unwrap_or(Err(AmrError::WorkerPanicked(w))))
            .collect()
    });

    let mut counts = Vec::with_capacity(workers);
    let mut extrema = None;
    for (w, r) in results.into_iter().enumerate() {
        let outcome = r?;
        if w == 0 {
            extrema = outcome.extrema;
        }
        counts.push((w, outcome.iterations));
    }
    let iterations = check_lockstep(&counts)?;
    let extrema = extrema.ok_or(AmrError::WorkerPanicked(0))?;
    Ok(SharedRun {
        iterations,
        extrema,
        field: field.into_current(),
    })
}

static_assertions::assert_impl_all!(SharedField: Send, Sync);
