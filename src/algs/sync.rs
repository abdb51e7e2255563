//! Per-iteration synchronization protocol.
//!
//! Every participant of a run (a worker thread, the MPI master, an MPI
//! worker) executes the same state machine:
//!
//! ```text
//! COMPUTING -> COMMITTING -> EVALUATING -> BROADCASTING -> { COMPUTING | TERMINATED }
//! ```
//!
//! EVALUATING is performed by the coordinator only; other participants go
//! from COMMITTING straight to BROADCASTING, where they block until the
//! coordinator's decision reaches them. The coordinator starts in EVALUATING
//! (the loaded field may already be converged), everyone else starts in
//! BROADCASTING.
//!
//! A [`Transport`] supplies the blocking primitives for one participant. The
//! two realizations live in [`crate::algs::shared`] (barrier over shared
//! memory) and [`crate::algs::distributed`] (messages over a
//! [`Communicator`](crate::algs::communicator::Communicator)).

use std::fmt;

use crate::algs::convergence::MaxMin;
use crate::algs::relax::Relaxation;
use crate::amr_error::AmrError;

/// Continue/terminate decision published at BROADCASTING.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Continue,
    Terminate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncState {
    Computing,
    Committing,
    Evaluating,
    Broadcasting,
    Terminated,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Computing => "COMPUTING",
            SyncState::Committing => "COMMITTING",
            SyncState::Evaluating => "EVALUATING",
            SyncState::Broadcasting => "BROADCASTING",
            SyncState::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// Blocking primitives one participant needs to run [`drive`].
///
/// Contract, per iteration:
/// - `compute` reads only the committed field and writes only this
///   participant's own slice of "next";
/// - `gather` returns on the coordinator only once every participant's slice
///   has been committed into its current field;
/// - `broadcast` returns on a non-coordinator only once the decision for the
///   just-evaluated field is visible, and, on `Continue`, the committed field
///   is readable by `compute`.
pub trait Transport {
    /// Participant index, used in log lines and error reports.
    fn rank(&self) -> usize;

    /// True for the single participant that commits, evaluates and decides.
    fn is_coordinator(&self) -> bool;

    /// Rendezvous of all participants.
    fn barrier(&mut self) -> Result<(), AmrError>;

    /// COMPUTING: relax this participant's owned range into its "next" slice.
    fn compute(&mut self, kernel: &Relaxation<'_>) -> Result<(), AmrError>;

    /// COMMITTING: hand partial updates to the coordinator, which exposes
    /// them as the new current field.
    fn gather(&mut self) -> Result<(), AmrError>;

    /// EVALUATING: extrema of the coordinator's committed field.
    fn evaluate(&self) -> MaxMin;

    /// BROADCASTING: the coordinator passes `Some(decision)`, every other
    /// participant passes `None`; all return the decision now in force.
    fn broadcast(&mut self, decision: Option<Decision>) -> Result<Decision, AmrError>;
}

/// What one participant reports once it reaches TERMINATED.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticipantOutcome {
    /// Iterations this participant completed. Identical on every participant
    /// of a run, since nobody can pass BROADCASTING ahead of the others.
    pub iterations: u64,
    /// Final extrema; only the coordinator has them.
    pub extrema: Option<MaxMin>,
}

/// Stopping parameters evaluated by the coordinator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StopRule {
    pub epsilon: f64,
    pub max_iterations: Option<u64>,
}

/// Run the protocol to TERMINATED on one participant.
///
/// A coordinator-side failure (non-finite field, iteration cap) is still
/// broadcast as `Terminate` before the error is returned, so no participant
/// is left blocked.
pub fn drive<T: Transport>(
    transport: &mut T,
    kernel: &Relaxation<'_>,
    stop: StopRule,
) -> Result<ParticipantOutcome, AmrError> {
    let coordinator = transport.is_coordinator();
    let rank = transport.rank();
    transport.barrier()?;

    let mut iterations = 0u64;
    let mut extrema = None;
    let mut pending: Option<Decision> = None;
    let mut failure: Option<AmrError> = None;
    let mut state = if coordinator {
        SyncState::Evaluating
    } else {
        SyncState::Broadcasting
    };

    loop {
        let next = match state {
            SyncState::Computing => {
                transport.compute(kernel)?;
                SyncState::Committing
            }
            SyncState::Committing => {
                transport.gather()?;
                iterations += 1;
                if coordinator {
                    SyncState::Evaluating
                } else {
                    SyncState::Broadcasting
                }
            }
            SyncState::Evaluating => {
                let mm = transport.evaluate();
                extrema = Some(mm);
                let decision = match mm.check_finite(iterations) {
                    Err(e) => {
                        failure = Some(e);
                        Decision::Terminate
                    }
                    Ok(()) if mm.is_converged(stop.epsilon) => Decision::Terminate,
                    Ok(()) => match stop.max_iterations {
                        Some(limit) if iterations >= limit => {
                            failure = Some(AmrError::IterationLimit {
                                limit,
                                max: mm.max,
                                min: mm.min,
                            });
                            Decision::Terminate
                        }
                        _ => Decision::Continue,
                    },
                };
                pending = Some(decision);
                SyncState::Broadcasting
            }
            SyncState::Broadcasting => match transport.broadcast(pending.take())? {
                Decision::Continue => SyncState::Computing,
                Decision::Terminate => SyncState::Terminated,
            },
            SyncState::Terminated => break,
        };
        log::trace!("[rank {rank}] iteration {iterations}: {state} -> {next}");
        state = next;
    }

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(ParticipantOutcome {
        iterations,
        extrema,
    })
}

/// Check that every participant finished with the coordinator's count.
///
/// `outcomes[0]` must be the coordinator's.
pub fn check_lockstep(outcomes: &[(usize, u64)]) -> Result<u64, AmrError> {
    let Some(&(_, expected)) = outcomes.first() else {
        return Err(AmrError::InvalidWorkerCount(0));
    };
    for &(worker, found) in &outcomes[1..] {
        if found != expected {
            return Err(AmrError::LockstepViolation {
                worker,
                expected,
                found,
            });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dsv::DsvBuffers;
    use crate::topology::mesh::{Mesh, MeshBuilder};

    /// Single-participant transport: the coordinator computes everything itself.
    struct Solo {
        buffers: DsvBuffers,
        log: Vec<&'static str>,
    }

    impl Transport for Solo {
        fn rank(&self) -> usize {
            0
        }
        fn is_coordinator(&self) -> bool {
            true
        }
        fn barrier(&mut self) -> Result<(), AmrError> {
            self.log.push("barrier");
            Ok(())
        }
        fn compute(&mut self, kernel: &Relaxation<'_>) -> Result<(), AmrError> {
            self.log.push("compute");
            let (cur, next) = self.buffers.split();
            kernel.relax_all(cur, next);
            Ok(())
        }
        fn gather(&mut self) -> Result<(), AmrError> {
            self.log.push("gather");
            self.buffers.commit();
            Ok(())
        }
        fn evaluate(&self) -> MaxMin {
            MaxMin::of(self.buffers.current())
        }
        fn broadcast(&mut self, decision: Option<Decision>) -> Result<Decision, AmrError> {
            self.log.push("broadcast");
            Ok(decision.expect("coordinator always decides"))
        }
    }

    fn two_boxes() -> Mesh {
        let mut b = MeshBuilder::new();
        b.push_box(4.0, [(1, 2.0)]);
        b.push_box(4.0, [(0, 2.0)]);
        b.build().unwrap()
    }

    fn stop(epsilon: f64) -> StopRule {
        StopRule {
            epsilon,
            max_iterations: None,
        }
    }

    #[test]
    fn converged_field_terminates_before_computing() {
        let mesh = two_boxes();
        let mut t = Solo {
            buffers: DsvBuffers::new(vec![2.0, 2.0]),
            log: vec![],
        };
        let out = drive(&mut t, &Relaxation::new(&mesh, 0.5), stop(0.0)).unwrap();
        assert_eq!(out.iterations, 0);
        assert_eq!(t.log, vec!["barrier", "broadcast"]);
    }

    #[test]
    fn one_iteration_visits_every_state_in_order() {
        let mesh = two_boxes();
        let mut t = Solo {
            buffers: DsvBuffers::new(vec![10.0, 0.0]),
            log: vec![],
        };
        // after one step the field is [7.5, 2.5] with relative spread 2/3
        let out = drive(&mut t, &Relaxation::new(&mesh, 0.5), stop(0.7)).unwrap();
        assert_eq!(out.iterations, 1);
        assert_eq!(out.extrema, Some(MaxMin { max: 7.5, min: 2.5 }));
        assert_eq!(
            t.log,
            vec!["barrier", "broadcast", "compute", "gather", "broadcast"]
        );
    }

    #[test]
    fn iteration_cap_is_an_error() {
        let mesh = two_boxes();
        let mut t = Solo {
            buffers: DsvBuffers::new(vec![10.0, 0.0]),
            log: vec![],
        };
        let rule = StopRule {
            epsilon: 1e-12,
            max_iterations: Some(2),
        };
        let err = drive(&mut t, &Relaxation::new(&mesh, 0.5), rule).unwrap_err();
        assert!(matches!(err, AmrError::IterationLimit { limit: 2, .. }));
        assert_eq!(t.log.iter().filter(|&&s| s == "compute").count(), 2);
    }

    #[test]
    fn lockstep_counts_compared() {
        assert_eq!(check_lockstep(&[(0, 4), (1, 4), (2, 4)]), Ok(4));
        assert_eq!(
            check_lockstep(&[(0, 4), (1, 3)]),
            Err(AmrError::LockstepViolation {
                worker: 1,
                expected: 4,
                found: 3
            })
        );
    }
}
