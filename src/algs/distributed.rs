//! Distributed master/worker realization over a [`Communicator`].
//!
//! Rank 0 is the master: it owns the authoritative DSV buffers, never
//! relaxes boxes itself, and is the coordinator of the protocol. Ranks
//! `1..size` are workers; worker `r` owns partition slot `r - 1` and relaxes
//! it with Rayon (the second tier of parallelism).
//!
//! Per iteration the master sends `RUN_CONTINUE` plus the whole current
//! field to every worker, then receives each worker's owned range into
//! "next" and commits. The run ends with a bare `RUN_TERMINATE` flag, which
//! workers never answer.

use crate::algs::communicator::Communicator;
use crate::algs::convergence::MaxMin;
use crate::algs::partition::{WorkerAssignment, partition};
use crate::algs::relax::Relaxation;
use crate::algs::sync::{Decision, ParticipantOutcome, StopRule, Transport, drive};
use crate::algs::wire::{self, RUN_CONTINUE, RUN_TERMINATE, WireTag};
use crate::amr_error::AmrError;
use crate::data::dsv::DsvBuffers;
use crate::topology::mesh::Mesh;

const MASTER: usize = 0;

/// Everything a worker learns during the setup phase.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerSetup {
    pub affect_rate: f64,
    pub epsilon: f64,
    pub owned: WorkerAssignment,
    pub mesh: Mesh,
}

/// Ship run parameters, `owned` and the flattened mesh to `peer`.
pub fn send_setup<C: Communicator>(
    comm: &C,
    peer: usize,
    mesh: &Mesh,
    affect_rate: f64,
    epsilon: f64,
    owned: WorkerAssignment,
) -> Result<(), AmrError> {
    wire::send_f64(comm, peer, WireTag::AffectRate, affect_rate)?;
    wire::send_f64(comm, peer, WireTag::Epsilon, epsilon)?;
    wire::send_u64(comm, peer, WireTag::BoxCount, mesh.len() as u64)?;
    wire::send_range(comm, peer, owned)?;
    wire::send_f64s(comm, peer, WireTag::Perimeters, mesh.perimeters())?;
    wire::send_usizes(comm, peer, WireTag::NeighborCounts, mesh.counts())?;
    wire::send_usizes(comm, peer, WireTag::Offsets, mesh.offsets())?;
    wire::send_f64s(comm, peer, WireTag::SelfOverlaps, mesh.self_overlaps())?;
    wire::send_u64(comm, peer, WireTag::TotalNeighbors, mesh.total_neighbors() as u64)?;
    wire::send_usizes(comm, peer, WireTag::NeighborIds, mesh.neighbor_ids())?;
    wire::send_f64s(comm, peer, WireTag::Overlaps, mesh.overlaps())?;
    Ok(())
}

/// Worker side of [`send_setup`]. The mesh is re-validated on arrival.
pub fn recv_setup<C: Communicator>(comm: &C) -> Result<WorkerSetup, AmrError> {
    let affect_rate = wire::recv_f64(comm, MASTER, WireTag::AffectRate)?;
    let epsilon = wire::recv_f64(comm, MASTER, WireTag::Epsilon)?;
    let n = wire::recv_u64(comm, MASTER, WireTag::BoxCount)? as usize;
    let owned = wire::recv_range(comm, MASTER)?;
    if owned.end > n {
        return Err(AmrError::Communication(format!(
            "owned range [{}, {}) exceeds {n} boxes",
            owned.start, owned.end
        )));
    }
    let perimeters = wire::recv_f64s(comm, MASTER, WireTag::Perimeters, n)?;
    let counts = wire::recv_usizes(comm, MASTER, WireTag::NeighborCounts, n)?;
    let offsets = wire::recv_usizes(comm, MASTER, WireTag::Offsets, n)?;
    let self_overlaps = wire::recv_f64s(comm, MASTER, WireTag::SelfOverlaps, n)?;
    let total = wire::recv_u64(comm, MASTER, WireTag::TotalNeighbors)? as usize;
    let neighbor_ids = wire::recv_usizes(comm, MASTER, WireTag::NeighborIds, total)?;
    let overlaps = wire::recv_f64s(comm, MASTER, WireTag::Overlaps, total)?;
    let mesh = Mesh::from_raw_parts(perimeters, self_overlaps, offsets, counts, neighbor_ids, overlaps)?;
    Ok(WorkerSetup {
        affect_rate,
        epsilon,
        owned,
        mesh,
    })
}

/// Coordinator end: holds the authoritative buffers.
pub struct MasterTransport<'c, C: Communicator> {
    comm: &'c C,
    buffers: DsvBuffers,
    /// `assignments[r - 1]` belongs to rank `r`.
    assignments: Vec<WorkerAssignment>,
}

impl<'c, C: Communicator> MasterTransport<'c, C> {
    pub fn new(comm: &'c C, buffers: DsvBuffers) -> Result<Self, AmrError> {
        let workers = comm.size().saturating_sub(1);
        let assignments = partition(buffers.len(), workers)?;
        Ok(Self {
            comm,
            buffers,
            assignments,
        })
    }

    pub fn assignments(&self) -> &[WorkerAssignment] {
        &self.assignments
    }

    fn peers(&self) -> impl Iterator<Item = (usize, WorkerAssignment)> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .map(|(w, &a)| (w + 1, a))
    }

    pub fn into_field(self) -> Vec<f64> {
        self.buffers.into_current()
    }
}

impl<C: Communicator> Transport for MasterTransport<'_, C> {
    fn rank(&self) -> usize {
        self.comm.rank()
    }

    fn is_coordinator(&self) -> bool {
        true
    }

    fn barrier(&mut self) -> Result<(), AmrError> {
        self.comm.barrier()
    }

    fn compute(&mut self, _kernel: &Relaxation<'_>) -> Result<(), AmrError> {
        Ok(())
    }

    fn gather(&mut self) -> Result<(), AmrError> {
        let comm = self.comm;
        let next = self.buffers.next_mut();
        for (w, a) in self.assignments.iter().enumerate() {
            wire::recv_f64s_into(comm, w + 1, WireTag::Dsv, &mut next[a.range()])?;
        }
        self.buffers.commit();
        Ok(())
    }

    fn evaluate(&self) -> MaxMin {
        MaxMin::of(self.buffers.current())
    }

    fn broadcast(&mut self, decision: Option<Decision>) -> Result<Decision, AmrError> {
        let decision = decision.unwrap_or(Decision::Terminate);
        for (peer, _) in self.peers() {
            match decision {
                Decision::Continue => {
                    wire::send_u64(self.comm, peer, WireTag::Run, RUN_CONTINUE)?;
                    wire::send_f64s(self.comm, peer, WireTag::Dsv, self.buffers.current())?;
                }
                Decision::Terminate => {
                    wire::send_u64(self.comm, peer, WireTag::Run, RUN_TERMINATE)?;
                }
            }
        }
        Ok(decision)
    }
}

/// Worker end: a private copy of the field and a scratch slice for its range.
pub struct WorkerTransport<'c, C: Communicator> {
    comm: &'c C,
    owned: WorkerAssignment,
    current: Vec<f64>,
    partial: Vec<f64>,
}

impl<'c, C: Communicator> WorkerTransport<'c, C> {
    pub fn new(comm: &'c C, n: usize, owned: WorkerAssignment) -> Self {
        Self {
            comm,
            owned,
            current: vec![0.0; n],
            partial: vec![0.0; owned.len()],
        }
    }
}

impl<C: Communicator> Transport for WorkerTransport<'_, C> {
    fn rank(&self) -> usize {
        self.comm.rank()
    }

    fn is_coordinator(&self) -> bool {
        false
    }

    fn barrier(&mut self) -> Result<(), AmrError> {
        self.comm.barrier()
    }

    fn compute(&mut self, kernel: &Relaxation<'_>) -> Result<(), AmrError> {
        kernel.par_relax_range(&self.current, self.owned, &mut self.partial);
        Ok(())
    }

    fn gather(&mut self) -> Result<(), AmrError> {
        wire::send_f64s(self.comm, MASTER, WireTag::Dsv, &self.partial)
    }

    fn evaluate(&self) -> MaxMin {
        MaxMin::of(&self.current)
    }

    fn broadcast(&mut self, _decision: Option<Decision>) -> Result<Decision, AmrError> {
        let flag = wire::recv_u64(self.comm, MASTER, WireTag::Run)?;
        if !wire::run_flag(flag)? {
            return Ok(Decision::Terminate);
        }
        wire::recv_f64s_into(self.comm, MASTER, WireTag::Dsv, &mut self.current)?;
        Ok(Decision::Continue)
    }
}

/// Master's view of a finished distributed run.
#[derive(Clone, Debug, PartialEq)]
pub struct MasterRun {
    pub iterations: u64,
    pub extrema: MaxMin,
    pub field: Vec<f64>,
}

/// Run rank 0: distribute the setup, drive the protocol, keep the field.
pub fn run_master<C: Communicator>(
    comm: &C,
    mesh: &Mesh,
    initial: Vec<f64>,
    affect_rate: f64,
    stop: StopRule,
) -> Result<MasterRun, AmrError> {
    if comm.rank() != MASTER {
        return Err(AmrError::Communication(format!(
            "run_master called on rank {}",
            comm.rank()
        )));
    }
    if comm.size() < 2 {
        return Err(AmrError::InvalidWorkerCount(0));
    }
    let buffers = DsvBuffers::for_mesh(mesh.len(), initial)?;

    let mut transport = MasterTransport::new(comm, buffers)?;
    for (peer, owned) in transport.peers() {
        log::debug!("setup rank {peer}: boxes [{}, {})", owned.start, owned.end);
        send_setup(comm, peer, mesh, affect_rate, stop.epsilon, owned)?;
    }

    let kernel = Relaxation::new(mesh, affect_rate);
    let outcome = drive(&mut transport, &kernel, stop)?;
    let extrema = outcome
        .extrema
        .ok_or_else(|| AmrError::Communication("master finished without extrema".into()))?;
    Ok(MasterRun {
        iterations: outcome.iterations,
        extrema,
        field: transport.into_field(),
    })
}

/// Run one worker rank until the master's terminate flag. Returns the
/// number of iterations this worker took part in.
pub fn run_worker<C: Communicator>(comm: &C) -> Result<u64, AmrError> {
    let setup = recv_setup(comm)?;
    log::debug!(
        "[rank {}] boxes [{}, {}) of {}, affect_rate={}, epsilon={}",
        comm.rank(),
        setup.owned.start,
        setup.owned.end,
        setup.mesh.len(),
        setup.affect_rate,
        setup.epsilon
    );
    let kernel = Relaxation::new(&setup.mesh, setup.affect_rate);
    let mut transport = WorkerTransport::new(comm, setup.mesh.len(), setup.owned);
    let stop = StopRule {
        epsilon: setup.epsilon,
        max_iterations: None,
    };
    let ParticipantOutcome { iterations, .. } = drive(&mut transport, &kernel, stop)?;
    Ok(iterations)
}
