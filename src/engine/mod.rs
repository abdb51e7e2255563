//! Engine driver: validate inputs, partition, start the chosen realization,
//! and assemble the [`RunResult`].
//!
//! Results are deterministic for a given `(mesh, affect_rate, epsilon)`.
//! Each box's update only depends on the committed field and the extrema are
//! reduced by the coordinator over the whole field, so neither the worker
//! count nor the realization changes a single bit of the outcome.

pub mod result;

pub use result::RunResult;

use crate::algs::communicator::{Communicator, LocalComm};
use crate::algs::distributed;
use crate::algs::shared::{BarrierPool, run_team};
use crate::algs::sync::check_lockstep;
use crate::amr_error::AmrError;
use crate::config::{Realization, RelaxConfig};
use crate::data::dsv::check_field_len;
use crate::topology::mesh::Mesh;

/// Runs relaxations. The only state kept between runs is the thread-team
/// barrier, rebuilt when the worker count changes.
#[derive(Debug, Default)]
pub struct Engine {
    barriers: BarrierPool,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run with the realization selected in `cfg`.
    pub fn run(
        &mut self,
        mesh: &Mesh,
        initial: Vec<f64>,
        cfg: &RelaxConfig,
    ) -> Result<RunResult, AmrError> {
        self.run_with_field(mesh, initial, cfg).map(|(r, _)| r)
    }

    /// Like [`run`](Self::run), also returning the final field.
    pub fn run_with_field(
        &mut self,
        mesh: &Mesh,
        initial: Vec<f64>,
        cfg: &RelaxConfig,
    ) -> Result<(RunResult, Vec<f64>), AmrError> {
        cfg.validate()?;
        check_field_len(mesh.len(), &initial)?;
        log::debug!(
            "relaxing {} boxes: affect_rate={} epsilon={} workers={} ({:?})",
            mesh.len(),
            cfg.affect_rate,
            cfg.epsilon,
            cfg.workers,
            cfg.realization
        );
        let (result, field) = match cfg.realization {
            Realization::SharedMemory => self.shared(mesh, initial, cfg)?,
            Realization::DistributedLocal => distributed_local(mesh, initial, cfg)?,
        };
        log::debug!(
            "finished after {} iterations: max={} min={}",
            result.iterations,
            result.max,
            result.min
        );
        Ok((result, field))
    }

    /// Barrier-synchronized thread team.
    pub fn run_shared(
        &mut self,
        mesh: &Mesh,
        initial: Vec<f64>,
        cfg: &RelaxConfig,
    ) -> Result<RunResult, AmrError> {
        let cfg = RelaxConfig {
            realization: Realization::SharedMemory,
            ..cfg.clone()
        };
        self.run(mesh, initial, &cfg)
    }

    /// Master/worker protocol with every rank on a thread of this process.
    pub fn run_distributed_local(
        &mut self,
        mesh: &Mesh,
        initial: Vec<f64>,
        cfg: &RelaxConfig,
    ) -> Result<RunResult, AmrError> {
        let cfg = RelaxConfig {
            realization: Realization::DistributedLocal,
            ..cfg.clone()
        };
        self.run(mesh, initial, &cfg)
    }

    fn shared(
        &mut self,
        mesh: &Mesh,
        initial: Vec<f64>,
        cfg: &RelaxConfig,
    ) -> Result<(RunResult, Vec<f64>), AmrError> {
        let barrier = self.barriers.get(cfg.workers);
        let run = run_team(
            mesh,
            initial,
            cfg.affect_rate,
            cfg.stop_rule(),
            cfg.workers,
            &barrier,
        )?;
        let result = RunResult::new(cfg.affect_rate, cfg.epsilon, run.iterations, run.extrema);
        Ok((result, run.field))
    }
}

fn distributed_local(
    mesh: &Mesh,
    initial: Vec<f64>,
    cfg: &RelaxConfig,
) -> Result<(RunResult, Vec<f64>), AmrError> {
    let mut world = LocalComm::world(cfg.workers + 1);
    let master_comm = world.remove(0);
    let stop = cfg.stop_rule();

    let (master, workers) = std::thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| s.spawn(move || distributed::run_worker(&comm)))
            .collect();
        // the master endpoint is dropped before joining, so workers blocked on
        // it see a disconnect instead of waiting forever if the master fails
        let master = {
            let comm = master_comm;
            distributed::run_master(&comm, mesh, initial, cfg.affect_rate, stop)
        };
        let workers: Vec<Result<u64, AmrError>> = handles
            .into_iter()
            .enumerate()
            .map(|(w, h)| h.join().unwrap_or(Err(AmrError::WorkerPanicked(w + 1))))
            .collect();
        (master, workers)
    });

    let master = master?;
    let mut counts = vec![(0, master.iterations)];
    for (w, r) in workers.into_iter().enumerate() {
        counts.push((w + 1, r?));
    }
    let iterations = check_lockstep(&counts)?;
    let result = RunResult::new(cfg.affect_rate, cfg.epsilon, iterations, master.extrema);
    Ok((result, master.field))
}

/// Rank-0 entry point of a real multi-process run.
pub fn run_master<C: Communicator>(
    comm: &C,
    mesh: &Mesh,
    initial: Vec<f64>,
    cfg: &RelaxConfig,
) -> Result<RunResult, AmrError> {
    cfg.validate()?;
    let run = distributed::run_master(comm, mesh, initial, cfg.affect_rate, cfg.stop_rule())?;
    Ok(RunResult::new(
        cfg.affect_rate,
        cfg.epsilon,
        run.iterations,
        run.extrema,
    ))
}

/// Entry point for ranks `1..size`; returns after the terminate flag.
pub fn run_worker<C: Communicator>(comm: &C) -> Result<u64, AmrError> {
    let iterations = distributed::run_worker(comm)?;
    log::debug!("[rank {}] done after {iterations} iterations", comm.rank());
    Ok(iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::mesh::MeshBuilder;

    fn two_boxes() -> Mesh {
        let mut b = MeshBuilder::new();
        b.push_box(4.0, [(1, 2.0)]);
        b.push_box(4.0, [(0, 2.0)]);
        b.build().unwrap()
    }

    #[test]
    fn field_length_checked_before_starting() {
        let err = Engine::new()
            .run(&two_boxes(), vec![1.0], &RelaxConfig::new(0.5, 0.01))
            .unwrap_err();
        assert_eq!(
            err,
            AmrError::FieldLengthMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn barrier_cached_across_runs() {
        let mesh = two_boxes();
        let mut engine = Engine::new();
        let cfg = RelaxConfig::new(0.5, 0.01).with_workers(2);
        engine.run(&mesh, vec![10.0, 0.0], &cfg).unwrap();
        assert_eq!(engine.barriers.workers(), Some(2));
        engine
            .run(&mesh, vec![10.0, 0.0], &cfg.clone().with_workers(3))
            .unwrap();
        assert_eq!(engine.barriers.workers(), Some(3));
    }

    #[test]
    fn realizations_agree() {
        let mesh = two_boxes();
        let cfg = RelaxConfig::new(0.5, 0.01).with_workers(2);
        let mut engine = Engine::new();
        let a = engine.run_shared(&mesh, vec![10.0, 0.0], &cfg).unwrap();
        let b = engine
            .run_distributed_local(&mesh, vec![10.0, 0.0], &cfg)
            .unwrap();
        assert_eq!(a, b);
    }
}
