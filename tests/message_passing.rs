mod util;
use util::*;

use amr_relax::algs::communicator::{Communicator, LocalComm};
use amr_relax::algs::distributed::recv_setup;
use amr_relax::algs::partition::WorkerAssignment;
use amr_relax::algs::wire::{self, RUN_CONTINUE, RUN_TERMINATE, WireTag};
use amr_relax::amr_error::AmrError;
use amr_relax::config::RelaxConfig;
use amr_relax::engine;

/// Rank 1 is played by hand so every message the master sends is checked.
#[test]
fn master_follows_the_protocol() {
    let mesh = two_boxes();
    let mut world = LocalComm::world(2);
    let worker = world.pop().unwrap();
    let master = world.pop().unwrap();

    std::thread::scope(|s| {
        let mesh_ref = &mesh;
        let h = s.spawn(move || {
            engine::run_master(
                &master,
                mesh_ref,
                vec![10.0, 0.0],
                &RelaxConfig::new(0.5, 0.01),
            )
        });

        let setup = recv_setup(&worker).unwrap();
        assert_eq!(setup.affect_rate, 0.5);
        assert_eq!(setup.epsilon, 0.01);
        assert_eq!(setup.owned, WorkerAssignment::new(0, 2));
        assert_eq!(setup.mesh, mesh);
        worker.barrier().unwrap();

        assert_eq!(wire::recv_u64(&worker, 0, WireTag::Run).unwrap(), RUN_CONTINUE);
        assert_eq!(wire::recv_f64s(&worker, 0, WireTag::Dsv, 2).unwrap(), vec![10.0, 0.0]);
        // pretend the field flattened in one step
        wire::send_f64s(&worker, 0, WireTag::Dsv, &[5.0, 5.0]).unwrap();

        assert_eq!(wire::recv_u64(&worker, 0, WireTag::Run).unwrap(), RUN_TERMINATE);
        let result = h.join().unwrap().unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!((result.max, result.min), (5.0, 5.0));

        // nothing follows the terminate flag
        assert_eq!(
            worker.recv(0, WireTag::Run.id()),
            Err(AmrError::Disconnected { peer: 0 })
        );
    });
}

#[test]
fn short_reply_is_a_wire_error() {
    let mesh = two_boxes();
    let mut world = LocalComm::world(2);
    let worker = world.pop().unwrap();
    let master = world.pop().unwrap();

    std::thread::scope(|s| {
        let mesh_ref = &mesh;
        let h = s.spawn(move || {
            engine::run_master(&master, mesh_ref, vec![10.0, 0.0], &RelaxConfig::new(0.5, 0.01))
        });
        recv_setup(&worker).unwrap();
        worker.barrier().unwrap();
        wire::recv_u64(&worker, 0, WireTag::Run).unwrap();
        wire::recv_f64s(&worker, 0, WireTag::Dsv, 2).unwrap();
        wire::send_f64s(&worker, 0, WireTag::Dsv, &[5.0]).unwrap();

        let err = h.join().unwrap().unwrap_err();
        assert_eq!(
            err,
            AmrError::WireLength {
                peer: 1,
                tag: WireTag::Dsv.id(),
                expected: 16,
                actual: 8
            }
        );
    });
}

#[test]
fn workers_report_the_master_iteration_count() {
    let mesh = ring(10);
    let field = seeded_field(mesh.len(), 9, 0.0, 10.0);
    let cfg = RelaxConfig::new(0.5, 0.02);
    let mut world = LocalComm::world(4);
    let master = world.remove(0);

    let (result, counts) = std::thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| s.spawn(move || engine::run_worker(&comm)))
            .collect();
        let result = {
            let comm = master;
            engine::run_master(&comm, &mesh, field, &cfg)
        };
        let counts: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        (result.unwrap(), counts)
    });
    assert!(result.iterations > 0);
    assert!(counts.iter().all(|&c| c == result.iterations));
}
