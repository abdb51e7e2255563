//! cargo mpirun -n 4 --features mpi-support --example amr_mpi -- 0.1 0.1 mesh.txt
//!
//! Rank 0 loads the mesh, distributes it and coordinates; every other rank
//! relaxes its share of the boxes. Needs at least two ranks.

use std::process;
use std::time::Instant;

use amr_relax::engine::{run_master, run_worker};
use amr_relax::prelude::*;

const USAGE: &str = "\
Usage: amr [affect-rate] [epsilon] [test-file]

affect-rate: float value controlling the effect of neighboring boxes
epsilon    : float value determining the cutoff for convergence
test-file  : test file with input to AMR problem
";

fn main() {
    env_logger::init();
    let comm = MpiComm::new().expect("MPI initialization failed");

    if comm.rank() != 0 {
        if let Err(e) = run_worker(&comm) {
            eprintln!("[rank {}] {e}", comm.rank());
            process::exit(1);
        }
        return;
    }

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprint!("{USAGE}");
        process::exit(1);
    }
    let (Ok(affect_rate), Ok(epsilon)) = (args[1].parse::<f64>(), args[2].parse::<f64>()) else {
        eprint!("{USAGE}");
        process::exit(1);
    };
    let cfg = RelaxConfig::new(affect_rate, epsilon).with_workers(comm.size().saturating_sub(1).max(1));
    let input = AmrTextReader.read_path(&args[3]).unwrap_or_else(|e| {
        eprintln!("failed to load mesh: {e}");
        process::exit(1);
    });

    let started = Instant::now();
    match run_master(&comm, &input.mesh, input.initial, &cfg) {
        Ok(result) => {
            println!("{result}");
            println!("elapsed: {:.6}s", started.elapsed().as_secs_f64());
        }
        Err(e) => {
            eprintln!("relaxation failed: {e}");
            process::exit(1);
        }
    }
}
