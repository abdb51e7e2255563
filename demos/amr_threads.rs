//! cargo run --example amr_threads -- 0.1 0.1 4 < mesh.txt
//!
//! Relaxes an AMR box description with a barrier-synchronized thread team.
//! The mesh is read from standard input, or from the optional fourth argument.

use std::process;
use std::time::Instant;

use amr_relax::prelude::*;

const USAGE: &str = "\
Usage: amr [affect-rate] [epsilon] [num-threads] [mesh-file]

affect-rate: float value controlling the effect of neighboring boxes
epsilon    : float value determining the cutoff for convergence
             should be non-negative
num-threads: number of threads to spawn for computation
             should be positive
mesh-file  : optional; standard input is read when omitted
";

fn parse_args(args: &[String]) -> Option<(RelaxConfig, Option<String>)> {
    if !(4..=5).contains(&args.len()) {
        return None;
    }
    let affect_rate: f64 = args[1].parse().ok()?;
    let epsilon: f64 = args[2].parse().ok()?;
    let workers: usize = args[3].parse().ok()?;
    let cfg = RelaxConfig::new(affect_rate, epsilon).with_workers(workers);
    Some((cfg, args.get(4).cloned()))
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let Some((cfg, path)) = parse_args(&args) else {
        eprint!("{USAGE}");
        process::exit(1);
    };
    if let Err(e) = cfg.validate() {
        eprintln!("Invalid parameters: {e}");
        eprint!("{USAGE}");
        process::exit(1);
    }

    let reader = AmrTextReader;
    let input = match path {
        Some(p) => reader.read_path(p),
        None => reader.read(std::io::stdin().lock()),
    };
    let input = input.unwrap_or_else(|e| {
        eprintln!("failed to load mesh: {e}");
        process::exit(1);
    });

    let started = Instant::now();
    let result = Engine::new().run(&input.mesh, input.initial, &cfg);
    let elapsed = started.elapsed();
    match result {
        Ok(result) => {
            println!("{result}");
            println!("elapsed: {:.6}s", elapsed.as_secs_f64());
        }
        Err(e) => {
            eprintln!("relaxation failed: {e}");
            process::exit(1);
        }
    }
}
