//! # amr-relax
//!
//! Iterative scalar relaxation over an adaptive-mesh-refinement (AMR) box
//! decomposition. Every box carries a domain-specific value (DSV); each
//! iteration blends a box's value toward the perimeter-weighted average of
//! its neighbors and itself, until the relative spread between the largest
//! and smallest value drops to `epsilon`.
//!
//! Two synchronization realizations share one state machine
//! ([`algs::sync::drive`]):
//! - a barrier-synchronized thread team over shared buffers
//!   ([`algs::shared`]);
//! - master/worker message passing over a [`Communicator`]
//!   ([`algs::distributed`]), either simulated in-process with
//!   [`LocalComm`](algs::communicator::LocalComm) or over MPI with the
//!   `mpi-support` feature.
//!
//! ## Determinism
//!
//! For a given mesh, initial field and parameters, the iteration count and
//! the final extrema do not depend on the worker count or the realization.
//!
//! ## Invariant checks
//!
//! Mesh invariants are validated on construction in debug builds, or in
//! release builds with the `check-invariants` / `strict-invariants`
//! features. See [`DebugInvariants`].
//!
//! ```
//! use amr_relax::prelude::*;
//!
//! let mut b = MeshBuilder::new();
//! b.push_box(4.0, [(1, 2.0)]);
//! b.push_box(4.0, [(0, 2.0)]);
//! let mesh = b.build()?;
//!
//! let result = Engine::new().run(&mesh, vec![10.0, 0.0], &RelaxConfig::new(0.5, 0.01))?;
//! assert!(result.iterations > 0);
//! assert!((result.max - result.min) / result.max <= 0.01);
//! # Ok::<(), AmrError>(())
//! ```

pub mod algs;
pub mod amr_error;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod engine;
pub mod io;
pub mod topology;

pub use algs::communicator::Communicator;
pub use debug_invariants::DebugInvariants;

/// The most-used types in one import.
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::convergence::MaxMin;
    pub use crate::algs::partition::{WorkerAssignment, partition};
    pub use crate::algs::relax::Relaxation;
    pub use crate::amr_error::AmrError;
    pub use crate::config::{Realization, RelaxConfig};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::engine::{Engine, RunResult};
    pub use crate::io::{AmrInput, AmrTextReader};
    pub use crate::topology::mesh::{Mesh, MeshBuilder};
}
