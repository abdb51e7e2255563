//! Relaxation kernels, convergence, partitioning and the two synchronization
//! realizations.

pub mod communicator;
pub mod convergence;
pub mod distributed;
pub mod partition;
pub mod relax;
pub mod shared;
pub mod sync;
pub mod wire;

pub use convergence::MaxMin;
pub use partition::{WorkerAssignment, partition};
pub use relax::Relaxation;
