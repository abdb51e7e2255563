//! AmrError: Unified error type for amr-relax public APIs
//!
//! Every construction-time defect (malformed mesh, bad worker count) and
//! every runtime failure of the synchronization protocol surfaces as one of
//! these variants. None of them is recoverable; callers are expected to abort
//! the run and exit with a nonzero status.

use thiserror::Error;

/// Unified error type for relaxation runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmrError {
    /// A mesh must contain at least one box.
    #[error("Mesh error: mesh contains no boxes")]
    EmptyMesh,
    /// Worker pools and MPI worlds need at least one compute worker.
    #[error("Invalid worker count: {0} (at least one worker is required)")]
    InvalidWorkerCount(usize),
    /// A neighbor link points past the end of the mesh.
    #[error("Mesh error: box {box_id} links to neighbor {neighbor} but the mesh has {len} boxes")]
    DanglingNeighbor {
        box_id: usize,
        neighbor: usize,
        len: usize,
    },
    /// Perimeters must be strictly positive and finite.
    #[error("Mesh error: box {box_id} has invalid perimeter {perimeter}")]
    InvalidPerimeter { box_id: usize, perimeter: f64 },
    /// Overlap lengths must be strictly positive and finite.
    #[error("Mesh error: box {box_id} has invalid overlap {overlap} with neighbor {neighbor}")]
    InvalidOverlap {
        box_id: usize,
        neighbor: usize,
        overlap: f64,
    },
    /// Self-overlap is the uncovered part of the perimeter and can't be negative.
    #[error("Mesh error: box {box_id} has negative self-overlap {self_overlap}")]
    NegativeSelfOverlap { box_id: usize, self_overlap: f64 },
    /// `self_overlap + Σ overlap` drifted away from the perimeter.
    #[error(
        "Mesh invariant: box {box_id} covers {covered} of perimeter {perimeter} (self-overlap + neighbor overlaps)"
    )]
    PerimeterMismatch {
        box_id: usize,
        perimeter: f64,
        covered: f64,
    },
    /// Flattened neighbor arrays disagree with their offsets/counts.
    #[error("Mesh error: inconsistent neighbor layout: {0}")]
    NeighborLayout(String),
    /// The initial field has a different length than the mesh.
    #[error("Field length mismatch: mesh has {expected} boxes, field has {found} values")]
    FieldLengthMismatch { expected: usize, found: usize },
    /// A NaN or infinity showed up in the committed field.
    #[error("Non-finite field after {iterations} iterations (max={max}, min={min})")]
    NonFiniteField { iterations: u64, max: f64, min: f64 },
    /// The configured iteration cap was reached before convergence.
    #[error("No convergence after {limit} iterations (max={max}, min={min})")]
    IterationLimit { limit: u64, max: f64, min: f64 },
    /// Configuration rejected before any work started.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Communicator setup or transport failure.
    #[error("Communication error: {0}")]
    Communication(String),
    /// A peer hung up in the middle of the protocol.
    #[error("Communication error: peer {peer} disconnected")]
    Disconnected { peer: usize },
    /// A message carried a different number of bytes than the protocol expects.
    #[error("Wire error: tag {tag} from peer {peer}: expected {expected} bytes, got {actual}")]
    WireLength {
        peer: usize,
        tag: u16,
        expected: usize,
        actual: usize,
    },
    /// A continue-flag with a value other than the two sentinels.
    #[error("Wire error: unexpected run flag {0}")]
    UnexpectedFlag(u64),
    /// A worker thread panicked.
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
    /// Workers finished with different iteration counts.
    #[error("Lockstep violation: worker {worker} ran {found} iterations, coordinator ran {expected}")]
    LockstepViolation {
        worker: usize,
        expected: u64,
        found: u64,
    },
    /// The textual mesh description could not be parsed.
    #[error("Mesh input parse error: {0}")]
    MeshIoParse(String),
    /// Reading the mesh description failed.
    #[error("Mesh input I/O error: {0}")]
    MeshIo(String),
}

impl From<std::io::Error> for AmrError {
    fn from(e: std::io::Error) -> Self {
        AmrError::MeshIo(e.to_string())
    }
}
