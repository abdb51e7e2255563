//! Opt-in invariant checking for mesh data.
//!
//! The structural checks in [`Mesh::from_raw_parts`](crate::topology::mesh::Mesh::from_raw_parts)
//! always run. The perimeter-sum invariant (`self_overlap + Σ overlap` equals
//! the perimeter within a relative `1e-6`) is only asserted where invariant
//! checking is compiled in: debug builds, or release builds with the
//! `check-invariants` or `strict-invariants` feature. Meshes that arrive over
//! the wire go through the same constructor, so a worker checks exactly what
//! the master checked.

use crate::amr_error::AmrError;

/// Checkable consistency rules of a data structure.
pub trait DebugInvariants {
    /// Panic on the first violation when invariant checking is compiled in;
    /// a no-op otherwise.
    fn debug_assert_invariants(&self);
    /// Always runs the checks and returns the first violation, e.g.
    /// [`AmrError::PerimeterMismatch`] for a mesh box whose overlaps do not
    /// add up to its perimeter.
    fn validate_invariants(&self) -> Result<(), AmrError>;
}

/// Evaluate a `Result<(), AmrError>` check and panic with
/// `"[invariants] <ctx>: <error>"` if it fails. Without `debug_assertions`
/// or one of the invariant features the check is not evaluated at all.
///
/// ```ignore
/// crate::debug_invariants!(mesh.validate_invariants(), "Mesh::from_raw_parts");
/// ```
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
