//! Double-buffered DSV storage.
//!
//! `current` is read during a step and `next` is written; [`DsvBuffers::commit`]
//! swaps their roles. Values are never updated in place, so a step can read
//! any `current[j]` while other boxes' `next[i]` are being produced.

use crate::amr_error::AmrError;

/// Fails with [`AmrError::FieldLengthMismatch`] unless `field` has one value
/// per box.
pub fn check_field_len(boxes: usize, field: &[f64]) -> Result<(), AmrError> {
    if field.len() == boxes {
        Ok(())
    } else {
        Err(AmrError::FieldLengthMismatch {
            expected: boxes,
            found: field.len(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DsvBuffers {
    current: Vec<f64>,
    next: Vec<f64>,
}

impl DsvBuffers {
    /// Take ownership of the initial field; the scratch buffer starts as a copy.
    pub fn new(initial: Vec<f64>) -> Self {
        let next = initial.clone();
        Self {
            current: initial,
            next,
        }
    }

    /// Like [`new`](Self::new) but checks the field against the mesh size.
    pub fn for_mesh(len: usize, initial: Vec<f64>) -> Result<Self, AmrError> {
        check_field_len(len, &initial)?;
        Ok(Self::new(initial))
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Committed values of the last finished iteration.
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    /// Scratch buffer for the iteration in progress.
    pub fn next_mut(&mut self) -> &mut [f64] {
        &mut self.next
    }

    /// Borrow both roles at once: read `current`, write `next`.
    pub fn split(&mut self) -> (&[f64], &mut [f64]) {
        (&self.current, &mut self.next)
    }

    /// Expose `next` as the new `current`.
    pub fn commit(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    pub fn into_current(self) -> Vec<f64> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_swaps_roles() {
        let mut b = DsvBuffers::new(vec![1.0, 2.0]);
        b.next_mut().copy_from_slice(&[3.0, 4.0]);
        assert_eq!(b.current(), &[1.0, 2.0]);
        b.commit();
        assert_eq!(b.current(), &[3.0, 4.0]);
        // old current is now the scratch buffer
        assert_eq!(b.next_mut(), &mut [1.0, 2.0]);
    }

    #[test]
    fn length_checked_against_mesh() {
        assert_eq!(
            DsvBuffers::for_mesh(3, vec![0.0; 2]),
            Err(AmrError::FieldLengthMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(DsvBuffers::for_mesh(2, vec![0.0; 2]).unwrap().len(), 2);
        assert!(check_field_len(0, &[]).is_ok());
        assert!(check_field_len(1, &[1.0, 2.0]).is_err());
    }
}
