//! The per-box relaxation update and its range drivers.
//!
//! For box `i`:
//!
//! ```text
//! weighted = self_overlap(i) * cur[i] + Σ overlap(i, j) * cur[j]
//! next[i]  = cur[i] * (1 - rate) + (weighted / perimeter(i)) * rate
//! ```
//!
//! The update only reads `cur` and writes one output slot, so any split of
//! the index space produces bit-identical results.

use rayon::prelude::*;

use crate::algs::partition::WorkerAssignment;
use crate::topology::mesh::Mesh;

/// Boxes handed to one Rayon task at a time in [`Relaxation::par_relax_range`].
pub const PAR_MIN_CHUNK: usize = 256;

/// Perimeter-weighted sum of box `i`'s own value and its neighbors' values.
#[inline]
pub fn weighted_sum(mesh: &Mesh, current: &[f64], i: usize) -> f64 {
    let mut sum = mesh.self_overlap(i) * current[i];
    for (nbr, overlap) in mesh.neighbors(i) {
        sum += overlap * current[nbr];
    }
    sum
}

/// New value of box `i` given the committed field `current`.
#[inline]
pub fn relax_box(mesh: &Mesh, current: &[f64], i: usize, affect_rate: f64) -> f64 {
    let diffused = weighted_sum(mesh, current, i) / mesh.perimeter(i);
    current[i] * (1.0 - affect_rate) + diffused * affect_rate
}

/// Mesh plus blend factor: everything a worker needs to run COMPUTING.
#[derive(Copy, Clone, Debug)]
pub struct Relaxation<'m> {
    mesh: &'m Mesh,
    affect_rate: f64,
}

impl<'m> Relaxation<'m> {
    /// `affect_rate` is used as given; values outside `[0, 1]` are the
    /// caller's responsibility.
    pub fn new(mesh: &'m Mesh, affect_rate: f64) -> Self {
        Self { mesh, affect_rate }
    }

    pub fn mesh(&self) -> &'m Mesh {
        self.mesh
    }

    pub fn affect_rate(&self) -> f64 {
        self.affect_rate
    }

    #[inline]
    pub fn relax_box(&self, current: &[f64], i: usize) -> f64 {
        relax_box(self.mesh, current, i, self.affect_rate)
    }

    /// Sequentially relax `owned`, writing into `out` (`out[k]` is box
    /// `owned.start + k`). An empty assignment is a no-op.
    pub fn relax_range(&self, current: &[f64], owned: WorkerAssignment, out: &mut [f64]) {
        debug_assert_eq!(out.len(), owned.len());
        for (slot, i) in out.iter_mut().zip(owned.range()) {
            *slot = self.relax_box(current, i);
        }
    }

    /// Rayon version of [`relax_range`](Self::relax_range), used for the
    /// second tier of parallelism inside a distributed worker.
    pub fn par_relax_range(&self, current: &[f64], owned: WorkerAssignment, out: &mut [f64]) {
        debug_assert_eq!(out.len(), owned.len());
        let start = owned.start;
        out.par_iter_mut()
            .with_min_len(PAR_MIN_CHUNK)
            .enumerate()
            .for_each(|(k, slot)| *slot = self.relax_box(current, start + k));
    }

    /// Relax every box of the mesh into `next`.
    pub fn relax_all(&self, current: &[f64], next: &mut [f64]) {
        self.relax_range(current, WorkerAssignment::new(0, self.mesh.len()), next);
    }
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

    /// 3 boxes in a row, perimeter 4, shared edges of length 1.
    fn strip() -> Mesh {
        let mut b = MeshBuilder::new();
        b.push_box(4.0, [(1, 1.0)]);
        b.push_box(4.0, [(0, 1.0), (2, 1.0)]);
        b.push_box(4.0, [(1, 1.0)]);
        b.build().unwrap()
    }

    #[test]
    fn first_iteration_of_two_box_example() {
        let mesh = two_boxes();
        let r = Relaxation::new(&mesh, 0.5);
        let mut next = [0.0; 2];
        r.relax_all(&[10.0, 0.0], &mut next);
        assert_eq!(next, [7.5, 2.5]);
    }

    #[test]
    fn zero_rate_is_identity() {
        let mesh = strip();
        let cur = [3.0, -1.25, 8.5];
        let mut next = [0.0; 3];
        Relaxation::new(&mesh, 0.0).relax_all(&cur, &mut next);
        assert_eq!(next, cur);
    }

    #[test]
    fn full_rate_takes_diffused_value() {
        let mesh = strip();
        let cur = [3.0, -1.25, 8.5];
        let mut next = [0.0; 3];
        Relaxation::new(&mesh, 1.0).relax_all(&cur, &mut next);
        for i in 0..3 {
            assert_eq!(next[i], weighted_sum(&mesh, &cur, i) / mesh.perimeter(i));
        }
    }

    #[test]
    fn partial_range_writes_local_slots() {
        let mesh = strip();
        let r = Relaxation::new(&mesh, 0.5);
        let cur = [4.0, 0.0, 0.0];
        let mut out = [0.0; 2];
        r.relax_range(&cur, WorkerAssignment::new(1, 3), &mut out);
        // box 1: 0.5*0 + 0.5*((2*0 + 1*4 + 1*0)/4)
        assert_eq!(out, [0.5, 0.0]);

        let mut none: [f64; 0] = [];
        r.relax_range(&cur, WorkerAssignment::EMPTY, &mut none);
    }

    #[test]
    fn parallel_matches_sequential() {
        let n = 2_000;
        let mut b = MeshBuilder::with_capacity(n, 2 * n);
        for i in 0..n {
            let mut nbrs = Vec::new();
            if i > 0 {
                nbrs.push((i - 1, 0.75));
            }
            if i + 1 < n {
                nbrs.push((i + 1, 0.75));
            }
            b.push_box(3.0, nbrs);
        }
        let mesh = b.build().unwrap();
        let cur: Vec<f64> = (0..n).map(|i| (i * 37 % 101) as f64).collect();
        let r = Relaxation::new(&mesh, 0.3);
        let owned = WorkerAssignment::new(100, n - 7);
        let mut seq = vec![0.0; owned.len()];
        let mut par = vec![0.0; owned.len()];
        r.relax_range(&cur, owned, &mut seq);
        r.par_relax_range(&cur, owned, &mut par);
        assert_eq!(seq, par);
    }
}
