#![allow(dead_code)]
use amr_relax::prelude::*;

/// Two unit-height boxes sharing one edge of length 2.
pub fn two_boxes() -> Mesh {
    let mut b = MeshBuilder::new();
    b.push_box(4.0, [(1, 2.0)]);
    b.push_box(4.0, [(0, 2.0)]);
    b.build().unwrap()
}

/// Ring of `n` boxes, each touching its two ring neighbors.
pub fn ring(n: usize) -> Mesh {
    let mut b = MeshBuilder::with_capacity(n, 2 * n);
    for i in 0..n {
        b.push_box(4.0, [((i + n - 1) % n, 1.0), ((i + 1) % n, 1.0)]);
    }
    b.build().unwrap()
}

/// `side x side` grid of unit boxes.
pub fn grid(side: usize) -> Mesh {
    let mut b = MeshBuilder::with_capacity(side * side, 4 * side * side);
    for r in 0..side {
        for c in 0..side {
            let mut nbrs = Vec::new();
            if r > 0 {
                nbrs.push(((r - 1) * side + c, 1.0));
            }
            if r + 1 < side {
                nbrs.push(((r + 1) * side + c, 1.0));
            }
            if c > 0 {
                nbrs.push((r * side + c - 1, 1.0));
            }
            if c + 1 < side {
                nbrs.push((r * side + c + 1, 1.0));
            }
            b.push_box(4.0, nbrs);
        }
    }
    b.build().unwrap()
}

/// Deterministic pseudo-random field in `[lo, hi)`.
pub fn seeded_field(n: usize, seed: u64, lo: f64, hi: f64) -> Vec<f64> {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(lo..hi)).collect()
}
