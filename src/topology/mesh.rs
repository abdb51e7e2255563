//! Immutable box mesh in flattened (CSR-like) layout.
//!
//! Each box carries a perimeter, a self-overlap (the part of the perimeter no
//! neighbor covers) and an ordered list of `(neighbor_id, overlap_length)`
//! pairs. Neighbor lists of all boxes live back to back in two flat arrays,
//! addressed through per-box `offset`/`count`. This is the exact layout shipped
//! to distributed workers during setup, so a worker can rebuild the mesh with
//! [`Mesh::from_raw_parts`] without any re-indexing.
//!
//! Links are directional. `i -> j` does not imply `j -> i`; see
//! [`Mesh::asymmetric_links`].

use hashbrown::HashSet;
use itertools::izip;

use crate::amr_error::AmrError;
use crate::debug_invariants::DebugInvariants;

/// Relative tolerance for `self_overlap + Σ overlap ≈ perimeter`.
pub const PERIMETER_TOLERANCE: f64 = 1e-6;

/// Immutable box graph shared read-only by every worker of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    perimeters: Vec<f64>,
    self_overlaps: Vec<f64>,
    offsets: Vec<usize>,
    counts: Vec<usize>,
    neighbor_ids: Vec<usize>,
    overlaps: Vec<f64>,
}

impl Mesh {
    /// Assemble a mesh from its flattened arrays.
    ///
    /// Structural defects (empty mesh, dangling ids, bad perimeters or overlaps,
    /// offsets that do not tile the neighbor arrays) are always rejected. The
    /// perimeter-sum invariant is only asserted when invariant checking is
    /// compiled in; call [`DebugInvariants::validate_invariants`] to check it
    /// explicitly in release builds.
    pub fn from_raw_parts(
        perimeters: Vec<f64>,
        self_overlaps: Vec<f64>,
        offsets: Vec<usize>,
        counts: Vec<usize>,
        neighbor_ids: Vec<usize>,
        overlaps: Vec<f64>,
    ) -> Result<Self, AmrError> {
        let mesh = Self {
            perimeters,
            self_overlaps,
            offsets,
            counts,
            neighbor_ids,
            overlaps,
        };
        mesh.validate_structure()?;
        crate::debug_invariants!(mesh.validate_invariants(), "Mesh::from_raw_parts");

        let asymmetric = mesh.asymmetric_links();
        if !asymmetric.is_empty() {
            log::warn!(
                "mesh has {} directed neighbor links without a mirror link (first: {:?})",
                asymmetric.len(),
                asymmetric[0]
            );
        }
        Ok(mesh)
    }

    fn validate_structure(&self) -> Result<(), AmrError> {
        let n = self.perimeters.len();
        if n == 0 {
            return Err(AmrError::EmptyMesh);
        }
        for (name, len) in [
            ("self_overlaps", self.self_overlaps.len()),
            ("offsets", self.offsets.len()),
            ("counts", self.counts.len()),
        ] {
            if len != n {
                return Err(AmrError::NeighborLayout(format!(
                    "{name} has {len} entries for {n} boxes"
                )));
            }
        }
        if self.neighbor_ids.len() != self.overlaps.len() {
            return Err(AmrError::NeighborLayout(format!(
                "{} neighbor ids but {} overlaps",
                self.neighbor_ids.len(),
                self.overlaps.len()
            )));
        }

        let mut expected_offset = 0usize;
        for (box_id, (&offset, &count)) in self.offsets.iter().zip(&self.counts).enumerate() {
            if offset != expected_offset {
                return Err(AmrError::NeighborLayout(format!(
                    "box {box_id} starts at offset {offset}, expected {expected_offset}"
                )));
            }
            expected_offset += count;
        }
        if expected_offset != self.neighbor_ids.len() {
            return Err(AmrError::NeighborLayout(format!(
                "counts sum to {expected_offset} but {} links are stored",
                self.neighbor_ids.len()
            )));
        }

        for box_id in 0..n {
            let perimeter = self.perimeters[box_id];
            if !(perimeter.is_finite() && perimeter > 0.0) {
                return Err(AmrError::InvalidPerimeter { box_id, perimeter });
            }
            let self_overlap = self.self_overlaps[box_id];
            if self_overlap < -PERIMETER_TOLERANCE * perimeter || !self_overlap.is_finite() {
                return Err(AmrError::NegativeSelfOverlap {
                    box_id,
                    self_overlap,
                });
            }
            for (neighbor, overlap) in self.neighbors(box_id) {
                if neighbor >= n {
                    return Err(AmrError::DanglingNeighbor {
                        box_id,
                        neighbor,
                        len: n,
                    });
                }
                if !(overlap.is_finite() && overlap > 0.0) {
                    return Err(AmrError::InvalidOverlap {
                        box_id,
                        neighbor,
                        overlap,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of boxes.
    #[inline]
    pub fn len(&self) -> usize {
        self.perimeters.len()
    }

    /// Always false for a constructed mesh; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.perimeters.is_empty()
    }

    #[inline]
    pub fn perimeter(&self, i: usize) -> f64 {
        self.perimeters[i]
    }

    #[inline]
    pub fn self_overlap(&self, i: usize) -> f64 {
        self.self_overlaps[i]
    }

    /// `(neighbor_id, overlap_length)` pairs of box `i`, in input order.
    #[inline]
    pub fn neighbors(&self, i: usize) -> impl ExactSizeIterator<Item = (usize, f64)> + '_ {
        let start = self.offsets[i];
        let end = start + self.counts[i];
        self.neighbor_ids[start..end]
            .iter()
            .copied()
            .zip(self.overlaps[start..end].iter().copied())
    }

    pub fn perimeters(&self) -> &[f64] {
        &self.perimeters
    }

    pub fn self_overlaps(&self) -> &[f64] {
        &self.self_overlaps
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn neighbor_ids(&self) -> &[usize] {
        &self.neighbor_ids
    }

    pub fn overlaps(&self) -> &[f64] {
        &self.overlaps
    }

    /// Total number of directed neighbor links.
    pub fn total_neighbors(&self) -> usize {
        self.neighbor_ids.len()
    }

    /// Directed links `(i, j)` for which box `j` lists no link back to `i`.
    ///
    /// The relaxation never relies on symmetry, so this is diagnostic only.
    pub fn asymmetric_links(&self) -> Vec<(usize, usize)> {
        let mut links = HashSet::with_capacity(self.total_neighbors());
        for i in 0..self.len() {
            for (j, _) in self.neighbors(i) {
                links.insert((i, j));
            }
        }
        let mut missing: Vec<(usize, usize)> = links
            .iter()
            .filter(|&&(i, j)| !links.contains(&(j, i)))
            .copied()
            .collect();
        missing.sort_unstable();
        missing
    }
}

impl DebugInvariants for Mesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Mesh");
    }

    fn validate_invariants(&self) -> Result<(), AmrError> {
        for (box_id, &perimeter, &self_overlap, &offset, &count) in izip!(
            0..,
            &self.perimeters,
            &self.self_overlaps,
            &self.offsets,
            &self.counts
        ) {
            let covered = self_overlap + self.overlaps[offset..offset + count].iter().sum::<f64>();
            if (covered - perimeter).abs() > PERIMETER_TOLERANCE * perimeter.abs() {
                return Err(AmrError::PerimeterMismatch {
                    box_id,
                    perimeter,
                    covered,
                });
            }
        }
        Ok(())
    }
}

/// Incremental builder producing a flattened [`Mesh`].
#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    perimeters: Vec<f64>,
    self_overlaps: Vec<f64>,
    offsets: Vec<usize>,
    counts: Vec<usize>,
    neighbor_ids: Vec<usize>,
    overlaps: Vec<f64>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(boxes: usize, links: usize) -> Self {
        Self {
            perimeters: Vec::with_capacity(boxes),
            self_overlaps: Vec::with_capacity(boxes),
            offsets: Vec::with_capacity(boxes),
            counts: Vec::with_capacity(boxes),
            neighbor_ids: Vec::with_capacity(links),
            overlaps: Vec::with_capacity(links),
        }
    }

    /// Append a box whose self-overlap is whatever the neighbors leave uncovered.
    /// Returns the new box id.
    pub fn push_box<I>(&mut self, perimeter: f64, neighbors: I) -> usize
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let id = self.push_links(neighbors);
        let covered: f64 = self.overlaps[self.offsets[id]..].iter().sum();
        self.perimeters.push(perimeter);
        self.self_overlaps.push(perimeter - covered);
        id
    }

    /// Append a box with an explicitly given self-overlap. Returns the new box id.
    pub fn push_box_with_self_overlap<I>(
        &mut self,
        perimeter: f64,
        self_overlap: f64,
        neighbors: I,
    ) -> usize
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let id = self.push_links(neighbors);
        self.perimeters.push(perimeter);
        self.self_overlaps.push(self_overlap);
        id
    }

    fn push_links<I>(&mut self, neighbors: I) -> usize
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let id = self.offsets.len();
        let offset = self.neighbor_ids.len();
        for (nbr, overlap) in neighbors {
            self.neighbor_ids.push(nbr);
            self.overlaps.push(overlap);
        }
        self.offsets.push(offset);
        self.counts.push(self.neighbor_ids.len() - offset);
        id
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn build(self) -> Result<Mesh, AmrError> {
        Mesh::from_raw_parts(
            self.perimeters,
            self.self_overlaps,
            self.offsets,
            self.counts,
            self.neighbor_ids,
            self.overlaps,
        )
    }
}

static_assertions::assert_impl_all!(Mesh: Send, Sync);
