//! Reader for the whitespace-separated AMR box description.
//!
//! # Format
//! ```text
//! N rows cols
//! # then, for each box i in 0..N:
//! i
//! y x height width
//! n_top    id...
//! n_bottom id...
//! n_left   id...
//! n_right  id...
//! dsv
//! ```
//! Line breaks are not significant. The perimeter of a box is
//! `2 * (height + width)`. Overlap with a top/bottom neighbor is the length
//! of the shared x-interval, with a left/right neighbor the length of the
//! shared y-interval. Whatever is left of the perimeter is the self-overlap.
//!
//! # Limitations
//! - Box ids must be `0..N` in order.
//! - Neighbors that touch only at a corner (zero overlap) are rejected by
//!   mesh construction.

use std::io::Read;
use std::path::Path;

use crate::amr_error::AmrError;
use crate::topology::mesh::{Mesh, MeshBuilder};

/// Parsed input: mesh, initial field, and the grid extent from the header.
#[derive(Clone, Debug, PartialEq)]
pub struct AmrInput {
    pub mesh: Mesh,
    pub initial: Vec<f64>,
    pub rows: f64,
    pub cols: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

const SIDES: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

#[derive(Clone, Debug)]
struct BoxRecord {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    /// Neighbor ids in top, bottom, left, right order.
    sides: [Vec<usize>; 4],
}

impl BoxRecord {
    fn perimeter(&self) -> f64 {
        2.0 * ((self.y_max - self.y_min) + (self.x_max - self.x_min))
    }

    fn overlap(&self, side: Side, other: &BoxRecord) -> f64 {
        match side {
            Side::Top | Side::Bottom => self.x_max.min(other.x_max) - self.x_min.max(other.x_min),
            Side::Left | Side::Right => self.y_max.min(other.y_max) - self.y_min.max(other.y_min),
        }
    }
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn next<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, AmrError> {
        let raw = self
            .inner
            .next()
            .ok_or_else(|| AmrError::MeshIoParse(format!("unexpected end of input, expected {what}")))?;
        raw.parse::<T>()
            .map_err(|_| AmrError::MeshIoParse(format!("invalid {what}: {raw}")))
    }
}

/// AMR box-description reader.
#[derive(Debug, Default, Clone)]
pub struct AmrTextReader;

impl AmrTextReader {
    pub fn read<R: Read>(&self, mut reader: R) -> Result<AmrInput, AmrError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_str(&text)
    }

    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<AmrInput, AmrError> {
        let file = std::fs::File::open(path.as_ref())?;
        self.read(std::io::BufReader::new(file))
    }

    pub fn parse_str(&self, text: &str) -> Result<AmrInput, AmrError> {
        let mut tok = Tokens {
            inner: text.split_whitespace(),
        };
        let n: usize = tok.next("box count")?;
        let rows: f64 = tok.next("row count")?;
        let cols: f64 = tok.next("column count")?;
        if n == 0 {
            return Err(AmrError::EmptyMesh);
        }

        let mut records = Vec::with_capacity(n);
        let mut initial = Vec::with_capacity(n);
        for i in 0..n {
            let id: usize = tok.next("box id")?;
            if id != i {
                return Err(AmrError::MeshIoParse(format!(
                    "box ids must be sequential: expected {i}, found {id}"
                )));
            }
            let y: f64 = tok.next("y")?;
            let x: f64 = tok.next("x")?;
            let height: f64 = tok.next("height")?;
            let width: f64 = tok.next("width")?;
            let mut sides: [Vec<usize>; 4] = Default::default();
            for (side, ids) in SIDES.iter().zip(sides.iter_mut()) {
                let count: usize = tok.next("neighbor count")?;
                for _ in 0..count {
                    let nbr: usize = tok.next("neighbor id")?;
                    if nbr >= n {
                        return Err(AmrError::DanglingNeighbor {
                            box_id: i,
                            neighbor: nbr,
                            len: n,
                        });
                    }
                    ids.push(nbr);
                }
                log::trace!("box {i}: {} {side:?} neighbors", ids.len());
            }
            initial.push(tok.next("dsv")?);
            records.push(BoxRecord {
                x_min: x,
                x_max: x + width,
                y_min: y,
                y_max: y + height,
                sides,
            });
        }

        let links: usize = records
            .iter()
            .map(|r| r.sides.iter().map(Vec::len).sum::<usize>())
            .sum();
        let mut builder = MeshBuilder::with_capacity(n, links);
        let records = &records;
        for rec in records {
            let neighbors = SIDES.iter().zip(&rec.sides).flat_map(|(&side, ids)| {
                ids.iter()
                    .map(move |&j| (j, rec.overlap(side, &records[j])))
            });
            builder.push_box(rec.perimeter(), neighbors);
        }
        let mesh = builder.build()?;
        log::debug!(
            "loaded {} boxes ({} links) on a {rows}x{cols} grid",
            mesh.len(),
            mesh.total_neighbors()
        );
        Ok(AmrInput {
            mesh,
            initial,
            rows,
            cols,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;

    /// Box 0 spans the top row; boxes 1 and 2 split the bottom row.
    const THREE_BOXES: &str = "\
3 4 4
0
0 0 2 4
0
2 1 2
0
0
10.0
1
2 0 2 2
1 0
0
0
1 2
0.0
2
2 2 2 2
1 0
0
1 1
0
5.0
";

    #[test]
    fn overlaps_follow_geometry() {
        let input = AmrTextReader.parse_str(THREE_BOXES).unwrap();
        let mesh = &input.mesh;
        assert_eq!(mesh.len(), 3);
        assert_eq!(input.initial, vec![10.0, 0.0, 5.0]);
        assert_eq!((input.rows, input.cols), (4.0, 4.0));

        assert_eq!(mesh.perimeter(0), 12.0);
        assert_eq!(mesh.neighbors(0).collect::<Vec<_>>(), vec![(1, 2.0), (2, 2.0)]);
        assert_eq!(mesh.self_overlap(0), 8.0);

        assert_eq!(mesh.perimeter(1), 8.0);
        assert_eq!(mesh.neighbors(1).collect::<Vec<_>>(), vec![(0, 2.0), (2, 2.0)]);
        assert_eq!(mesh.self_overlap(1), 4.0);

        assert!(mesh.validate_invariants().is_ok());
        assert!(mesh.asymmetric_links().is_empty());
    }

    #[test]
    fn out_of_order_ids_rejected() {
        let text = THREE_BOXES.replacen("\n1\n2 0", "\n7\n2 0", 1);
        assert!(matches!(
            AmrTextReader.parse_str(&text),
            Err(AmrError::MeshIoParse(_))
        ));
    }

    #[test]
    fn dangling_neighbor_rejected() {
        let text = "1 1 1\n0\n0 0 1 1\n1 4\n0\n0\n0\n1.0\n";
        assert_eq!(
            AmrTextReader.parse_str(text),
            Err(AmrError::DanglingNeighbor {
                box_id: 0,
                neighbor: 4,
                len: 1
            })
        );
    }

    #[test]
    fn truncated_input_rejected() {
        let err = AmrTextReader.parse_str("2 1 1\n0\n0 0 1 1\n").unwrap_err();
        assert!(matches!(err, AmrError::MeshIoParse(_)));
    }
}
