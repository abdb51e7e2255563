//! Box adjacency topology.

pub mod mesh;

pub use mesh::{Mesh, MeshBuilder};
