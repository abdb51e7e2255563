//! Per-box field storage.

pub mod dsv;

pub use dsv::DsvBuffers;
