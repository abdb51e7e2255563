//! Mesh input.

pub mod amr_text;

pub use amr_text::{AmrInput, AmrTextReader};
