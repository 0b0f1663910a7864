// Position extraction pipeline

pub mod processing;

pub use processing::{extract, mapper, normalize, quality_gate, schema};
