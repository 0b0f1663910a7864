// Pipeline processing: table extraction, header mapping, normalization and validation

pub mod extract;
pub mod mapper;
pub mod normalize;
pub mod quality_gate;
pub mod schema;
