pub mod extractor_factory;
pub mod record_sink_adapter;

pub use extractor_factory::{build_recognizer, ExtractorRegistry};
pub use record_sink_adapter::NdjsonRecordSink;
