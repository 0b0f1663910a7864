use serde_json::Value;

use crate::error::Result;
use crate::pipeline::processing::extract::{DocumentFormat, TableExtractor};
use crate::pipeline::processing::quality_gate::BatchOutcome;

/// Selects the extractor for a document format
pub trait ExtractorFactory: Send + Sync {
    fn for_format(&self, format: DocumentFormat) -> Result<&dyn TableExtractor>;
}

/// External capability that turns free-text postings into raw records.
/// Each returned value is a JSON object keyed by canonical field names.
pub trait FreeTextExtractor: Send + Sync {
    fn extract_records(&self, text: &str) -> Result<Vec<Value>>;
}

/// Persistence collaborator receiving the partitioned batch
pub trait RecordSink: Send + Sync {
    fn write_batch(&self, batch: &BatchOutcome) -> Result<()>;
}
