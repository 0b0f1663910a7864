use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::ports::{ExtractorFactory, FreeTextExtractor, RecordSink};
use crate::config::Config;
use crate::domain::{rows_to_records, RawRecord};
use crate::error::Result;
use crate::infra::extractor_factory::ExtractorRegistry;
use crate::pipeline::processing::extract::{Document, DocumentFormat};
use crate::pipeline::processing::mapper::FieldMapper;
use crate::pipeline::processing::normalize::rules::value_text;
use crate::pipeline::processing::normalize::{NormalizedRecord, Normalizer};
use crate::pipeline::processing::quality_gate::{BatchOutcome, Validator};
use crate::pipeline::processing::schema::SchemaDictionary;

/// Everything produced for one document
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub format: Option<DocumentFormat>,
    pub tables_found: usize,
    pub tables_used: usize,
    pub raw_records: Vec<RawRecord>,
    pub batch: BatchOutcome,
    /// Why tables or rows were skipped
    pub diagnostics: Vec<String>,
}

/// extract → candidate filter → map headers → records → normalize → validate
pub struct PositionExtractionUseCase {
    extractors: Box<dyn ExtractorFactory>,
    mapper: FieldMapper,
    normalizer: Normalizer,
    validator: Validator,
    sink: Option<Box<dyn RecordSink>>,
}

impl PositionExtractionUseCase {
    pub fn new(
        extractors: Box<dyn ExtractorFactory>,
        mapper: FieldMapper,
        validator: Validator,
    ) -> Self {
        Self {
            extractors,
            mapper,
            normalizer: Normalizer::new(),
            validator,
            sink: None,
        }
    }

    /// Dictionary, OCR engine and validator thresholds all come from the config
    pub fn from_config(config: &Config) -> Result<Self> {
        let dictionary = match &config.schema.dictionary_path {
            Some(path) => Arc::new(SchemaDictionary::load(path)?),
            None => SchemaDictionary::global(),
        };
        let registry = ExtractorRegistry::from_config(config, dictionary.clone());
        Ok(Self::new(
            Box::new(registry),
            FieldMapper::new(dictionary),
            Validator::with_config(config.validator.clone()),
        ))
    }

    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn process(&self, document: &Document) -> Result<ExtractionReport> {
        let format = document.format();
        let (raw_records, tables_found, tables_used, diagnostics) =
            self.extract_raw_records(document)?;

        let normalized: Vec<NormalizedRecord> = raw_records
            .iter()
            .map(|r| self.normalizer.normalize(r))
            .collect();
        let batch = self.finish(normalized)?;

        info!(
            "PositionExtractionUseCase: {} tables={}/{} records={}",
            format,
            tables_used,
            tables_found,
            raw_records.len()
        );
        Ok(ExtractionReport {
            format: Some(format),
            tables_found,
            tables_used,
            raw_records,
            batch,
            diagnostics,
        })
    }

    /// Raw records from every candidate table, plus table counts and diagnostics
    pub fn extract_raw_records(
        &self,
        document: &Document,
    ) -> Result<(Vec<RawRecord>, usize, usize, Vec<String>)> {
        let extractor = self.extractors.for_format(document.format())?;
        let tables = extractor.extract(document)?;
        let mut diagnostics = Vec::new();
        let mut records = Vec::new();
        let mut used = 0;

        if tables.is_empty() {
            diagnostics.push(format!("no tables found in {} document", document.format()));
        }

        for table in &tables {
            if !extractor.identify_candidate(table) {
                debug!("skipping non-position table {:?}", table.origin);
                diagnostics.push(format!("not a position table: {:?}", table.origin));
                continue;
            }
            let header = self.mapper.map_headers(table.header_texts());
            let rows = rows_to_records(table, &header);
            if rows.is_empty() {
                diagnostics.push(format!("position table without data rows: {:?}", table.origin));
                continue;
            }
            used += 1;
            records.extend(rows);
        }

        if used == 0 && !tables.is_empty() {
            warn!(
                "PositionExtractionUseCase: none of {} tables held positions",
                tables.len()
            );
        }
        Ok((records, tables.len(), used, diagnostics))
    }

    /// Records already pulled out of free text by the external collaborator
    pub fn process_free_text(
        &self,
        text: &str,
        extractor: &dyn FreeTextExtractor,
    ) -> Result<ExtractionReport> {
        let values = extractor.extract_records(text)?;
        let mut diagnostics = Vec::new();

        let mut raw_records = Vec::new();
        let mut normalized = Vec::new();
        for value in &values {
            let Value::Object(map) = value else {
                diagnostics.push(format!("free-text record is not an object: {}", value));
                continue;
            };
            raw_records.push(RawRecord {
                fields: map
                    .iter()
                    .filter_map(|(k, v)| field_text(v).map(|t| (k.clone(), t)))
                    .collect(),
            });
            normalized.push(self.normalizer.normalize_map(map));
        }
        if values.is_empty() {
            diagnostics.push("free-text extractor returned no records".to_string());
        }

        let batch = self.finish(normalized)?;
        Ok(ExtractionReport {
            format: None,
            tables_found: 0,
            tables_used: 0,
            raw_records,
            batch,
            diagnostics,
        })
    }

    fn finish(&self, normalized: Vec<NormalizedRecord>) -> Result<BatchOutcome> {
        let batch = self.validator.validate_batch(&normalized);
        if let Some(sink) = &self.sink {
            sink.write_batch(&batch)?;
        }
        Ok(batch)
    }
}

/// Raw-record text of a free-text field: lists are joined with `、`, objects kept as JSON
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(field_text)
                .collect::<Vec<_>>()
                .join("、"),
        ),
        Value::Object(_) => Some(value.to_string()),
        scalar => value_text(scalar),
    }
}
