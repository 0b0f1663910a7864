use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub validator: ValidatorConfig,
    pub ocr: OcrConfig,
    pub schema: SchemaConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum confidence for a record without hard errors to be valid
    pub confidence_threshold: u8,
    /// Invalid records at or above this confidence go to manual review
    pub review_threshold: u8,
    pub required_fields: Vec<String>,
    /// Inclusive `[min, max]` per integer field
    pub ranges: IndexMap<String, [i64; 2]>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let ranges = [
            (RECRUIT_COUNT, [1, 1000]),
            (AGE_MIN, [18, 35]),
            (AGE_MAX, [25, 60]),
            (WORK_EXP_YEARS_MIN, [0, 30]),
            (GRASSROOTS_EXP_YEARS, [0, 10]),
        ]
        .into_iter()
        .map(|(field, range)| (field.to_string(), range))
        .collect();

        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            required_fields: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            ranges,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    #[default]
    Tesseract,
    Paddle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: OcrEngine,
    /// Executable override; defaults to the engine's own command name
    pub binary: Option<String>,
    pub languages: String,
    /// Lines whose vertical centers are this close share a row
    pub row_threshold_px: f32,
    /// More distinct row lengths than this and the region is not a table
    pub max_distinct_row_lengths: usize,
    pub denoise_radius: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngine::default(),
            binary: None,
            languages: "chi_sim+eng".to_string(),
            row_threshold_px: 20.0,
            max_distinct_row_lengths: 3,
            denoise_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Replaces the built-in synonym dictionary when set
    pub dictionary_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "recruit_extract.log".to_string(),
            default_filter: "recruit_extract=info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let v = &self.validator;
        if v.confidence_threshold > 100 || v.review_threshold > v.confidence_threshold {
            return Err(ExtractError::Config(format!(
                "thresholds must satisfy review ({}) <= confidence ({}) <= 100",
                v.review_threshold, v.confidence_threshold
            )));
        }
        if let Some((field, [min, max])) = v.ranges.iter().find(|(_, [min, max])| min > max) {
            return Err(ExtractError::Config(format!(
                "range for '{}' is empty: [{}, {}]",
                field, min, max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.validator.confidence_threshold, 85);
        assert_eq!(config.validator.review_threshold, 60);
        assert_eq!(config.validator.ranges["recruit_count"], [1, 1000]);
        assert_eq!(config.ocr.engine, OcrEngine::Tesseract);
        assert_eq!(config.ocr.row_threshold_px, 20.0);
        assert!(config.schema.dictionary_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [validator]
            confidence_threshold = 90

            [validator.ranges]
            recruit_count = [1, 50]

            [ocr]
            engine = "paddle"
            binary = "/opt/paddle/bin/paddleocr"
            "#,
        )
        .unwrap();
        assert_eq!(config.validator.confidence_threshold, 90);
        assert_eq!(config.validator.review_threshold, 60);
        assert_eq!(config.validator.ranges.len(), 1);
        assert_eq!(config.ocr.engine, OcrEngine::Paddle);
        assert_eq!(config.ocr.languages, "chi_sim+eng");
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = Config::from_toml_str("[validator]\nreview_threshold = 95\n").unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::load("/nonexistent/recruit.toml").is_err());
    }
}
