use std::process::Command;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use super::{probe_executable, BoundingBox, OcrLine, TextRecognizer};
use crate::config::OcrConfig;
use crate::error::{ExtractError, Result};

const BACKEND: &str = "tesseract";

/// Drives the `tesseract` executable and reads its word-level TSV output
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    languages: String,
}

impl TesseractRecognizer {
    /// Fails with `BackendUnavailable` when the executable cannot be started
    pub fn new(binary: impl Into<String>, languages: impl Into<String>) -> Result<Self> {
        let binary = binary.into();
        probe_executable(BACKEND, &binary, "--version")?;
        info!("TesseractRecognizer: using '{}'", binary);
        Ok(Self {
            binary,
            languages: languages.into(),
        })
    }

    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        Self::new(
            config.binary.clone().unwrap_or_else(|| BACKEND.to_string()),
            config.languages.clone(),
        )
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        BACKEND
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrLine>> {
        let input = tempfile::Builder::new()
            .prefix("recruit-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(input.path(), ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("tsv")
            .output()
            .map_err(|e| ExtractError::backend_unavailable(BACKEND, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Recognition(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let lines = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!("TesseractRecognizer: {} words", lines.len());
        Ok(lines)
    }
}

/// Word rows (level 5) with text; confidence is rescaled from 0–100
pub fn parse_tsv(tsv: &str) -> Vec<OcrLine> {
    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            let left: f32 = cols[6].parse().ok()?;
            let top: f32 = cols[7].parse().ok()?;
            let width: f32 = cols[8].parse().ok()?;
            let height: f32 = cols[9].parse().ok()?;
            let conf: f32 = cols[10].parse().ok()?;
            Some(OcrLine {
                text: text.to_string(),
                bbox: BoundingBox::new(left, top, left + width, top + height),
                confidence: (conf / 100.0).clamp(0.0, 1.0),
            })
        })
        .collect()
}
