use std::process::Command;

use image::{DynamicImage, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::{probe_executable, BoundingBox, OcrLine, TextRecognizer};
use crate::config::OcrConfig;
use crate::error::{ExtractError, Result};

const BACKEND: &str = "paddleocr";

// [[[x0, y0], [x1, y1], [x2, y2], [x3, y3]], ('text', score)]
static RESULT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\[\[\[\s*([\d.]+),\s*([\d.]+)\],\s*\[[\d.\s,]+\],\s*\[\s*([\d.]+),\s*([\d.]+)\],\s*\[[\d.\s,]+\]\],\s*\(\s*['"](.*)['"],\s*([\d.]+)\s*\)\]"#,
    )
    .expect("static regex is valid")
});

/// Drives the `paddleocr` command-line tool and parses its printed results
#[derive(Debug, Clone)]
pub struct PaddleOcrRecognizer {
    binary: String,
    lang: String,
}

impl PaddleOcrRecognizer {
    pub fn new(binary: impl Into<String>, lang: impl Into<String>) -> Result<Self> {
        let binary = binary.into();
        probe_executable(BACKEND, &binary, "--help")?;
        info!("PaddleOcrRecognizer: using '{}'", binary);
        Ok(Self {
            binary,
            lang: lang.into(),
        })
    }

    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        Self::new(
            config.binary.clone().unwrap_or_else(|| BACKEND.to_string()),
            paddle_lang(&config.languages),
        )
    }
}

/// Paddle names its Chinese model `ch`; tesseract-style language lists map onto it
fn paddle_lang(languages: &str) -> String {
    if languages.contains("chi") || languages.contains("ch") {
        "ch".to_string()
    } else {
        languages.split('+').next().unwrap_or("en").to_string()
    }
}

impl TextRecognizer for PaddleOcrRecognizer {
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
            .arg("--image_dir")
            .arg(input.path())
            .arg("--use_angle_cls")
            .arg("true")
            .arg("--lang")
            .arg(&self.lang)
            .output()
            .map_err(|e| ExtractError::backend_unavailable(BACKEND, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Recognition(format!(
                "paddleocr exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // Results are printed through the logger, which may go to either stream
        let mut printed = String::from_utf8_lossy(&output.stdout).into_owned();
        printed.push('\n');
        printed.push_str(&String::from_utf8_lossy(&output.stderr));

        let lines = parse_output(&printed);
        debug!("PaddleOcrRecognizer: {} lines", lines.len());
        Ok(lines)
    }
}

/// Box corners 0 and 2 span the text region
pub fn parse_output(printed: &str) -> Vec<OcrLine> {
    printed
        .lines()
        .filter_map(|line| {
            let caps = RESULT_LINE.captures(line)?;
            let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f32>().ok());
            Some(OcrLine {
                text: caps.get(5)?.as_str().to_string(),
                bbox: BoundingBox::new(number(1)?, number(2)?, number(3)?, number(4)?),
                confidence: number(6)?.clamp(0.0, 1.0),
            })
        })
        .collect()
}
