//! Image/OCR table extraction.
//!
//! The recognition engine is injected as a [`TextRecognizer`]; two command-line
//! engines ship with the crate and tests substitute a fake.

pub mod layout;
pub mod paddle;
pub mod preprocess;
pub mod tesseract;

use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ensure_exists, wrong_document, Document, DocumentFormat, PixelRegion, TableExtractor};
use crate::config::OcrConfig;
use crate::domain::{RawTable, TableOrigin};
use crate::error::{ExtractError, Result};

pub use layout::{group_into_rows, LayoutConfig};
pub use paddle::PaddleOcrRecognizer;
pub use tesseract::TesseractRecognizer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }
}

/// One recognized text item; confidence is in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OcrOutput {
    pub text: String,
    pub lines: Vec<OcrLine>,
}

/// A text/layout recognition engine
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrLine>>;
}

/// Runs one recognition at a time through the wrapped engine
pub struct SerializedRecognizer<R> {
    inner: Mutex<R>,
    name: String,
}

impl<R: TextRecognizer> SerializedRecognizer<R> {
    pub fn new(inner: R) -> Self {
        let name = format!("serialized-{}", inner.name());
        Self {
            inner: Mutex::new(inner),
            name,
        }
    }
}

impl<R: TextRecognizer> TextRecognizer for SerializedRecognizer<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrLine>> {
        let engine = self
            .inner
            .lock()
            .map_err(|_| ExtractError::Recognition(format!("{} lock poisoned", self.name)))?;
        engine.recognize(image)
    }
}

/// Check that an engine executable can be started at all
pub(crate) fn probe_executable(backend: &str, binary: &str, arg: &str) -> Result<()> {
    match Command::new(binary).arg(arg).output() {
        Ok(output) => {
            debug!(
                "{}: probe '{} {}' exit={}",
                backend, binary, arg, output.status
            );
            Ok(())
        }
        Err(e) => Err(ExtractError::backend_unavailable(
            backend,
            format!("cannot run '{}': {}", binary, e),
        )),
    }
}

/// Extracts a table from an image by recognizing text and clustering it into rows
#[derive(Clone)]
pub struct ImageExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    layout: LayoutConfig,
    denoise_radius: u32,
}

impl std::fmt::Debug for ImageExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageExtractor")
            .field("recognizer", &self.recognizer.name())
            .field("layout", &self.layout)
            .field("denoise_radius", &self.denoise_radius)
            .finish()
    }
}

impl ImageExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self::with_config(recognizer, &OcrConfig::default())
    }

    pub fn with_config(recognizer: Arc<dyn TextRecognizer>, config: &OcrConfig) -> Self {
        Self {
            recognizer,
            layout: LayoutConfig {
                row_threshold: config.row_threshold_px,
                max_distinct_row_lengths: config.max_distinct_row_lengths,
            },
            denoise_radius: config.denoise_radius,
        }
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Raw recognized lines and their joined text
    pub fn recognize(&self, path: &Path, region: Option<PixelRegion>) -> Result<OcrOutput> {
        ensure_exists(path)?;
        let image = image::open(path)?;
        self.recognize_image(&image, region)
    }

    pub fn recognize_image(
        &self,
        image: &DynamicImage,
        region: Option<PixelRegion>,
    ) -> Result<OcrOutput> {
        let prepared = preprocess::prepare(image, region, self.denoise_radius);
        let lines = self
            .recognizer
            .recognize(&DynamicImage::ImageLuma8(prepared))?;
        debug!(
            "ImageExtractor: {} recognized {} lines",
            self.recognizer.name(),
            lines.len()
        );
        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(OcrOutput { text, lines })
    }

    /// At most one table per image; an empty list when the layout is not tabular
    pub fn extract_image(
        &self,
        image: &DynamicImage,
        region: Option<PixelRegion>,
        page: Option<u32>,
    ) -> Result<Vec<RawTable>> {
        let output = self.recognize_image(image, region)?;
        let rows = group_into_rows(&output.lines, &self.layout);
        if rows.is_empty() {
            warn!(
                "ImageExtractor: no table layout in image page={:?} lines={}",
                page,
                output.lines.len()
            );
            return Ok(Vec::new());
        }
        info!("ImageExtractor: table rows={} page={:?}", rows.len(), page);
        Ok(vec![RawTable::new(rows, 0, TableOrigin::Image { page })])
    }
}

impl TableExtractor for ImageExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Image
    }

    fn extract(&self, document: &Document) -> Result<Vec<RawTable>> {
        match document {
            Document::Image { path, region } => {
                ensure_exists(path)?;
                let image = image::open(path)?;
                self.extract_image(&image, *region, None)
            }
            other => Err(wrong_document(DocumentFormat::Image, other)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{line, FixedRecognizer};
    use super::*;
    use image::{GrayImage, Luma};

    fn blank_image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([255u8])))
    }

    #[test]
    fn test_extract_image_builds_table() {
        let recognizer = FixedRecognizer(vec![
            line("招录人数", 300.0, 10.0),
            line("职位名称", 100.0, 12.0),
            line("5", 300.0, 52.0),
            line("科员", 100.0, 50.0),
        ]);
        let extractor = ImageExtractor::new(Arc::new(recognizer));
        let tables = extractor.extract_image(&blank_image(), None, Some(2)).unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows()[0], vec!["职位名称", "招录人数"]);
        assert_eq!(tables[0].rows()[1], vec!["科员", "5"]);
        assert_eq!(tables[0].origin, TableOrigin::Image { page: Some(2) });
    }

    #[test]
    fn test_single_row_is_not_a_table() {
        let recognizer = FixedRecognizer(vec![line("公告", 10.0, 10.0)]);
        let extractor = ImageExtractor::new(Arc::new(recognizer));
        assert!(extractor
            .extract_image(&blank_image(), None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_recognize_joins_text() {
        let recognizer = FixedRecognizer(vec![line("第一行", 10.0, 10.0), line("第二行", 10.0, 60.0)]);
        let extractor = ImageExtractor::new(Arc::new(SerializedRecognizer::new(recognizer)));
        let output = extractor.recognize_image(&blank_image(), None).unwrap();
        assert_eq!(output.text, "第一行\n第二行");
        assert_eq!(extractor.recognizer_name(), "serialized-fixed");
    }

    #[test]
    fn test_missing_executable_is_rejected() {
        let result = probe_executable("tesseract", "/nonexistent/bin/tesseract", "--version");
        assert!(matches!(
            result,
            Err(ExtractError::BackendUnavailable { .. })
        ));
    }
}
