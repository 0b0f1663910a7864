use std::sync::Arc;

use tracing::{info, warn};

use crate::app::ports::ExtractorFactory;
use crate::config::{Config, OcrConfig, OcrEngine};
use crate::error::{ExtractError, Result};
use crate::pipeline::processing::extract::ocr::paddle::PaddleOcrRecognizer;
use crate::pipeline::processing::extract::ocr::tesseract::TesseractRecognizer;
use crate::pipeline::processing::extract::ocr::{SerializedRecognizer, TextRecognizer};
use crate::pipeline::processing::extract::{
    DocumentFormat, ImageExtractor, MarkupExtractor, PaginatedExtractor, SpreadsheetExtractor,
    TableExtractor, WordProcessorExtractor,
};
use crate::pipeline::processing::schema::SchemaDictionary;

/// One extractor per document format. Image extraction (and OCR of scanned
/// PDFs and of images embedded in .docx files) is only available when a
/// recognizer was supplied or could be built.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    markup: MarkupExtractor,
    spreadsheet: SpreadsheetExtractor,
    paginated: PaginatedExtractor,
    word: WordProcessorExtractor,
    image: Option<ImageExtractor>,
}

impl ExtractorRegistry {
    /// Text-only registry: no OCR
    pub fn new(dictionary: Arc<SchemaDictionary>) -> Self {
        Self {
            markup: MarkupExtractor::new(dictionary.clone()),
            spreadsheet: SpreadsheetExtractor::new(dictionary),
            paginated: PaginatedExtractor::new(),
            word: WordProcessorExtractor::new(),
            image: None,
        }
    }

    pub fn with_recognizer(
        dictionary: Arc<SchemaDictionary>,
        recognizer: Arc<dyn TextRecognizer>,
        ocr: &OcrConfig,
    ) -> Self {
        let image = ImageExtractor::with_config(recognizer, ocr);
        Self {
            paginated: PaginatedExtractor::with_ocr(image.clone()),
            word: WordProcessorExtractor::with_ocr(image.clone()),
            image: Some(image),
            ..Self::new(dictionary)
        }
    }

    /// Builds the configured OCR engine; a missing engine leaves OCR disabled
    /// rather than failing the text formats.
    pub fn from_config(config: &Config, dictionary: Arc<SchemaDictionary>) -> Self {
        match build_recognizer(&config.ocr) {
            Ok(recognizer) => {
                info!("ExtractorRegistry: OCR engine '{}'", recognizer.name());
                Self::with_recognizer(dictionary, recognizer, &config.ocr)
            }
            Err(e) => {
                warn!("ExtractorRegistry: OCR disabled: {}", e);
                Self::new(dictionary)
            }
        }
    }

    pub fn has_ocr(&self) -> bool {
        self.image.is_some()
    }

    pub fn for_format(&self, format: DocumentFormat) -> Result<&dyn TableExtractor> {
        match format {
            DocumentFormat::Markup => Ok(&self.markup),
            DocumentFormat::Spreadsheet => Ok(&self.spreadsheet),
            DocumentFormat::Paginated => Ok(&self.paginated),
            DocumentFormat::WordProcessor => Ok(&self.word),
            DocumentFormat::Image => match &self.image {
                Some(image) => Ok(image),
                None => Err(ExtractError::backend_unavailable(
                    "ocr",
                    "no text recognizer configured",
                )),
            },
        }
    }

    pub fn markup(&self) -> &MarkupExtractor {
        &self.markup
    }

    pub fn paginated(&self) -> &PaginatedExtractor {
        &self.paginated
    }

    pub fn word(&self) -> &WordProcessorExtractor {
        &self.word
    }

    pub fn image(&self) -> Option<&ImageExtractor> {
        self.image.as_ref()
    }
}

impl ExtractorFactory for ExtractorRegistry {
    fn for_format(&self, format: DocumentFormat) -> Result<&dyn TableExtractor> {
        ExtractorRegistry::for_format(self, format)
    }
}

/// The configured engine, serialized behind a mutex so a shared instance is
/// never driven concurrently
pub fn build_recognizer(config: &OcrConfig) -> Result<Arc<dyn TextRecognizer>> {
    let recognizer: Arc<dyn TextRecognizer> = match config.engine {
        OcrEngine::Tesseract => Arc::new(SerializedRecognizer::new(
            TesseractRecognizer::from_config(config)?,
        )),
        OcrEngine::Paddle => Arc::new(SerializedRecognizer::new(
            PaddleOcrRecognizer::from_config(config)?,
        )),
    };
    Ok(recognizer)
}
