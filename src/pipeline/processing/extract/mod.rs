//! Format-specific table extractors.
//!
//! Every extractor turns one already-retrieved document into dense
//! [`RawTable`]s with an identified header row. "No table found" is never an
//! error: extractors log a warning and return an empty list. Missing files and
//! unreadable containers are typed errors.

pub mod candidate;
pub mod markup;
pub mod ocr;
pub mod page_text;
pub mod paginated;
pub mod spreadsheet;
pub mod word;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::RawTable;
use crate::error::{ExtractError, Result};

pub use candidate::{keyword_hits, synonym_cell_hits};
pub use markup::MarkupExtractor;
pub use ocr::ImageExtractor;
pub use paginated::PaginatedExtractor;
pub use spreadsheet::SpreadsheetExtractor;
pub use word::WordProcessorExtractor;

/// The closed set of supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Markup,
    Spreadsheet,
    Paginated,
    WordProcessor,
    Image,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Markup => "markup",
            DocumentFormat::Spreadsheet => "spreadsheet",
            DocumentFormat::Paginated => "paginated",
            DocumentFormat::WordProcessor => "word_processor",
            DocumentFormat::Image => "image",
        };
        f.write_str(name)
    }
}

/// Pixel rectangle `(x1, y1)`–`(x2, y2)`, exclusive of the far edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRegion {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

/// A retrieved document handed to the extraction core
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Markup { html: String },
    Spreadsheet { path: PathBuf, sheet: Option<String> },
    Paginated { path: PathBuf },
    WordProcessor { path: PathBuf },
    Image { path: PathBuf, region: Option<PixelRegion> },
}

impl Document {
    pub fn markup(html: impl Into<String>) -> Self {
        Document::Markup { html: html.into() }
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            Document::Markup { .. } => DocumentFormat::Markup,
            Document::Spreadsheet { .. } => DocumentFormat::Spreadsheet,
            Document::Paginated { .. } => DocumentFormat::Paginated,
            Document::WordProcessor { .. } => DocumentFormat::WordProcessor,
            Document::Image { .. } => DocumentFormat::Image,
        }
    }

    /// Pick the document kind from the file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_exists(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let document = match extension.as_str() {
            "html" | "htm" => Document::Markup {
                html: String::from_utf8_lossy(&fs::read(path)?).into_owned(),
            },
            "xlsx" | "xlsm" | "xls" | "ods" => Document::Spreadsheet {
                path: path.to_path_buf(),
                sheet: None,
            },
            "pdf" => Document::Paginated {
                path: path.to_path_buf(),
            },
            "docx" => Document::WordProcessor {
                path: path.to_path_buf(),
            },
            "doc" => return Err(ExtractError::LegacyWordFormat(path.to_path_buf())),
            "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" => Document::Image {
                path: path.to_path_buf(),
                region: None,
            },
            other => {
                return Err(ExtractError::UnsupportedFormat(format!(
                    "{} (extension '{}')",
                    path.display(),
                    other
                )))
            }
        };
        Ok(document)
    }
}

/// Shared contract of all format extractors
pub trait TableExtractor: Send + Sync {
    fn format(&self) -> DocumentFormat;

    /// All tables found in the document, each with its header row identified
    fn extract(&self, document: &Document) -> Result<Vec<RawTable>>;

    /// Whether the table plausibly holds recruitment position rows
    fn identify_candidate(&self, table: &RawTable) -> bool {
        candidate::is_position_header(table.header_texts())
    }
}

pub(crate) fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ExtractError::FileNotFound(path.to_path_buf()))
    }
}

pub(crate) fn wrong_document(expected: DocumentFormat, got: &Document) -> ExtractError {
    ExtractError::UnsupportedFormat(format!(
        "{} extractor cannot read a {} document",
        expected,
        got.format()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_path_dispatches_on_extension() {
        let dir = tempdir().unwrap();
        let cases = [
            ("a.xlsx", DocumentFormat::Spreadsheet),
            ("b.PDF", DocumentFormat::Paginated),
            ("c.docx", DocumentFormat::WordProcessor),
            ("d.jpg", DocumentFormat::Image),
            ("e.html", DocumentFormat::Markup),
        ];
        for (name, expected) in cases {
            let path = dir.path().join(name);
            fs::write(&path, b"<table></table>").unwrap();
            assert_eq!(Document::from_path(&path).unwrap().format(), expected, "{}", name);
        }
    }

    #[test]
    fn test_from_path_rejects_legacy_doc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.doc");
        fs::write(&path, b"binary").unwrap();
        assert!(matches!(
            Document::from_path(&path),
            Err(ExtractError::LegacyWordFormat(_))
        ));
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            Document::from_path("/nonexistent/positions.xlsx"),
            Err(ExtractError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_from_path_unknown_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.rar");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(
            Document::from_path(&path),
            Err(ExtractError::UnsupportedFormat(_))
        ));
    }
}
