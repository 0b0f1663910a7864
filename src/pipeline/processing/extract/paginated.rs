use std::collections::BTreeMap;
use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use super::candidate::{is_position_header, keyword_hits};
use super::ocr::ImageExtractor;
use super::page_text::{layout_text, page_runs};
use super::{ensure_exists, wrong_document, Document, DocumentFormat, TableExtractor};
use crate::constants::{
    CANDIDATE_MIN_KEYWORD_HITS, NATIVE_TEXT_MIN_CHARS, SCANNED_PAGE_MAX_CHARS, SCANNED_PROBE_PAGES,
};
use crate::domain::{RawTable, TableOrigin};
use crate::error::Result;

// Columns in extracted page text are separated by tabs or runs of spaces
static COLUMN_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t+|\s{2,}").expect("static regex is valid"));

const MAX_INHERIT_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageImage {
    /// Baseline JPEG bytes, decodable as-is
    Jpeg(Vec<u8>),
    /// Inflated 8-bit samples, one or three channels per pixel
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        samples: Vec<u8>,
    },
    /// An image stream this crate cannot decode, with its filter chain
    Other(String),
}

impl PageImage {
    pub fn decode(&self) -> Option<DynamicImage> {
        match self {
            PageImage::Jpeg(bytes) => match image::load_from_memory(bytes) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!("PageImage: undecodable JPEG: {}", e);
                    None
                }
            },
            PageImage::Raw {
                width,
                height,
                channels: 1,
                samples,
            } => GrayImage::from_raw(*width, *height, samples.clone()).map(DynamicImage::ImageLuma8),
            PageImage::Raw {
                width,
                height,
                samples,
                ..
            } => RgbImage::from_raw(*width, *height, samples.clone()).map(DynamicImage::ImageRgb8),
            PageImage::Other(_) => None,
        }
    }
}

/// Per-page access to a paginated document. Pages are numbered from 1.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, page: u32) -> String;

    fn page_images(&self, page: u32) -> Vec<PageImage>;
}

/// PDF pages read through `lopdf`
pub struct LopdfSource {
    doc: lopdf::Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfSource {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_exists(path)?;
        let doc = lopdf::Document::load(path)?;
        let pages = doc.get_pages();
        debug!("LopdfSource: {} pages={}", path.display(), pages.len());
        Ok(Self { doc, pages })
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// The page's XObject dictionary, following inherited resources up the page tree
    fn xobjects(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERIT_DEPTH {
            if let Ok(resources) = node.get(b"Resources") {
                let resources = self.resolve(resources)?.as_dict().ok()?;
                let xobjects = resources.get(b"XObject").ok()?;
                return self.resolve(xobjects)?.as_dict().ok();
            }
            let parent = node.get(b"Parent").ok()?;
            node = self.resolve(parent)?.as_dict().ok()?;
        }
        None
    }

    fn image_of(&self, stream: &Stream) -> PageImage {
        let filters = stream_filters(&stream.dict);
        let names: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();
        match names.as_slice() {
            [b"DCTDecode"] => PageImage::Jpeg(stream.content.clone()),
            [b"FlateDecode"] => self
                .inflate(stream)
                .unwrap_or_else(|| PageImage::Other("FlateDecode".into())),
            _ => PageImage::Other(
                names
                    .iter()
                    .map(|n| String::from_utf8_lossy(n).into_owned())
                    .collect::<Vec<_>>()
                    .join("+"),
            ),
        }
    }

    fn inflate(&self, stream: &Stream) -> Option<PageImage> {
        let dict = &stream.dict;
        let int = |key: &str| {
            dict.get(key.as_bytes())
                .ok()
                .and_then(|o| self.resolve(o))
                .and_then(|o| o.as_i64().ok())
        };
        if int("BitsPerComponent")? != 8 {
            return None;
        }
        let channels = match dict.get(b"ColorSpace").ok().and_then(|o| self.resolve(o)) {
            Some(Object::Name(name)) if name.as_slice() == b"DeviceGray" => 1,
            Some(Object::Name(name)) if name.as_slice() == b"DeviceRGB" => 3,
            _ => return None,
        };
        let width = u32::try_from(int("Width")?).ok()?;
        let height = u32::try_from(int("Height")?).ok()?;

        // lopdf refuses to inflate image streams directly
        let mut plain = stream.clone();
        plain.dict.remove(b"Subtype");
        let samples = plain.decompressed_content().ok()?;
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() < expected {
            return None;
        }
        Some(PageImage::Raw {
            width,
            height,
            channels,
            samples: samples[..expected].to_vec(),
        })
    }
}

impl PageSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: u32) -> String {
        let Some(&page_id) = self.pages.get(&page) else {
            return String::new();
        };
        match page_runs(&self.doc, page_id) {
            Ok(runs) => layout_text(&runs),
            Err(e) => {
                debug!("LopdfSource: no text on page {}: {}", page, e);
                String::new()
            }
        }
    }

    fn page_images(&self, page: u32) -> Vec<PageImage> {
        let Some(&page_id) = self.pages.get(&page) else {
            return Vec::new();
        };
        let Some(xobjects) = self.xobjects(page_id) else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, object)| {
                let stream = self.resolve(object)?.as_stream().ok()?;
                match stream.dict.get(b"Subtype") {
                    Ok(Object::Name(name)) if name.as_slice() == b"Image" => {}
                    _ => return None,
                }
                Some(self.image_of(stream))
            })
            .collect()
    }
}

fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Reads tables from PDFs; scanned documents are routed through OCR when configured
#[derive(Debug, Clone, Default)]
pub struct PaginatedExtractor {
    ocr: Option<ImageExtractor>,
}

impl PaginatedExtractor {
    pub fn new() -> Self {
        Self { ocr: None }
    }

    pub fn with_ocr(ocr: ImageExtractor) -> Self {
        Self { ocr: Some(ocr) }
    }

    pub fn extract_file(&self, path: &Path) -> Result<Vec<RawTable>> {
        let source = LopdfSource::open(path)?;
        info!(
            "PaginatedExtractor: {} pages={}",
            path.display(),
            source.page_count()
        );
        let tables = self.extract_source(&source)?;
        if tables.is_empty() {
            warn!("PaginatedExtractor: no tables found in {}", path.display());
        }
        Ok(tables)
    }

    pub fn extract_source(&self, source: &dyn PageSource) -> Result<Vec<RawTable>> {
        if is_scanned(source) {
            info!("PaginatedExtractor: scanned document, using OCR");
            return self.extract_scanned(source);
        }

        let mut tables = Vec::new();
        for page in 1..=source.page_count() as u32 {
            let page_tables = text_tables(&source.page_text(page), page);
            debug!(
                "PaginatedExtractor: page {} tables={}",
                page,
                page_tables.len()
            );
            tables.extend(page_tables);
        }
        Ok(tables)
    }

    fn extract_scanned(&self, source: &dyn PageSource) -> Result<Vec<RawTable>> {
        let Some(ocr) = &self.ocr else {
            error!("PaginatedExtractor: scanned document but no OCR engine configured");
            return Ok(Vec::new());
        };

        let mut tables = Vec::new();
        for page in 1..=source.page_count() as u32 {
            for image in source.page_images(page) {
                if let PageImage::Other(filters) = &image {
                    warn!(
                        "PaginatedExtractor: skipping {} image on page {}, no decoder",
                        filters, page
                    );
                    continue;
                }
                if let Some(decoded) = image.decode() {
                    tables.extend(ocr.extract_image(&decoded, None, Some(page))?);
                }
            }
        }
        Ok(tables)
    }

    /// Text of every page with content, separated by blank lines
    pub fn extract_text(&self, path: &Path) -> Result<String> {
        let source = LopdfSource::open(path)?;
        Ok((1..=source.page_count() as u32)
            .map(|page| source.page_text(page))
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    pub fn page_count(&self, path: &Path) -> Result<usize> {
        Ok(LopdfSource::open(path)?.page_count())
    }
}

impl TableExtractor for PaginatedExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Paginated
    }

    fn extract(&self, document: &Document) -> Result<Vec<RawTable>> {
        match document {
            Document::Paginated { path } => self.extract_file(path),
            other => Err(wrong_document(DocumentFormat::Paginated, other)),
        }
    }

    fn identify_candidate(&self, table: &RawTable) -> bool {
        table.rows().len() >= 2 && is_position_header(table.header_texts())
    }
}

/// Scanned when an early page has images and almost no text, before any page proves
/// to be text-native
pub fn is_scanned(source: &dyn PageSource) -> bool {
    let probe = source.page_count().min(SCANNED_PROBE_PAGES) as u32;
    for page in 1..=probe {
        let chars = source.page_text(page).trim().chars().count();
        if chars > NATIVE_TEXT_MIN_CHARS {
            return false;
        }
        if chars < SCANNED_PAGE_MAX_CHARS && !source.page_images(page).is_empty() {
            return true;
        }
    }
    false
}

/// Split one line of page text into column cells
pub fn split_columns(line: &str) -> Vec<String> {
    COLUMN_GAP
        .split(line.trim())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tables laid out as aligned text: a header line with position keywords followed
/// by multi-column lines, ending at a blank or single-column line
pub fn text_tables(text: &str, page: u32) -> Vec<RawTable> {
    let lines: Vec<&str> = text.lines().collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let header = split_columns(lines[i]);
        if header.len() < 2 || keyword_hits(&header) < CANDIDATE_MIN_KEYWORD_HITS {
            i += 1;
            continue;
        }

        let mut rows = vec![header];
        i += 1;
        while i < lines.len() {
            let cells = split_columns(lines[i]);
            if cells.len() < 2 {
                break;
            }
            rows.push(cells);
            i += 1;
        }

        tables.push(RawTable::new(
            rows,
            0,
            TableOrigin::Page {
                page,
                table_index: tables.len(),
            },
        ));
    }
    tables
}
