use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::ocr::ImageExtractor;
use super::{ensure_exists, wrong_document, Document, DocumentFormat, TableExtractor};
use crate::domain::{RawTable, TableOrigin};
use crate::error::{ExtractError, Result};

// Word caps a table grid at 63 columns
const MAX_GRID_COLUMNS: usize = 63;
const MEDIA_PREFIX: &str = "word/media/";

/// Reads tables from the body of a `.docx` container.
///
/// Only top-level tables are returned. Horizontally merged cells come back as
/// repeated text (like most docx readers report them); consecutive duplicates are
/// collapsed against the header. When OCR is attached, a document without
/// tables falls back to recognizing its embedded images.
#[derive(Debug, Clone, Default)]
pub struct WordProcessorExtractor {
    ocr: Option<ImageExtractor>,
}

/// A file stored under the container's `word/media/` folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl WordProcessorExtractor {
    pub fn new() -> Self {
        Self { ocr: None }
    }

    pub fn with_ocr(ocr: ImageExtractor) -> Self {
        Self { ocr: Some(ocr) }
    }

    pub fn extract_file(&self, path: &Path) -> Result<Vec<RawTable>> {
        let body = read_body(path)?;
        let tables = body
            .tables
            .into_iter()
            .enumerate()
            .filter_map(|(table_index, rows)| {
                let table = build_table(rows, table_index);
                match &table {
                    Some(t) => info!(
                        "WordProcessorExtractor: table {} cols={} rows={}",
                        table_index,
                        t.max_cols(),
                        t.rows().len()
                    ),
                    None => debug!("WordProcessorExtractor: table {} is empty", table_index),
                }
                table
            })
            .collect::<Vec<_>>();

        if tables.is_empty() {
            if let Some(ocr) = &self.ocr {
                info!(
                    "WordProcessorExtractor: no tables in {}, trying embedded images",
                    path.display()
                );
                return self.extract_image_tables(path, ocr);
            }
            warn!("WordProcessorExtractor: no tables in {}", path.display());
        }
        Ok(tables)
    }

    /// Embedded media in archive order of name
    pub fn extract_images(&self, path: &Path) -> Result<Vec<EmbeddedImage>> {
        let mut archive = open_archive(path)?;
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with(MEDIA_PREFIX) && n.len() > MEDIA_PREFIX.len())
            .map(str::to_string)
            .collect();
        names.sort();

        let mut images = Vec::with_capacity(names.len());
        for name in names {
            let mut bytes = Vec::new();
            archive.by_name(&name)?.read_to_end(&mut bytes)?;
            images.push(EmbeddedImage { name, bytes });
        }
        debug!(
            "WordProcessorExtractor: {} embedded images in {}",
            images.len(),
            path.display()
        );
        Ok(images)
    }

    /// Tables recognized in the document's embedded images
    pub fn extract_image_tables(&self, path: &Path, ocr: &ImageExtractor) -> Result<Vec<RawTable>> {
        let mut tables = Vec::new();
        for embedded in self.extract_images(path)? {
            match image::load_from_memory(&embedded.bytes) {
                Ok(decoded) => tables.extend(ocr.extract_image(&decoded, None, None)?),
                Err(e) => warn!(
                    "WordProcessorExtractor: skipping {}: {}",
                    embedded.name, e
                ),
            }
        }
        Ok(tables)
    }

    /// Non-empty body paragraphs outside tables, separated by blank lines
    pub fn extract_text(&self, path: &Path) -> Result<String> {
        let body = read_body(path)?;
        Ok(body
            .paragraphs
            .iter()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

impl TableExtractor for WordProcessorExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::WordProcessor
    }

    fn extract(&self, document: &Document) -> Result<Vec<RawTable>> {
        match document {
            Document::WordProcessor { path } => self.extract_file(path),
            other => Err(wrong_document(DocumentFormat::WordProcessor, other)),
        }
    }
}

/// Header row with consecutive duplicates collapsed, then every data row aligned to it
fn build_table(rows: Vec<Vec<String>>, table_index: usize) -> Option<RawTable> {
    let mut rows = rows.into_iter();
    let header = dedup_consecutive(rows.next()?);
    if header.iter().all(|h| h.is_empty()) {
        return None;
    }

    let width = header.len();
    let mut matrix = vec![header];
    for cells in rows {
        matrix.push(align_cells(cells, width));
    }

    Some(RawTable::new(
        matrix,
        0,
        TableOrigin::WordTable { table_index },
    ))
}

pub fn dedup_consecutive(cells: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(cells.len());
    for cell in cells {
        if out.last() != Some(&cell) {
            out.push(cell);
        }
    }
    out
}

/// Rows already as wide as the header are kept as is
pub fn align_cells(cells: Vec<String>, width: usize) -> Vec<String> {
    if cells.len() == width {
        return cells;
    }
    let mut cells = dedup_consecutive(cells);
    cells.resize(width, String::new());
    cells
}

#[derive(Debug, Default)]
struct WordBody {
    tables: Vec<Vec<Vec<String>>>,
    paragraphs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VMerge {
    None,
    Restart,
    Continue,
}

#[derive(Debug)]
struct WordCell {
    paragraphs: Vec<String>,
    grid_span: usize,
    v_merge: VMerge,
}

impl Default for WordCell {
    fn default() -> Self {
        Self {
            paragraphs: Vec::new(),
            grid_span: 1,
            v_merge: VMerge::None,
        }
    }
}

impl WordCell {
    fn text(&self) -> String {
        self.paragraphs.join("\n").trim().to_string()
    }
}

#[derive(Debug, Default)]
struct WordRow {
    grid_before: usize,
    cells: Vec<WordCell>,
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    ensure_exists(path)?;
    if path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("doc"))
    {
        return Err(ExtractError::LegacyWordFormat(path.to_path_buf()));
    }
    Ok(ZipArchive::new(BufReader::new(File::open(path)?))?)
}

fn read_body(path: &Path) -> Result<WordBody> {
    let mut archive = open_archive(path)?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;
    debug!(
        "WordProcessorExtractor: document.xml bytes={} from {}",
        xml.len(),
        path.display()
    );
    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<WordBody> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut body = WordBody::default();
    let mut depth = 0usize;
    let mut rows: Vec<WordRow> = Vec::new();
    let mut row: Option<WordRow> = None;
    let mut cell: Option<WordCell> = None;
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"tbl" => {
                    depth += 1;
                    if depth == 1 {
                        rows.clear();
                    }
                }
                b"tr" if depth == 1 => row = Some(WordRow::default()),
                b"tc" if depth == 1 => cell = Some(WordCell::default()),
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"gridSpan" if depth == 1 => {
                    if let Some(c) = cell.as_mut() {
                        c.grid_span = attr_usize(e, "val").unwrap_or(1).clamp(1, MAX_GRID_COLUMNS);
                    }
                }
                b"vMerge" if depth == 1 => {
                    if let Some(c) = cell.as_mut() {
                        c.v_merge = match attr(e, "val").as_deref() {
                            Some("restart") => VMerge::Restart,
                            _ => VMerge::Continue,
                        };
                    }
                }
                b"gridBefore" if depth == 1 => {
                    if let Some(r) = row.as_mut() {
                        r.grid_before = attr_usize(e, "val").unwrap_or(0).min(MAX_GRID_COLUMNS);
                    }
                }
                b"tab" if depth <= 1 => paragraph.push('\t'),
                b"br" if depth <= 1 => paragraph.push('\n'),
                _ => {}
            },
            Event::Text(e) => {
                if in_text && depth <= 1 {
                    paragraph.push_str(&e.unescape()?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if depth == 0 {
                        body.paragraphs.push(std::mem::take(&mut paragraph));
                    } else if depth == 1 {
                        if let Some(c) = cell.as_mut() {
                            c.paragraphs.push(std::mem::take(&mut paragraph));
                        }
                    }
                }
                b"tc" if depth == 1 => {
                    if let (Some(r), Some(c)) = (row.as_mut(), cell.take()) {
                        r.cells.push(c);
                    }
                }
                b"tr" if depth == 1 => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                b"tbl" => {
                    if depth == 1 {
                        body.tables.push(resolve_grid(std::mem::take(&mut rows)));
                    }
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(body)
}

/// Lay cells out on the table grid: a horizontal span repeats the text across
/// its grid columns, a vertical-merge continuation repeats the text above.
fn resolve_grid(rows: Vec<WordRow>) -> Vec<Vec<String>> {
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut line = vec![String::new(); row.grid_before];
        for cell in &row.cells {
            if line.len() >= MAX_GRID_COLUMNS {
                break;
            }
            let column = line.len();
            let text = match cell.v_merge {
                VMerge::Continue => grid
                    .last()
                    .and_then(|above| above.get(column))
                    .cloned()
                    .unwrap_or_default(),
                VMerge::None | VMerge::Restart => cell.text(),
            };
            let span = cell.grid_span.min(MAX_GRID_COLUMNS - line.len());
            line.extend(std::iter::repeat(text).take(span));
        }
        grid.push(line);
    }
    grid
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn attr_usize(e: &BytesStart, name: &str) -> Option<usize> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}
