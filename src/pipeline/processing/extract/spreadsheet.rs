use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::candidate::{is_position_header, keyword_hits};
use super::markup::MarkupExtractor;
use super::{ensure_exists, wrong_document, Document, DocumentFormat, TableExtractor};
use crate::constants::{CANDIDATE_MIN_KEYWORD_HITS, SHEET_CANDIDATE_ROWS, SHEET_HEADER_SEARCH_ROWS};
use crate::domain::{clean_cell, RawTable, TableOrigin};
use crate::error::Result;
use crate::pipeline::processing::schema::SchemaDictionary;

const SNIFF_BYTES: u64 = 1000;
const MARKUP_MARKERS: [&str; 4] = ["<html", "<!doctype html", "<table", "<head"];

/// Reads every sheet of a workbook; sheets without a position header are skipped.
///
/// Some sites serve an HTML table with a spreadsheet extension. Those files are
/// detected by content and handed to the markup extractor.
#[derive(Debug, Clone)]
pub struct SpreadsheetExtractor {
    markup: MarkupExtractor,
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new(SchemaDictionary::global())
    }
}

impl SpreadsheetExtractor {
    pub fn new(dictionary: Arc<SchemaDictionary>) -> Self {
        Self {
            markup: MarkupExtractor::new(dictionary),
        }
    }

    pub fn extract_workbook(&self, path: &Path, sheet: Option<&str>) -> Result<Vec<RawTable>> {
        ensure_exists(path)?;

        if is_disguised_markup(path)? {
            info!(
                "SpreadsheetExtractor: {} is markup with a spreadsheet extension",
                path.display()
            );
            return self.extract_as_markup(path);
        }

        let mut workbook = match open_workbook_auto(path) {
            Ok(workbook) => workbook,
            Err(e) => {
                warn!(
                    "SpreadsheetExtractor: failed to open {} as workbook, retrying as markup: {}",
                    path.display(),
                    e
                );
                let tables = self.extract_as_markup(path)?;
                if tables.is_empty() {
                    return Err(e.into());
                }
                return Ok(tables);
            }
        };

        let sheet_names = workbook.sheet_names().to_vec();
        debug!(
            "SpreadsheetExtractor: {} sheets={:?}",
            path.display(),
            sheet_names
        );

        if let Some(wanted) = sheet {
            if !sheet_names.iter().any(|n| n == wanted) {
                warn!(
                    "SpreadsheetExtractor: sheet '{}' not found in {}",
                    wanted,
                    path.display()
                );
                return Ok(Vec::new());
            }
        }

        let mut tables = Vec::new();
        for name in sheet_names
            .iter()
            .filter(|n| sheet.map_or(true, |wanted| wanted == n.as_str()))
        {
            let range = match workbook.worksheet_range(name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("SpreadsheetExtractor: unreadable sheet '{}': {}", name, e);
                    continue;
                }
            };
            let rows: Vec<Vec<String>> = range
                .rows()
                .map(|row| row.iter().map(cell_text).collect())
                .collect();

            match sheet_to_table(name, rows) {
                Some(table) => {
                    info!(
                        "SpreadsheetExtractor: sheet '{}' header_row={} rows={}",
                        name,
                        table.header_index(),
                        table.rows().len()
                    );
                    tables.push(table);
                }
                None => debug!("SpreadsheetExtractor: sheet '{}' is not a position sheet", name),
            }
        }

        if tables.is_empty() {
            warn!(
                "SpreadsheetExtractor: no position sheets found in {}",
                path.display()
            );
        }
        Ok(tables)
    }

    fn extract_as_markup(&self, path: &Path) -> Result<Vec<RawTable>> {
        Ok(self.markup.extract_tables(&read_lossy(path)?))
    }

    pub fn sheet_names(&self, path: &Path) -> Result<Vec<String>> {
        ensure_exists(path)?;
        Ok(open_workbook_auto(path)?.sheet_names().to_vec())
    }

    /// Cell text of one sheet, every row, no header detection
    pub fn sheet_rows(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>> {
        ensure_exists(path)?;
        let range = open_workbook_auto(path)?.worksheet_range(sheet)?;
        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    /// Every sheet as tab-separated lines under a `=== Sheet: name ===` banner.
    /// Markup saved as a workbook is dumped through the markup extractor.
    pub fn extract_text(&self, path: &Path) -> Result<String> {
        ensure_exists(path)?;
        if is_disguised_markup(path)? {
            return Ok(self.markup.extract_text(&read_lossy(path)?));
        }

        let mut workbook = match open_workbook_auto(path) {
            Ok(workbook) => workbook,
            Err(e) => {
                debug!(
                    "SpreadsheetExtractor: text dump of {} falling back to markup: {}",
                    path.display(),
                    e
                );
                let text = self.markup.extract_text(&read_lossy(path)?);
                if text.trim().is_empty() {
                    return Err(e.into());
                }
                return Ok(text);
            }
        };

        let mut out = String::new();
        for name in workbook.sheet_names().to_vec() {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("SpreadsheetExtractor: unreadable sheet '{}': {}", name, e);
                    continue;
                }
            };
            out.push_str(&format!("=== Sheet: {} ===\n", name));
            for row in range.rows() {
                let line = row.iter().map(cell_text).collect::<Vec<_>>().join("\t");
                if !line.trim().is_empty() {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned())
}

impl TableExtractor for SpreadsheetExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Spreadsheet
    }

    fn extract(&self, document: &Document) -> Result<Vec<RawTable>> {
        match document {
            Document::Spreadsheet { path, sheet } => self.extract_workbook(path, sheet.as_deref()),
            other => Err(wrong_document(DocumentFormat::Spreadsheet, other)),
        }
    }

    /// Tables recovered from disguised markup are judged by the markup rule
    fn identify_candidate(&self, table: &RawTable) -> bool {
        match table.origin {
            TableOrigin::Markup { .. } => self.markup.identify_candidate(table),
            _ => is_position_header(table.header_texts()),
        }
    }
}

/// Turn a sheet's cell text into a table when one of its leading rows is a position header
pub fn sheet_to_table(name: &str, rows: Vec<Vec<String>>) -> Option<RawTable> {
    let is_candidate = rows
        .iter()
        .take(SHEET_CANDIDATE_ROWS)
        .any(|row| keyword_hits(row) >= CANDIDATE_MIN_KEYWORD_HITS);
    if !is_candidate {
        return None;
    }

    let header_index = rows
        .iter()
        .take(SHEET_HEADER_SEARCH_ROWS)
        .position(|row| keyword_hits(row) >= CANDIDATE_MIN_KEYWORD_HITS)?;

    Some(RawTable::new(
        rows,
        header_index,
        TableOrigin::Sheet {
            name: name.to_string(),
        },
    ))
}

pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => clean_cell(s),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => if *b { "是" } else { "否" }.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
            None => float_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| s.clone()),
        Data::DurationIso(s) => s.clone(),
    }
}

fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Content sniffing: markup saved under a workbook extension
pub fn is_disguised_markup(path: &Path) -> Result<bool> {
    let mut head = Vec::new();
    File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut head)?;
    Ok(looks_like_markup(&head))
}

fn looks_like_markup(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head).to_lowercase();
    MARKUP_MARKERS.iter().any(|marker| text.contains(marker))
}
