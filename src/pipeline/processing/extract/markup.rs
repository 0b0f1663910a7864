use std::sync::Arc;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::candidate::{keyword_cell_hits, synonym_cell_hits};
use super::{wrong_document, Document, DocumentFormat, TableExtractor};
use crate::constants::{CANDIDATE_MIN_KEYWORD_HITS, MARKUP_HEADER_MIN_HITS};
use crate::domain::{RawCell, RawTable, TableOrigin};
use crate::error::Result;
use crate::pipeline::processing::schema::SchemaDictionary;

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("static selector is valid"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("static selector is valid"));

// Browsers clamp colspan to this; larger values are treated the same way
const MAX_COL_SPAN: usize = 1000;

/// Extracts `<table>` elements from already-fetched markup
#[derive(Debug, Clone)]
pub struct MarkupExtractor {
    dictionary: Arc<SchemaDictionary>,
}

impl Default for MarkupExtractor {
    fn default() -> Self {
        Self::new(SchemaDictionary::global())
    }
}

impl MarkupExtractor {
    pub fn new(dictionary: Arc<SchemaDictionary>) -> Self {
        Self { dictionary }
    }

    /// Every table in the markup, expanded and with its header row identified.
    /// Nested tables come back as tables of their own.
    pub fn extract_tables(&self, html: &str) -> Vec<RawTable> {
        debug!("MarkupExtractor: start html_len={}", html.len());
        let document = Html::parse_document(html);

        let mut tables = Vec::new();
        for (table_index, table) in document.select(&TABLE_SELECTOR).enumerate() {
            match self.build_table(table, table_index) {
                Some(raw) => {
                    info!(
                        "MarkupExtractor: table {} parsed rows={} cols={}",
                        table_index,
                        raw.rows().len(),
                        raw.max_cols()
                    );
                    tables.push(raw);
                }
                None => debug!("MarkupExtractor: table {} has no cells", table_index),
            }
        }

        if tables.is_empty() {
            warn!("MarkupExtractor: no tables found in markup");
        }
        tables
    }

    /// Plain-text dump: each table as tab-separated lines under a `=== Table n ===`
    /// banner, or the body text when the markup has no tables
    pub fn extract_text(&self, html: &str) -> String {
        let tables = self.extract_tables(html);
        if tables.is_empty() {
            let document = Html::parse_document(html);
            return document
                .select(&BODY_SELECTOR)
                .next()
                .map(|body| body.text().collect::<Vec<_>>().join(" "))
                .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
        }

        let mut out = String::new();
        for (i, table) in tables.iter().enumerate() {
            out.push_str(&format!("=== Table {} ===\n", i + 1));
            for row in table.rows() {
                out.push_str(&row.join("\t"));
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// The first table whose first row looks like a position header
    pub fn find_position_table(&self, html: &str) -> Option<RawTable> {
        let document = Html::parse_document(html);
        for (table_index, table) in document.select(&TABLE_SELECTOR).enumerate() {
            let rows = scan_cells(table);
            let Some(first_row) = rows.first() else {
                continue;
            };
            let headers: Vec<&str> = first_row.iter().map(|c| c.text.as_str()).collect();
            if keyword_cell_hits(&headers) >= CANDIDATE_MIN_KEYWORD_HITS {
                return self.build_table(table, table_index);
            }
        }
        warn!("MarkupExtractor: no position table found");
        None
    }

    fn build_table(&self, table: ElementRef, table_index: usize) -> Option<RawTable> {
        let cells = scan_cells(table);
        let matrix = expand_merged_cells(&cells);
        if matrix.is_empty() || matrix[0].is_empty() {
            return None;
        }
        let header_index = self.identify_header(&matrix);
        Some(RawTable::new(
            matrix,
            header_index,
            TableOrigin::Markup { table_index },
        ))
    }

    /// Row 0 unless it lacks header synonyms and row 1 has them (a title row above the header)
    fn identify_header(&self, matrix: &[Vec<String>]) -> usize {
        for (index, row) in matrix.iter().take(2).enumerate() {
            if synonym_cell_hits(row, &self.dictionary) >= MARKUP_HEADER_MIN_HITS {
                return index;
            }
        }
        0
    }
}

impl TableExtractor for MarkupExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markup
    }

    fn extract(&self, document: &Document) -> Result<Vec<RawTable>> {
        match document {
            Document::Markup { html } => Ok(self.extract_tables(html)),
            other => Err(wrong_document(DocumentFormat::Markup, other)),
        }
    }

    fn identify_candidate(&self, table: &RawTable) -> bool {
        synonym_cell_hits(table.header_texts(), &self.dictionary) >= MARKUP_HEADER_MIN_HITS
    }
}

/// Cells of each row belonging to this table (rows of nested tables are skipped)
pub fn scan_cells(table: ElementRef) -> Vec<Vec<RawCell>> {
    let table_id = table.id();
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .filter(|tr| {
            tr.ancestors()
                .find(|n| n.value().as_element().map_or(false, |e| e.name() == "table"))
                .map(|n| n.id())
                == Some(table_id)
        })
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|c| {
                    RawCell::new(
                        cell_text(c),
                        span_attr(c, "rowspan", usize::MAX),
                        span_attr(c, "colspan", MAX_COL_SPAN),
                    )
                })
                .collect()
        })
        .collect()
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<String>()
}

fn span_attr(cell: ElementRef, name: &str, max: usize) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}

/// Reconstruct a dense matrix from rows of spanning cells.
///
/// Rows are scanned top to bottom; each free column slot takes the next unconsumed
/// cell, whose text is written into every slot it spans. Slots covered by a span
/// (other than its origin) are marked occupied so later rows skip them.
pub fn expand_merged_cells(rows: &[Vec<RawCell>]) -> Vec<Vec<String>> {
    if rows.is_empty() {
        return Vec::new();
    }

    let max_cols = rows
        .iter()
        .map(|r| r.iter().map(|c| c.col_span).sum::<usize>())
        .max()
        .unwrap_or(0);
    let row_count = rows.len();

    let mut matrix = vec![vec![String::new(); max_cols]; row_count];
    let mut occupied = vec![vec![false; max_cols]; row_count];

    for (row_idx, cells) in rows.iter().enumerate() {
        let mut col_idx = 0;
        let mut cell_idx = 0;

        while col_idx < max_cols && cell_idx < cells.len() {
            while col_idx < max_cols && occupied[row_idx][col_idx] {
                col_idx += 1;
            }
            if col_idx >= max_cols {
                break;
            }

            let cell = &cells[cell_idx];
            for dr in 0..cell.row_span {
                let target_row = row_idx + dr;
                if target_row >= row_count {
                    break;
                }
                for dc in 0..cell.col_span {
                    let target_col = col_idx + dc;
                    if target_col >= max_cols {
                        break;
                    }
                    matrix[target_row][target_col] = cell.text.clone();
                    if dr > 0 || dc > 0 {
                        occupied[target_row][target_col] = true;
                    }
                }
            }

            col_idx += cell.col_span;
            cell_idx += 1;
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::mapper::FieldMapper;

    fn extractor() -> MarkupExtractor {
        MarkupExtractor::new(SchemaDictionary::builtin())
    }

    #[test]
    fn test_two_by_two_span_fills_region() {
        let rows = vec![vec![RawCell::new("X", 2, 2)], vec![]];
        let matrix = expand_merged_cells(&rows);
        assert_eq!(matrix, vec![vec!["X", "X"], vec!["X", "X"]]);
    }

    #[test]
    fn test_rowspan_pushes_later_cells_right() {
        let rows = vec![
            vec![RawCell::new("A", 2, 1), RawCell::single("B"), RawCell::single("C")],
            vec![RawCell::single("D"), RawCell::single("E")],
        ];
        let matrix = expand_merged_cells(&rows);
        assert_eq!(matrix[0], vec!["A", "B", "C"]);
        assert_eq!(matrix[1], vec!["A", "D", "E"]);
    }

    #[test]
    fn test_rowspan_beyond_table_is_truncated() {
        let rows = vec![vec![RawCell::new("A", 5, 1), RawCell::single("B")]];
        let matrix = expand_merged_cells(&rows);
        assert_eq!(matrix, vec![vec!["A", "B"]]);
    }

    #[test]
    fn test_html_spans_are_expanded() {
        let html = r#"
            <table>
              <tr><th>职位名称</th><th>招录机关</th><th>招录人数</th></tr>
              <tr><td rowspan="2">科员</td><td>某某局</td><td>2</td></tr>
              <tr><td>某某委</td><td>1</td></tr>
            </table>"#;
        let tables = extractor().extract_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows()[2], vec!["科员", "某某委", "1"]);
        assert_eq!(tables[0].header_index(), 0);
    }

    #[test]
    fn test_title_row_above_header_is_skipped() {
        let html = r#"
            <table>
              <tr><td colspan="3">2024年度考试录用职位表</td></tr>
              <tr><td>职位名称</td><td>招录机关</td><td>学历</td></tr>
              <tr><td>科员</td><td>某某局</td><td>本科</td></tr>
            </table>"#;
        let tables = extractor().extract_tables(html);
        assert_eq!(tables[0].header_index(), 1);
        assert_eq!(tables[0].data_rows().count(), 1);

        let header = FieldMapper::new(SchemaDictionary::builtin()).map_headers(tables[0].header_texts());
        assert_eq!(header.field(2), Some("education_min"));
    }

    #[test]
    fn test_nested_table_rows_stay_separate() {
        let html = r#"
            <table>
              <tr><td>职位名称</td><td>备注<table><tr><td>inner</td></tr></table></td></tr>
              <tr><td>科员</td><td>无</td></tr>
            </table>"#;
        let tables = extractor().extract_tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows().len(), 2);
        assert_eq!(tables[1].rows(), &[vec!["inner".to_string()]]);
    }

    #[test]
    fn test_no_table_returns_empty() {
        assert!(extractor().extract_tables("<p>no tables here</p>").is_empty());
    }

    #[test]
    fn test_find_position_table_skips_layout_tables() {
        let html = r#"
            <table><tr><td>首页</td><td>通知公告</td></tr></table>
            <table>
              <tr><td>部门</td><td>职位名称</td><td>学历</td><td>专业</td></tr>
              <tr><td>某某局</td><td>科员</td><td>本科</td><td>法学</td></tr>
            </table>"#;
        let table = extractor().find_position_table(html).unwrap();
        assert_eq!(table.origin, TableOrigin::Markup { table_index: 1 });
    }

    #[test]
    fn test_wrong_document_kind_is_error() {
        let document = Document::Paginated {
            path: "x.pdf".into(),
        };
        assert!(extractor().extract(&document).is_err());
    }

    #[test]
    fn test_text_dump_lists_tables_or_body() {
        let html = "<p>说明</p><table><tr><td>职位名称</td><td>学历</td></tr>\
                    <tr><td>科员</td><td>本科</td></tr></table>";
        assert_eq!(
            extractor().extract_text(html),
            "=== Table 1 ===\n职位名称\t学历\n科员\t本科\n\n"
        );
        assert_eq!(
            extractor().extract_text("<body><p>报名时间</p>\n<p>另行通知</p></body>"),
            "报名时间 另行通知"
        );
    }
}
