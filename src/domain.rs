use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single table cell as scanned from its source, before merged-cell expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    pub row_span: usize,
    pub col_span: usize,
}

impl RawCell {
    pub fn new(text: impl Into<String>, row_span: usize, col_span: usize) -> Self {
        Self {
            text: text.into(),
            row_span: row_span.max(1),
            col_span: col_span.max(1),
        }
    }

    pub fn single(text: impl Into<String>) -> Self {
        Self::new(text, 1, 1)
    }
}

/// Where a table was found inside its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableOrigin {
    Markup { table_index: usize },
    Sheet { name: String },
    Page { page: u32, table_index: usize },
    WordTable { table_index: usize },
    Image { page: Option<u32> },
}

/// Dense rectangular matrix of cell strings with the index of its header row.
/// Every row has exactly `max_cols` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
    header_index: usize,
    max_cols: usize,
    pub origin: TableOrigin,
}

impl RawTable {
    /// Build a table, padding short rows with empty strings so the matrix is rectangular
    pub fn new(mut rows: Vec<Vec<String>>, header_index: usize, origin: TableOrigin) -> Self {
        let max_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(max_cols, String::new());
        }
        let header_index = header_index.min(rows.len().saturating_sub(1));
        Self {
            rows,
            header_index,
            max_cols,
            origin,
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn max_cols(&self) -> usize {
        self.max_cols
    }

    pub fn header_index(&self) -> usize {
        self.header_index
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.max_cols == 0
    }

    pub fn header_texts(&self) -> &[String] {
        self.rows
            .get(self.header_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rows below the header row
    pub fn data_rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows
            .iter()
            .skip(self.header_index + 1)
            .map(Vec::as_slice)
    }
}

/// Canonical field name (or `None` for an unmapped column) per table column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HeaderRow(Vec<Option<String>>);

impl HeaderRow {
    pub fn new(fields: Vec<Option<String>>) -> Self {
        Self(fields)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, column: usize) -> Option<&str> {
        self.0.get(column).and_then(|f| f.as_deref())
    }

    pub fn fields(&self) -> &[Option<String>] {
        &self.0
    }
}

/// One data row keyed by canonical field name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    pub fields: IndexMap<String, String>,
}

impl RawRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from one row. Unmapped columns and empty cells are dropped,
    /// and when two columns map to the same field the first non-empty one wins.
    pub fn from_row(header: &HeaderRow, row: &[String]) -> Option<Self> {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            return None;
        }

        let mut fields = IndexMap::new();
        for (column, cell) in row.iter().enumerate() {
            let Some(field) = header.field(column) else {
                continue;
            };
            let value = clean_cell(cell);
            if value.is_empty() || fields.contains_key(field) {
                continue;
            }
            fields.insert(field.to_string(), value);
        }

        if fields.is_empty() {
            None
        } else {
            Some(Self { fields })
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Collapse internal whitespace runs to a single space and trim
pub fn clean_cell(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn every non-blank data row of a table into a record
pub fn rows_to_records(table: &RawTable, header: &HeaderRow) -> Vec<RawRecord> {
    table
        .data_rows()
        .filter_map(|row| RawRecord::from_row(header, row))
        .collect()
}
