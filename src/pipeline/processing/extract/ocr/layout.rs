use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::OcrLine;
use crate::config::OcrConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Maximum vertical distance (px) from a row's first item
    pub row_threshold: f32,
    /// More distinct row lengths than this means the text is not a table
    pub max_distinct_row_lengths: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let ocr = OcrConfig::default();
        Self {
            row_threshold: ocr.row_threshold_px,
            max_distinct_row_lengths: ocr.max_distinct_row_lengths,
        }
    }
}

/// Cluster recognized lines into table rows.
///
/// Lines are sorted by vertical center. A line further than the threshold from the
/// current row's anchor starts a new row and becomes its anchor. Each row is then
/// ordered left to right.
pub fn group_into_rows(lines: &[OcrLine], config: &LayoutConfig) -> Vec<Vec<String>> {
    let mut sorted: Vec<&OcrLine> = lines.iter().filter(|l| !l.text.trim().is_empty()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(|a, b| a.bbox.center_y().total_cmp(&b.bbox.center_y()));

    let mut rows: Vec<Vec<&OcrLine>> = Vec::new();
    let mut current: Vec<&OcrLine> = Vec::new();
    let mut anchor = sorted[0].bbox.center_y();

    for line in sorted {
        if (line.bbox.center_y() - anchor).abs() > config.row_threshold {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            anchor = line.bbox.center_y();
        }
        current.push(line);
    }
    if !current.is_empty() {
        rows.push(current);
    }

    if rows.len() < 2 {
        return Vec::new();
    }

    let distinct_lengths: HashSet<usize> = rows.iter().map(Vec::len).collect();
    if distinct_lengths.len() > config.max_distinct_row_lengths {
        return Vec::new();
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.bbox.center_x().total_cmp(&b.bbox.center_x()));
            row.into_iter().map(|l| l.text.trim().to_string()).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::line;
    use super::*;

    #[test]
    fn test_rows_are_clustered_and_ordered() {
        let lines = vec![
            line("B", 200.0, 105.0),
            line("A", 100.0, 100.0),
            line("D", 200.0, 150.0),
            line("C", 100.0, 148.0),
        ];
        let rows = group_into_rows(&lines, &LayoutConfig::default());
        assert_eq!(rows, vec![vec!["A", "B"], vec!["C", "D"]]);
    }

    #[test]
    fn test_anchor_is_not_dragged_by_row_members() {
        // 100 → 115 → 130: the third item is 30px from the anchor and opens a new row
        let lines = vec![
            line("a", 10.0, 100.0),
            line("b", 20.0, 115.0),
            line("c", 30.0, 130.0),
        ];
        let rows = group_into_rows(&lines, &LayoutConfig::default());
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_fewer_than_two_rows_is_not_a_table() {
        let lines = vec![line("a", 10.0, 100.0), line("b", 50.0, 101.0)];
        assert!(group_into_rows(&lines, &LayoutConfig::default()).is_empty());
        assert!(group_into_rows(&[], &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn test_irregular_rows_are_not_a_table() {
        let mut lines = Vec::new();
        for (row, width) in [1usize, 2, 3, 4].iter().enumerate() {
            for col in 0..*width {
                lines.push(line("x", col as f32 * 50.0, row as f32 * 100.0));
            }
        }
        assert!(group_into_rows(&lines, &LayoutConfig::default()).is_empty());

        let relaxed = LayoutConfig {
            row_threshold: 20.0,
            max_distinct_row_lengths: 4,
        };
        assert_eq!(group_into_rows(&lines, &relaxed).len(), 4);
    }
}
