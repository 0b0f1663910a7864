use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::debug;

use crate::error::Result;

// Advance widths in ems; no font metrics are read, so these are estimates
const NARROW_ADVANCE: f32 = 0.5;
const WIDE_ADVANCE: f32 = 1.0;

/// Horizontal gap, in ems, that separates two columns
const COLUMN_GAP_EMS: f32 = 1.0;
const WORD_GAP_EMS: f32 = 0.15;

/// TJ adjustments below this (thousandths of an em) read as a space
const TJ_SPACE_ADJUSTMENT: f32 = -100.0;

/// A string painted at one text position
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub text: String,
}

impl TextRun {
    fn estimated_end(&self) -> f32 {
        let ems: f32 = self
            .text
            .chars()
            .map(|c| if c.is_ascii() { NARROW_ADVANCE } else { WIDE_ADVANCE })
            .sum();
        self.x + ems * self.size
    }
}

#[derive(Default)]
struct RunReader<'a> {
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    moved: bool,
    runs: Vec<TextRun>,
}

impl<'a> RunReader<'a> {
    fn new(encodings: BTreeMap<Vec<u8>, Encoding<'a>>) -> Self {
        Self {
            encodings,
            font_size: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            moved: true,
            ..Default::default()
        }
    }

    fn apply(&mut self, op: &Operation) {
        let num = |i: usize| op.operands.get(i).and_then(|o| o.as_float().ok());
        match op.operator.as_str() {
            "BT" => {
                self.x = 0.0;
                self.y = 0.0;
                self.scale_x = 1.0;
                self.scale_y = 1.0;
                self.moved = true;
            }
            "Tf" => {
                self.font = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .map(<[u8]>::to_vec);
                if let Some(size) = num(1) {
                    self.font_size = size;
                }
            }
            "TL" => self.leading = num(0).unwrap_or(0.0),
            "Tm" => {
                if let (Some(a), Some(d), Some(e), Some(f)) = (num(0), num(3), num(4), num(5)) {
                    self.scale_x = a;
                    self.scale_y = d;
                    self.x = e;
                    self.y = f;
                    self.moved = true;
                }
            }
            "Td" | "TD" => {
                let (tx, ty) = (num(0).unwrap_or(0.0), num(1).unwrap_or(0.0));
                if op.operator == "TD" {
                    self.leading = -ty;
                }
                self.x += tx * self.scale_x;
                self.y += ty * self.scale_y;
                self.moved = true;
            }
            "T*" => self.next_line(),
            "Tj" => {
                let text = self.decode_operands(&op.operands);
                self.show(text);
            }
            "TJ" => {
                let text = op
                    .operands
                    .first()
                    .and_then(|o| o.as_array().ok())
                    .map(|items| self.decode_operands(items))
                    .unwrap_or_default();
                self.show(text);
            }
            "'" => {
                self.next_line();
                let text = self.decode_operands(&op.operands);
                self.show(text);
            }
            "\"" => {
                self.next_line();
                let text = self.decode_operands(op.operands.get(2..).unwrap_or_default());
                self.show(text);
            }
            _ => {}
        }
    }

    fn next_line(&mut self) {
        self.y -= self.leading * self.scale_y;
        self.moved = true;
    }

    fn decode_operands(&self, operands: &[Object]) -> String {
        let Some(encoding) = self.font.as_ref().and_then(|f| self.encodings.get(f)) else {
            return String::new();
        };
        let mut text = String::new();
        for operand in operands {
            match operand {
                Object::String(bytes, _) => match Document::decode_text(encoding, bytes) {
                    Ok(decoded) => text.push_str(&decoded),
                    Err(e) => debug!("page_text: undecodable string: {}", e),
                },
                Object::Integer(_) | Object::Real(_) => {
                    if operand.as_float().unwrap_or(0.0) < TJ_SPACE_ADJUSTMENT {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }
        text
    }

    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(run) if !self.moved => run.text.push_str(&text),
            _ => {
                self.runs.push(TextRun {
                    x: self.x,
                    y: self.y,
                    size: (self.font_size * self.scale_y).abs().max(1.0),
                    text,
                });
                self.moved = false;
            }
        }
    }
}

/// Positioned text runs of one page, in content-stream order
pub fn page_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .filter_map(|(name, font)| font.get_font_encoding(doc).ok().map(|e| (name, e)))
        .collect();
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut reader = RunReader::new(encodings);
    for op in &content.operations {
        reader.apply(op);
    }
    Ok(reader.runs)
}

/// Rebuild page lines from runs: runs sharing a baseline form one line, top to
/// bottom, and runs separated by a column-sized gap are joined with a tab
pub fn layout_text(runs: &[TextRun]) -> String {
    let mut sorted: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<&TextRun>> = Vec::new();
    for run in sorted {
        match lines.last_mut() {
            Some(line) if (line[0].y - run.y).abs() <= line[0].size.max(run.size) * 0.5 => {
                line.push(run)
            }
            _ => lines.push(vec![run]),
        }
    }

    lines
        .iter_mut()
        .map(|line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut text = line[0].text.trim().to_string();
            for pair in line.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let gap = next.x - prev.estimated_end();
                if gap >= COLUMN_GAP_EMS * prev.size {
                    text.push('\t');
                } else if gap > WORD_GAP_EMS * prev.size {
                    text.push(' ');
                }
                text.push_str(next.text.trim());
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32) -> TextRun {
        TextRun {
            x,
            y,
            size: 10.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_runs_on_one_baseline_become_columns() {
        let runs = vec![
            run("科员", 200.0, 699.0),
            run("职位名称", 50.0, 720.0),
            run("某某局", 50.0, 700.0),
            run("学历", 200.0, 721.0),
        ];
        assert_eq!(layout_text(&runs), "职位名称\t学历\n某某局\t科员");
    }

    #[test]
    fn test_adjacent_runs_join_without_a_tab() {
        let runs = vec![run("Clerk", 50.0, 700.0), run("II", 78.0, 700.0), run("xyz", 55.0, 650.0)];
        // "Clerk" ends near x=75, so "II" is the same cell
        assert_eq!(layout_text(&runs), "Clerk II\nxyz");
    }

    #[test]
    fn test_blank_runs_are_dropped() {
        let runs = vec![run("  ", 10.0, 10.0), run("本科", 10.0, 10.0)];
        assert_eq!(layout_text(&runs), "本科");
    }
}
