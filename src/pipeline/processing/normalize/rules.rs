//! Per-field value rules. Every rule is a pure function and a fixed point on its
//! own output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::constants::{EXAM_TYPE_OTHER, UNSPECIFIED};

pub type SynonymTable = &'static [(&'static str, &'static str)];

pub const EDUCATION_TABLE: SynonymTable = &[
    ("大专", "大专"),
    ("专科", "大专"),
    ("高职", "大专"),
    ("高职高专", "大专"),
    ("本科", "本科"),
    ("大学本科", "本科"),
    ("全日制本科", "本科"),
    ("普通本科", "本科"),
    ("学士", "本科"),
    ("硕士", "硕士"),
    ("硕士研究生", "硕士"),
    ("全日制硕士", "硕士"),
    ("研究生", "硕士"),
    ("博士", "博士"),
    ("博士研究生", "博士"),
];

pub const POLITICAL_STATUS_TABLE: SynonymTable = &[
    ("中共党员", "党员"),
    ("党员", "党员"),
    ("共产党员", "党员"),
    ("预备党员", "预备党员"),
    ("中共预备党员", "预备党员"),
    ("共青团员", "团员"),
    ("团员", "团员"),
    ("群众", "群众"),
    ("无党派", "群众"),
    ("不限", "不限"),
    ("无要求", "不限"),
];

pub const GENDER_TABLE: SynonymTable = &[
    ("男", "男"),
    ("男性", "男"),
    ("限男", "男"),
    ("限男性", "男"),
    ("女", "女"),
    ("女性", "女"),
    ("限女", "女"),
    ("限女性", "女"),
    ("不限", "不限"),
    ("无要求", "不限"),
];

// Negative phrases first: "不要求" and "无要求" both contain "要求"
const DEGREE_TABLE: &[(&str, bool)] = &[
    ("不要求", false),
    ("无要求", false),
    ("不限", false),
    ("无", false),
    ("否", false),
    ("学士", true),
    ("硕士", true),
    ("博士", true),
    ("要求", true),
];

const EXAM_TYPE_TABLE: SynonymTable = &[
    ("国考", "national_exam"),
    ("国家公务员", "national_exam"),
    ("省考", "provincial_exam"),
    ("省级公务员", "provincial_exam"),
    ("事业单位", "public_institution"),
    ("事业编", "public_institution"),
    ("选调生", "selected_students"),
    ("选调", "selected_students"),
];

const MAJOR_UNLIMITED_KEYWORDS: [&str; 4] = ["不限", "无要求", "所有专业", "任意专业"];

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("static regex is valid"));
static AGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*[-至到]\s*(\d+)").expect("static regex is valid"));
static AGE_CEILING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:周)?岁以下").expect("static regex is valid"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex is valid"));
static LOOSE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("static regex is valid"));
static LIST_DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，、;；/]").expect("static regex is valid"));

/// Exact synonym, then the first table key contained in the value
pub fn lookup_enum(value: &str, table: SynonymTable) -> Option<&'static str> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|(key, _)| *key == value)
        .or_else(|| table.iter().find(|(key, _)| value.contains(key)))
        .map(|(_, canonical)| *canonical)
}

/// Enumerated value with the "not limited" fallback
pub fn enum_or_unspecified(value: Option<&str>, table: SynonymTable) -> String {
    value
        .and_then(|v| lookup_enum(v, table))
        .unwrap_or(UNSPECIFIED)
        .to_string()
}

/// JavaScript-style truthiness: null, false, 0, "" and empty containers are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Scalar text of a value; containers have none
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Trimmed with internal whitespace collapsed; empty becomes `None`
pub fn clean_string(value: &Value) -> Option<String> {
    let text = value_text(value)?;
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Native numbers are truncated; text yields its first run of digits
pub fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => FIRST_NUMBER
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}

/// Fixed affirmative/negative vocabulary plus a caller-supplied pair; anything else is `None`
pub fn to_boolean(value: &Value, true_text: &str, false_text: &str) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        other => {
            let text = value_text(other)?.trim().to_lowercase();
            if ["true", "1", "yes", "是", true_text].contains(&text.as_str()) {
                Some(true)
            } else if ["false", "0", "no", "否", false_text].contains(&text.as_str()) {
                Some(false)
            } else {
                None
            }
        }
    }
}

pub fn to_flag(value: &Value) -> Option<bool> {
    to_boolean(value, "是", "否")
}

/// Degree requirement: boolean vocabulary, then degree wording
pub fn degree_requirement(value: &Value) -> Option<bool> {
    if let Some(flag) = to_flag(value) {
        return Some(flag);
    }
    let text = value_text(value)?;
    DEGREE_TABLE
        .iter()
        .find(|(key, _)| text.contains(key))
        .map(|(_, required)| *required)
}

/// `YYYY-MM-DD`, from ISO or localized input; `None` when no date is found
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if ISO_DATE.is_match(value) {
        return Some(value.to_string());
    }

    let replaced = value
        .replace('年', "-")
        .replace('月', "-")
        .replace('日', "")
        .replace('/', "-");
    let caps = LOOSE_DATE.captures(&replaced)?;
    Some(format!(
        "{}-{:0>2}-{:0>2}",
        &caps[1], &caps[2], &caps[3]
    ))
}

/// Lists are cleaned entry by entry; text is split on list delimiters
pub fn split_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(clean_string).collect(),
        Value::String(s) => LIST_DELIMITERS
            .split(s)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => clean_string(other).into_iter().collect(),
    }
}

pub fn is_major_unlimited(value: &Value) -> bool {
    let text = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(" "),
        other => value_text(other).unwrap_or_default(),
    };
    MAJOR_UNLIMITED_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// Bounds from free-text age wording: "18-35岁" gives both, "35周岁以下" only the maximum
pub fn parse_age_text(text: &str) -> (Option<i64>, Option<i64>) {
    if let Some(caps) = AGE_RANGE.captures(text) {
        return (caps[1].parse().ok(), caps[2].parse().ok());
    }
    if let Some(caps) = AGE_CEILING.captures(text) {
        return (None, caps[1].parse().ok());
    }
    (None, None)
}

pub fn classify_exam_type(value: Option<&str>) -> &'static str {
    let Some(value) = value else {
        return EXAM_TYPE_OTHER;
    };
    let value = value.trim().to_lowercase();
    EXAM_TYPE_TABLE
        .iter()
        .find(|(key, _)| value.contains(key))
        .map(|(_, category)| *category)
        .unwrap_or(EXAM_TYPE_OTHER)
}
