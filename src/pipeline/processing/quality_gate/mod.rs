//! Quality gate for normalized position records.
//!
//! Confidence starts at 100 and every finding deducts a fixed penalty. Missing
//! required fields and logical contradictions are errors; type, enumeration
//! and range findings are warnings. A record is valid when it has no errors
//! and its confidence reaches the configured threshold.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{info, warn};

use crate::config::ValidatorConfig;
use crate::constants::*;
use crate::pipeline::processing::normalize::rules::{is_truthy, to_flag, value_text};
use crate::pipeline::processing::normalize::{ExamInfo, NormalizedRecord};

const MISSING_REQUIRED_PENALTY: i32 = 20;
const TYPE_MISMATCH_PENALTY: i32 = 5;
const INVALID_ENUM_PENALTY: i32 = 5;
const OUT_OF_RANGE_PENALTY: i32 = 10;
const INCONSISTENCY_PENALTY: i32 = 15;

const STRING_FIELDS: [&str; 8] = [
    POSITION_NAME,
    DEPARTMENT_NAME,
    DEPARTMENT_CODE,
    POSITION_CODE,
    WORK_LOCATION,
    EDUCATION_MIN,
    POLITICAL_STATUS,
    GENDER_REQUIRED,
];
const INTEGER_FIELDS: [&str; 5] = [
    RECRUIT_COUNT,
    AGE_MIN,
    AGE_MAX,
    WORK_EXP_YEARS_MIN,
    GRASSROOTS_EXP_YEARS,
];
const LIST_FIELDS: [&str; 2] = [MAJOR_SPECIFIC, HUKOU_PROVINCES];
const BOOLEAN_FIELDS: [&str; 3] = [MAJOR_UNLIMITED, HUKOU_REQUIRED, FRESH_GRADUATE_ONLY];

const ALLOWED_VALUES: [(&str, &[&str]); 3] = [
    (EDUCATION_MIN, &["大专", "本科", "硕士", "博士"]),
    (POLITICAL_STATUS, &["党员", "预备党员", "团员", "群众", "不限"]),
    (GENDER_REQUIRED, &["男", "女", "不限"]),
];

const SUB_DEGREE: &str = "大专";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    MissingRequired,
    MissingRecommended,
    TypeMismatch,
    InvalidEnum,
    OutOfRange,
    LogicalInconsistency,
    InvalidDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// One finding; `penalty` is what it deducted from the confidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub field: Option<String>,
    pub message: String,
    pub penalty: u8,
}

impl ValidationIssue {
    fn new(
        kind: IssueKind,
        severity: IssueSeverity,
        field: Option<&str>,
        message: String,
        penalty: i32,
    ) -> Self {
        Self {
            kind,
            severity,
            field: field.map(str::to_string),
            message,
            penalty: penalty.clamp(0, 100) as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Error messages first, then warnings
    pub messages: Vec<String>,
    /// 0..=100
    pub confidence: u8,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
    }
}

/// Routing decision for a validated record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Accept,
    NeedsReview,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub record: NormalizedRecord,
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub valid: usize,
    pub needs_review: usize,
    pub invalid: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub valid: Vec<ValidatedRecord>,
    pub needs_review: Vec<ValidatedRecord>,
    pub invalid: Vec<ValidatedRecord>,
    pub stats: BatchStats,
}

/// Additive-penalty validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    pub config: ValidatorConfig,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, record: &NormalizedRecord) -> ValidationOutcome {
        self.validate_fields(&record.to_map())
    }

    /// Validates a loosely typed record, coercing fields to their expected shape first
    pub fn validate_fields(&self, fields: &Map<String, Value>) -> ValidationOutcome {
        let mut issues = Vec::new();

        for field in &self.config.required_fields {
            if !fields.get(field).map_or(false, is_truthy) {
                issues.push(ValidationIssue::new(
                    IssueKind::MissingRequired,
                    IssueSeverity::Error,
                    Some(field.as_str()),
                    format!("missing required field: {}", field),
                    MISSING_REQUIRED_PENALTY,
                ));
            }
        }

        for field in RECOMMENDED_FIELDS {
            if !fields.get(field).map_or(false, is_truthy) {
                issues.push(ValidationIssue::new(
                    IssueKind::MissingRecommended,
                    IssueSeverity::Warning,
                    Some(field),
                    format!("missing recommended field: {}", field),
                    0,
                ));
            }
        }

        let coerced = self.check_types(fields, &mut issues);
        self.check_enums(&coerced, &mut issues);
        self.check_ranges(&coerced, &mut issues);
        self.check_consistency(&coerced, &mut issues);

        self.outcome(issues)
    }

    fn outcome(&self, mut issues: Vec<ValidationIssue>) -> ValidationOutcome {
        // Stable: keeps discovery order inside each severity
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));

        let deducted: i32 = issues.iter().map(|i| i32::from(i.penalty)).sum();
        let confidence = (100 - deducted).clamp(0, 100) as u8;
        let has_errors = issues.iter().any(|i| i.severity == IssueSeverity::Error);

        ValidationOutcome {
            is_valid: !has_errors && confidence >= self.config.confidence_threshold,
            messages: issues.iter().map(|i| i.message.clone()).collect(),
            confidence,
            issues,
        }
    }

    /// Returns the record with every coercible field replaced by its coerced value
    fn check_types(
        &self,
        fields: &Map<String, Value>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Map<String, Value> {
        let mut coerced = fields.clone();
        let expectations = STRING_FIELDS
            .iter()
            .map(|f| (*f, "string"))
            .chain(INTEGER_FIELDS.iter().map(|f| (*f, "integer")))
            .chain(LIST_FIELDS.iter().map(|f| (*f, "list")))
            .chain(BOOLEAN_FIELDS.iter().map(|f| (*f, "boolean")));

        for (field, expected) in expectations {
            let Some(value) = fields.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let converted = match expected {
                "string" => coerce_string(value),
                "integer" => coerce_integer(value),
                "list" => coerce_list(value),
                _ => coerce_boolean(value),
            };
            match converted {
                Some(v) => {
                    coerced.insert(field.to_string(), v);
                }
                None => issues.push(ValidationIssue::new(
                    IssueKind::TypeMismatch,
                    IssueSeverity::Warning,
                    Some(field),
                    format!("type mismatch: {} should be {}", field, expected),
                    TYPE_MISMATCH_PENALTY,
                )),
            }
        }
        coerced
    }

    fn check_enums(&self, fields: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
        for (field, allowed) in ALLOWED_VALUES {
            let Some(value) = fields.get(field).and_then(Value::as_str) else {
                continue;
            };
            if !value.is_empty() && !allowed.contains(&value) {
                issues.push(ValidationIssue::new(
                    IssueKind::InvalidEnum,
                    IssueSeverity::Warning,
                    Some(field),
                    format!(
                        "value not allowed: {}={}, allowed={}",
                        field,
                        value,
                        allowed.join("/")
                    ),
                    INVALID_ENUM_PENALTY,
                ));
            }
        }
    }

    fn check_ranges(&self, fields: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
        for (field, [min, max]) in &self.config.ranges {
            let Some(value) = fields.get(field).and_then(Value::as_i64) else {
                continue;
            };
            if value < *min || value > *max {
                issues.push(ValidationIssue::new(
                    IssueKind::OutOfRange,
                    IssueSeverity::Warning,
                    Some(field),
                    format!(
                        "value out of range: {}={}, range=[{}, {}]",
                        field, value, min, max
                    ),
                    OUT_OF_RANGE_PENALTY,
                ));
            }
        }
    }

    fn check_consistency(&self, fields: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
        let int = |name: &str| fields.get(name).and_then(Value::as_i64);
        let mut inconsistent = |field: &str, message: String| {
            issues.push(ValidationIssue::new(
                IssueKind::LogicalInconsistency,
                IssueSeverity::Error,
                Some(field),
                message,
                INCONSISTENCY_PENALTY,
            ));
        };

        if let (Some(min), Some(max)) = (int(AGE_MIN), int(AGE_MAX)) {
            if min >= max {
                inconsistent(
                    AGE_MIN,
                    format!("invalid age range: min={} >= max={}", min, max),
                );
            }
        }

        let education = fields.get(EDUCATION_MIN).and_then(Value::as_str);
        let degree_required = fields.get(DEGREE_REQUIRED).and_then(Value::as_bool);
        if education == Some(SUB_DEGREE) && degree_required == Some(true) {
            inconsistent(
                DEGREE_REQUIRED,
                "sub-degree education does not confer a degree".to_string(),
            );
        }

        let fresh_only = fields.get(FRESH_GRADUATE_ONLY).map_or(false, is_truthy);
        if fresh_only && int(WORK_EXP_YEARS_MIN).map_or(false, |years| years > 0) {
            inconsistent(
                WORK_EXP_YEARS_MIN,
                "fresh-graduate positions should not require work experience".to_string(),
            );
        }
    }

    pub fn validate_batch(&self, records: &[NormalizedRecord]) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        let mut confidence_sum = 0u64;

        for record in records {
            let outcome = self.validate(record);
            confidence_sum += u64::from(outcome.confidence);
            let decision = self.decide(&outcome);
            let validated = ValidatedRecord {
                record: record.clone(),
                outcome,
            };
            match decision {
                ReviewDecision::Accept => batch.valid.push(validated),
                ReviewDecision::NeedsReview => batch.needs_review.push(validated),
                ReviewDecision::Reject => {
                    warn!(
                        "Validator: invalid record {:?} - {}",
                        validated.record.position_name,
                        validated.outcome.messages.join("; ")
                    );
                    batch.invalid.push(validated);
                }
            }
        }

        batch.stats = BatchStats {
            total: records.len(),
            valid: batch.valid.len(),
            needs_review: batch.needs_review.len(),
            invalid: batch.invalid.len(),
            avg_confidence: if records.is_empty() {
                0.0
            } else {
                confidence_sum as f64 / records.len() as f64
            },
        };

        info!(
            "Validator: batch complete: valid={}, needs_review={}, invalid={}, avg_confidence={:.1}",
            batch.stats.valid,
            batch.stats.needs_review,
            batch.stats.invalid,
            batch.stats.avg_confidence
        );
        batch
    }

    pub fn decide(&self, outcome: &ValidationOutcome) -> ReviewDecision {
        if outcome.is_valid {
            ReviewDecision::Accept
        } else if outcome.confidence >= self.config.review_threshold {
            ReviewDecision::NeedsReview
        } else {
            ReviewDecision::Reject
        }
    }

    pub fn needs_manual_review(&self, outcome: &ValidationOutcome) -> bool {
        outcome.confidence < self.config.confidence_threshold
    }

    /// Registration must open before it closes, and close before the written exam.
    /// An empty result means the dates are consistent.
    pub fn validate_exam_info(&self, info: &ExamInfo) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut date = |field: &str, value: &Option<String>| -> Option<NaiveDate> {
            let value = value.as_deref()?;
            match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(e) => {
                    issues.push(ValidationIssue::new(
                        IssueKind::InvalidDate,
                        IssueSeverity::Error,
                        Some(field),
                        format!("invalid date format: {}={} ({})", field, value, e),
                        0,
                    ));
                    None
                }
            }
        };

        let start = date(REGISTRATION_START, &info.registration_start);
        let end = date(REGISTRATION_END, &info.registration_end);
        let written = date(EXAM_DATE_WRITTEN, &info.exam_date_written);

        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                issues.push(ValidationIssue::new(
                    IssueKind::LogicalInconsistency,
                    IssueSeverity::Error,
                    Some(REGISTRATION_START),
                    "registration must start before it ends".to_string(),
                    0,
                ));
            }
        }
        if let (Some(end), Some(written)) = (end, written) {
            if end >= written {
                issues.push(ValidationIssue::new(
                    IssueKind::LogicalInconsistency,
                    IssueSeverity::Error,
                    Some(REGISTRATION_END),
                    "registration must end before the written exam".to_string(),
                    0,
                ));
            }
        }
        issues
    }
}

fn coerce_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(_) | Value::Bool(_) => value_text(value).map(Value::String),
        _ => None,
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::Bool(b) => i64::from(*b),
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Some(Value::Number(Number::from(n)))
}

fn coerce_list(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::String(s) => Some(Value::Array(vec![Value::String(s.clone())])),
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))),
        Value::String(_) => to_flag(value).map(Value::Bool),
        _ => None,
    }
}
