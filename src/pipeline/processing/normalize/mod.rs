//! Raw string records → typed, standardized position records.
//!
//! Input is the JSON object form of a record: `RawRecord::to_value()` for table
//! rows, or whatever the free-text collaborator produced. Every field has its
//! own rule in [`rules`]; normalizing an already-normalized record returns it
//! unchanged.

pub mod region;
pub mod rules;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::constants::*;
use crate::domain::RawRecord;
use region::{parse_region, provinces_in};
use rules::{
    classify_exam_type, clean_string, degree_requirement, enum_or_unspecified, lookup_enum,
    normalize_date, parse_age_text, split_list, to_flag, to_integer, value_text, EDUCATION_TABLE,
    GENDER_TABLE, POLITICAL_STATUS_TABLE,
};

const HUKOU_UNRESTRICTED: [&str; 3] = ["不限", "无要求", "无"];

static NULL: Value = Value::Null;

/// A recruitment position in canonical form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub position_name: Option<String>,
    pub department_name: Option<String>,
    pub department_code: Option<String>,
    pub position_code: Option<String>,
    pub recruit_count: Option<i64>,

    pub work_location: Option<String>,
    pub work_location_province: Option<String>,
    pub work_location_city: Option<String>,
    pub work_location_district: Option<String>,

    pub education_min: Option<String>,
    pub degree_required: Option<bool>,
    pub major_specific: Vec<String>,
    pub major_unlimited: Option<bool>,
    pub political_status: String,

    pub age_min: Option<i64>,
    pub age_max: Option<i64>,
    pub work_exp_years_min: Option<i64>,
    pub grassroots_exp_years: Option<i64>,

    pub hukou_required: Option<bool>,
    pub hukou_provinces: Vec<String>,
    pub gender_required: String,
    pub fresh_graduate_only: Option<bool>,

    pub other_requirements: Option<String>,
    pub notes: Option<String>,
}

impl NormalizedRecord {
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of plain fields always serializes to an object
            _ => Map::new(),
        }
    }
}

/// Exam announcement metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamInfo {
    pub exam_type: String,
    pub registration_start: Option<String>,
    pub registration_end: Option<String>,
    pub exam_date_written: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawRecord) -> NormalizedRecord {
        self.normalize_value(&raw.to_value())
    }

    pub fn normalize_value(&self, data: &Value) -> NormalizedRecord {
        match data {
            Value::Object(map) => self.normalize_map(map),
            other => {
                warn!("Normalizer: expected an object, got {}", other);
                self.normalize_map(&Map::new())
            }
        }
    }

    pub fn normalize_map(&self, data: &Map<String, Value>) -> NormalizedRecord {
        let field = |name: &str| data.get(name).unwrap_or(&NULL);
        let text = |name: &str| clean_string(field(name));

        let work_location = text(WORK_LOCATION);
        let region = parse_region(work_location.as_deref().unwrap_or_default());

        let education = first_present(data, &[EDUCATION_MIN, "education"]);
        let education_min = value_text(education).map(|v| {
            lookup_enum(&v, EDUCATION_TABLE)
                .unwrap_or(UNSPECIFIED)
                .to_string()
        });

        let majors = first_present(data, &[MAJOR_SPECIFIC, "major"]);
        let major_unlimited =
            to_flag(field(MAJOR_UNLIMITED)).unwrap_or_else(|| rules::is_major_unlimited(majors));

        let (age_min, age_max) = self.age_bounds(data);
        let (hukou_required, hukou_provinces) = self.hukou(data);

        let record = NormalizedRecord {
            position_name: text(POSITION_NAME),
            department_name: text(DEPARTMENT_NAME),
            department_code: text(DEPARTMENT_CODE),
            position_code: text(POSITION_CODE),
            recruit_count: to_integer(field(RECRUIT_COUNT)),

            work_location,
            work_location_province: region.province,
            work_location_city: region.city,
            work_location_district: region.district,

            education_min,
            degree_required: degree_requirement(field(DEGREE_REQUIRED)),
            major_specific: split_list(majors),
            major_unlimited: Some(major_unlimited),
            political_status: enum_or_unspecified(
                value_text(field(POLITICAL_STATUS)).as_deref(),
                POLITICAL_STATUS_TABLE,
            ),

            age_min,
            age_max,
            work_exp_years_min: to_integer(first_present(
                data,
                &[WORK_EXP_YEARS_MIN, "work_exp", WORK_EXP_REQUIREMENT],
            )),
            grassroots_exp_years: to_integer(field(GRASSROOTS_EXP_YEARS)),

            hukou_required,
            hukou_provinces,
            gender_required: enum_or_unspecified(
                value_text(first_present(data, &[GENDER_REQUIRED, "gender"])).as_deref(),
                GENDER_TABLE,
            ),
            fresh_graduate_only: to_flag(field(FRESH_GRADUATE_ONLY)),

            other_requirements: text(OTHER_REQUIREMENTS),
            notes: text(NOTES),
        };

        debug!(
            "Normalizer: position={:?} department={:?} count={:?}",
            record.position_name, record.department_name, record.recruit_count
        );
        record
    }

    /// Explicit bounds win; age wording only fills a missing bound
    fn age_bounds(&self, data: &Map<String, Value>) -> (Option<i64>, Option<i64>) {
        let mut age_min = data.get(AGE_MIN).and_then(to_integer);
        let mut age_max = data.get(AGE_MAX).and_then(to_integer);

        if age_min.is_none() || age_max.is_none() {
            let wording = first_present(data, &[AGE_REQUIREMENT, "age"]);
            if let Value::String(wording) = wording {
                let (text_min, text_max) = parse_age_text(wording);
                age_min = age_min.or(text_min);
                age_max = age_max.or(text_max);
            }
        }
        (age_min, age_max)
    }

    /// Explicit flag and province list, else derived from the household-registration wording
    fn hukou(&self, data: &Map<String, Value>) -> (Option<bool>, Vec<String>) {
        let wording = data
            .get(HUKOU_REQUIREMENT)
            .and_then(clean_string)
            .unwrap_or_default();

        let required = data.get(HUKOU_REQUIRED).and_then(to_flag).or_else(|| {
            if wording.is_empty() {
                None
            } else {
                Some(!HUKOU_UNRESTRICTED.iter().any(|kw| wording.contains(kw)))
            }
        });

        let provinces = match data.get(HUKOU_PROVINCES) {
            Some(value) if !value.is_null() => split_list(value),
            _ => provinces_in(&wording),
        };

        (required, provinces)
    }

    pub fn normalize_exam_info(&self, data: &Value) -> ExamInfo {
        let date = |name: &str| {
            data.get(name)
                .and_then(value_text)
                .and_then(|v| normalize_date(&v))
        };
        ExamInfo {
            exam_type: classify_exam_type(data.get(EXAM_TYPE).and_then(Value::as_str)).to_string(),
            registration_start: date(REGISTRATION_START),
            registration_end: date(REGISTRATION_END),
            exam_date_written: date(EXAM_DATE_WRITTEN),
        }
    }
}

/// The first of several alternative keys holding a non-null value
fn first_present<'a>(data: &'a Map<String, Value>, keys: &[&str]) -> &'a Value {
    keys.iter()
        .filter_map(|k| data.get(*k))
        .find(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()))
        .unwrap_or(&NULL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(value: Value) -> NormalizedRecord {
        Normalizer::new().normalize_value(&value)
    }

    #[test]
    fn test_full_row() {
        let record = normalize(json!({
            "position_name": " 科员 ",
            "department_name": "某某市  税务局",
            "recruit_count": "3人",
            "work_location": "广东省广州市天河区",
            "education_min": "本科及以上",
            "degree_required": "学士学位",
            "major_specific": "法学、经济学",
            "political_status": "中共党员",
            "age_requirement": "18-35周岁",
            "work_exp_requirement": "2年以上",
            "gender_required": "限男性",
            "fresh_graduate_only": "否",
        }));

        assert_eq!(record.position_name.as_deref(), Some("科员"));
        assert_eq!(record.department_name.as_deref(), Some("某某市 税务局"));
        assert_eq!(record.recruit_count, Some(3));
        assert_eq!(record.work_location_province.as_deref(), Some("广东"));
        assert_eq!(record.education_min.as_deref(), Some("本科"));
        assert_eq!(record.degree_required, Some(true));
        assert_eq!(record.major_specific, vec!["法学", "经济学"]);
        assert_eq!(record.major_unlimited, Some(false));
        assert_eq!(record.political_status, "党员");
        assert_eq!((record.age_min, record.age_max), (Some(18), Some(35)));
        assert_eq!(record.work_exp_years_min, Some(2));
        assert_eq!(record.gender_required, "男");
        assert_eq!(record.fresh_graduate_only, Some(false));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let record = normalize(json!({"position_name": "科员"}));
        assert_eq!(record.education_min, None);
        assert_eq!(record.political_status, UNSPECIFIED);
        assert_eq!(record.gender_required, UNSPECIFIED);
        assert_eq!(record.degree_required, None);
        assert_eq!(record.hukou_required, None);
        assert!(record.major_specific.is_empty());
    }

    #[test]
    fn test_unknown_education_falls_back() {
        let record = normalize(json!({"education_min": "中专"}));
        assert_eq!(record.education_min.as_deref(), Some(UNSPECIFIED));
    }

    #[test]
    fn test_explicit_age_wins_over_wording() {
        let record = normalize(json!({"age_max": 30, "age_requirement": "18-35岁"}));
        assert_eq!((record.age_min, record.age_max), (Some(18), Some(30)));
    }

    #[test]
    fn test_hukou_from_wording() {
        let record = normalize(json!({"hukou_requirement": "限江苏、浙江户籍"}));
        assert_eq!(record.hukou_required, Some(true));
        assert_eq!(record.hukou_provinces, vec!["江苏", "浙江"]);

        let open = normalize(json!({"hukou_requirement": "不限"}));
        assert_eq!(open.hukou_required, Some(false));
        assert!(open.hukou_provinces.is_empty());
    }

    #[test]
    fn test_major_unlimited_from_wording() {
        let record = normalize(json!({"major_specific": "专业不限"}));
        assert_eq!(record.major_unlimited, Some(true));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            json!({
                "position_name": "科员",
                "department_name": "某某局",
                "recruit_count": "5",
                "education_min": "全日制本科",
                "political_status": "共青团员",
                "gender_required": "女性",
                "major_specific": "不限",
                "major_unlimited": "否",
                "work_exp_years_min": 0,
                "hukou_requirement": "限本市户籍",
                "work_location": "北京市海淀区",
            }),
            json!({"education_min": "博士研究生", "age_requirement": "35周岁以下"}),
            json!({}),
        ];
        let normalizer = Normalizer::new();
        for input in inputs {
            let once = normalizer.normalize_value(&input);
            let twice = normalizer.normalize_value(&Value::Object(once.to_map()));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_exam_info() {
        let info = Normalizer::new().normalize_exam_info(&json!({
            "exam_type": "2025年度省考",
            "registration_start": "2024年10月15日",
            "registration_end": "2024/10/24",
            "exam_date_written": "garbage",
        }));
        assert_eq!(info.exam_type, "provincial_exam");
        assert_eq!(info.registration_start.as_deref(), Some("2024-10-15"));
        assert_eq!(info.registration_end.as_deref(), Some("2024-10-24"));
        assert_eq!(info.exam_date_written, None);
    }
}
