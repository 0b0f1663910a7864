/// Canonical field names shared by the mapper, normalizer and validator.
/// These are the keys a normalized position record serializes to.

pub const POSITION_NAME: &str = "position_name";
pub const DEPARTMENT_NAME: &str = "department_name";
pub const DEPARTMENT_CODE: &str = "department_code";
pub const POSITION_CODE: &str = "position_code";
pub const RECRUIT_COUNT: &str = "recruit_count";
pub const WORK_LOCATION: &str = "work_location";
pub const WORK_LOCATION_PROVINCE: &str = "work_location_province";
pub const WORK_LOCATION_CITY: &str = "work_location_city";
pub const WORK_LOCATION_DISTRICT: &str = "work_location_district";
pub const EDUCATION_MIN: &str = "education_min";
pub const DEGREE_REQUIRED: &str = "degree_required";
pub const MAJOR_SPECIFIC: &str = "major_specific";
pub const MAJOR_UNLIMITED: &str = "major_unlimited";
pub const POLITICAL_STATUS: &str = "political_status";
pub const AGE_MIN: &str = "age_min";
pub const AGE_MAX: &str = "age_max";
pub const WORK_EXP_YEARS_MIN: &str = "work_exp_years_min";
pub const GRASSROOTS_EXP_YEARS: &str = "grassroots_exp_years";
pub const HUKOU_REQUIRED: &str = "hukou_required";
pub const HUKOU_PROVINCES: &str = "hukou_provinces";
pub const GENDER_REQUIRED: &str = "gender_required";
pub const FRESH_GRADUATE_ONLY: &str = "fresh_graduate_only";
pub const OTHER_REQUIREMENTS: &str = "other_requirements";
pub const NOTES: &str = "notes";

// Raw-only keys produced by the header mapper and consumed by the normalizer
pub const AGE_REQUIREMENT: &str = "age_requirement";
pub const WORK_EXP_REQUIREMENT: &str = "work_exp_requirement";
pub const HUKOU_REQUIREMENT: &str = "hukou_requirement";

// Exam announcement fields
pub const EXAM_TYPE: &str = "exam_type";
pub const REGISTRATION_START: &str = "registration_start";
pub const REGISTRATION_END: &str = "registration_end";
pub const EXAM_DATE_WRITTEN: &str = "exam_date_written";

/// Fields whose absence is a hard validation error
pub const REQUIRED_FIELDS: [&str; 3] = [POSITION_NAME, DEPARTMENT_NAME, RECRUIT_COUNT];

/// Fields whose absence is reported but not penalized
pub const RECOMMENDED_FIELDS: [&str; 1] = [EDUCATION_MIN];

/// Keywords that mark a header row as belonging to a position table
pub const POSITION_TABLE_KEYWORDS: [&str; 6] = ["职位", "岗位", "部门", "学历", "专业", "人数"];

/// Header keyword hits needed for a table to count as a position table
pub const CANDIDATE_MIN_KEYWORD_HITS: usize = 3;

/// Header cells matching a dictionary synonym needed for the markup header heuristic
pub const MARKUP_HEADER_MIN_HITS: usize = 2;

/// Pages inspected when deciding whether a PDF is scanned
pub const SCANNED_PROBE_PAGES: usize = 3;

/// A probed page with more extractable characters than this is text-native
pub const NATIVE_TEXT_MIN_CHARS: usize = 100;

/// A probed page with images and fewer characters than this marks the document as scanned
pub const SCANNED_PAGE_MAX_CHARS: usize = 50;

/// Spreadsheet rows scanned for the candidate test and the header row respectively
pub const SHEET_CANDIDATE_ROWS: usize = 5;
pub const SHEET_HEADER_SEARCH_ROWS: usize = 10;

pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 85;
pub const DEFAULT_REVIEW_THRESHOLD: u8 = 60;

/// Value written by enumerated rules when nothing matches
pub const UNSPECIFIED: &str = "不限";

/// Exam category used when no keyword matches
pub const EXAM_TYPE_OTHER: &str = "other";
