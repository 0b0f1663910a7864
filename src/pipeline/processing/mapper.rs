use std::sync::Arc;

use tracing::debug;

use crate::domain::HeaderRow;
use crate::pipeline::processing::schema::SchemaDictionary;

/// Aligns table header cells with canonical field names
#[derive(Debug, Clone)]
pub struct FieldMapper {
    dictionary: Arc<SchemaDictionary>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(SchemaDictionary::global())
    }
}

impl FieldMapper {
    pub fn new(dictionary: Arc<SchemaDictionary>) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &SchemaDictionary {
        &self.dictionary
    }

    /// Map every header cell; the output has the same length as the input
    pub fn map_headers<S: AsRef<str>>(&self, headers: &[S]) -> HeaderRow {
        HeaderRow::new(
            headers
                .iter()
                .map(|h| self.map_header(h.as_ref()))
                .collect(),
        )
    }

    /// Exact synonym, then the first synonym in dictionary order that contains or
    /// is contained in the header, then a slug of the header itself.
    pub fn map_header(&self, header: &str) -> Option<String> {
        let header = header.trim();
        if header.is_empty() {
            return None;
        }

        if let Some(field) = self.dictionary.lookup(header) {
            return Some(field.to_string());
        }

        for (synonym, field) in self.dictionary.entries() {
            if header.contains(synonym) || synonym.contains(header) {
                debug!("Fuzzy header match '{}' -> '{}' via '{}'", header, field, synonym);
                return Some(field.to_string());
            }
        }

        Some(slugify(header))
    }
}

/// Lowercase and join whitespace-separated words with underscores
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> FieldMapper {
        FieldMapper::new(SchemaDictionary::builtin())
    }

    #[test]
    fn test_exact_match() {
        let header = mapper().map_headers(&["学历"]);
        assert_eq!(header.fields(), &[Some("education_min".to_string())]);
    }

    #[test]
    fn test_blank_header_maps_to_none() {
        let header = mapper().map_headers(&["", "   "]);
        assert_eq!(header.fields(), &[None, None]);
    }

    #[test]
    fn test_fuzzy_match_both_directions() {
        let mapper = mapper();
        // header contains a synonym
        assert_eq!(mapper.map_header("招录机关（盖章）").as_deref(), Some("department_name"));
        // header is contained in a synonym
        assert_eq!(mapper.map_header("职位").as_deref(), Some("position_name"));
    }

    #[test]
    fn test_fuzzy_match_takes_first_dictionary_entry() {
        let dictionary = SchemaDictionary::from_entries(vec![
            ("工作经历", "work_exp_requirement"),
            ("基层工作经历", "grassroots_exp_years"),
        ]);
        let mapper = FieldMapper::new(Arc::new(dictionary));
        assert_eq!(
            mapper.map_header("基层工作经历年限").as_deref(),
            Some("work_exp_requirement")
        );
    }

    #[test]
    fn test_unknown_header_is_slugified() {
        assert_eq!(
            mapper().map_header("Exam  Room No").as_deref(),
            Some("exam_room_no")
        );
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mapper = mapper();
        let headers = ["职位名称", "招录机关", "招录人数", "序号"];
        assert_eq!(mapper.map_headers(&headers), mapper.map_headers(&headers));
    }
}
