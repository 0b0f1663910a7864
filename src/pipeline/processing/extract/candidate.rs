use crate::constants::{CANDIDATE_MIN_KEYWORD_HITS, POSITION_TABLE_KEYWORDS};
use crate::pipeline::processing::schema::SchemaDictionary;

/// Number of distinct position keywords appearing anywhere in the row
pub fn keyword_hits<S: AsRef<str>>(cells: &[S]) -> usize {
    let text = cells
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    POSITION_TABLE_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count()
}

/// Number of cells containing at least one position keyword
pub fn keyword_cell_hits<S: AsRef<str>>(cells: &[S]) -> usize {
    cells
        .iter()
        .filter(|c| {
            let cell = c.as_ref();
            POSITION_TABLE_KEYWORDS.iter().any(|kw| cell.contains(kw))
        })
        .count()
}

/// Number of cells containing at least one dictionary synonym
pub fn synonym_cell_hits<S: AsRef<str>>(cells: &[S], dictionary: &SchemaDictionary) -> usize {
    cells
        .iter()
        .filter(|c| {
            let cell = c.as_ref();
            dictionary.synonyms().any(|syn| cell.contains(syn))
        })
        .count()
}

pub fn is_position_header<S: AsRef<str>>(cells: &[S]) -> bool {
    keyword_hits(cells) >= CANDIDATE_MIN_KEYWORD_HITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_hits_counts_distinct_keywords() {
        let header = ["职位名称", "职位代码", "用人部门", "学历", "专业"];
        assert_eq!(keyword_hits(&header), 4);
        assert!(is_position_header(&header));
    }

    #[test]
    fn test_short_header_is_not_candidate() {
        let header = ["职位名称", "招录机关", "招录人数"];
        assert_eq!(keyword_hits(&header), 2);
        assert!(!is_position_header(&header));
    }

    #[test]
    fn test_synonym_cell_hits() {
        let dictionary = SchemaDictionary::builtin();
        let header = ["序号", "职位名称", "招录机关", "联系电话"];
        assert_eq!(synonym_cell_hits(&header, &dictionary), 2);
    }

    #[test]
    fn test_keyword_cell_hits() {
        let header = ["职位名称", "岗位职责", "电话"];
        assert_eq!(keyword_cell_hits(&header), 2);
    }
}
