//! Preprocessed query type

use serde::{Deserialize, Serialize};

/// Output of query preprocessing.
///
/// `expanded_terms` holds noun keywords extracted from the standardized
/// query, unioned with keywords from matching dictionary synonyms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessedQuery {
    /// Original user query.
    pub original: String,
    /// Whitespace-normalized query.
    pub normalized: String,
    /// Query after domain-term spacing standardization.
    pub standardized: String,
    /// Synonym-expanded noun keywords.
    pub expanded_terms: Vec<String>,
    /// Extracted clause reference, e.g. `"제15조"`.
    pub clause_number: Option<String>,
    /// False when the query matches an incomplete-query pattern.
    pub is_complete: bool,
    /// Advice strings for incomplete queries.
    pub suggestions: Vec<String>,
}

impl PreprocessedQuery {
    /// Identity preprocessing, used as the fallback when the pipeline fails.
    pub fn passthrough(query: &str) -> Self {
        Self {
            original: query.to_string(),
            normalized: query.to_string(),
            standardized: query.to_string(),
            expanded_terms: vec![query.to_string()],
            clause_number: None,
            is_complete: true,
            suggestions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_complete() {
        let q = PreprocessedQuery::passthrough("암진단비");
        assert!(q.is_complete);
        assert_eq!(q.standardized, "암진단비");
        assert_eq!(q.expanded_terms, vec!["암진단비".to_string()]);
        assert!(q.clause_number.is_none());
    }
}
