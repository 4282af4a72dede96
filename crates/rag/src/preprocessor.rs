//! Query preprocessing
//!
//! Normalizes whitespace, standardizes domain-term spacing, expands noun
//! keywords with dictionary synonyms, detects clause-number filters, and
//! flags incomplete queries. Any internal failure falls back to identity
//! preprocessing so search always proceeds.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use policy_agent_config::TermsConfig;
use policy_agent_core::PreprocessedQuery;
use policy_agent_text::KeywordExtractor;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap_or_else(|e| panic!("{e}")));
static CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*제\s*(\d+)\s*조").unwrap_or_else(|e| panic!("{e}")));

/// Dictionary-driven query preprocessor.
pub struct QueryPreprocessor {
    terms: TermsConfig,
    extractor: Arc<KeywordExtractor>,
    incomplete_patterns: Vec<(Regex, String)>,
}

impl QueryPreprocessor {
    pub fn new(terms: TermsConfig, extractor: Arc<KeywordExtractor>) -> Self {
        let incomplete_patterns = terms
            .incomplete_patterns
            .iter()
            .filter_map(|p| match Regex::new(&p.pattern) {
                Ok(regex) => Some((regex, p.suggestion.clone())),
                Err(e) => {
                    tracing::warn!(pattern = %p.pattern, error = %e, "incomplete pattern rejected");
                    None
                }
            })
            .collect();

        tracing::info!(
            spacing = terms.spacing.len(),
            synonyms = terms.synonyms.len(),
            patterns = terms.incomplete_patterns.len(),
            "query preprocessor ready"
        );

        Self { terms, extractor, incomplete_patterns }
    }

    /// Run the preprocessing pipeline. Never fails: internal problems fall
    /// back to identity preprocessing with the query as its own keyword.
    pub fn preprocess(&self, query: &str) -> PreprocessedQuery {
        if query.trim().is_empty() {
            return PreprocessedQuery::passthrough(query);
        }

        let normalized = normalize(query);
        let standardized = self.standardize(&normalized);

        let base_keywords = self.extractor.extract(&standardized);
        if base_keywords.is_empty() {
            tracing::warn!(query, "keyword extraction empty, identity fallback");
            return PreprocessedQuery::passthrough(query);
        }

        let expanded_terms = self.expand_synonyms(&base_keywords);
        let clause_number = extract_clause_number(&standardized);
        let (is_complete, suggestions) = self.check_completeness(&standardized);

        tracing::debug!(
            %standardized,
            keywords = ?base_keywords,
            expanded = ?expanded_terms,
            clause = ?clause_number,
            is_complete,
            "preprocessing done"
        );

        PreprocessedQuery {
            original: query.to_string(),
            normalized,
            standardized,
            expanded_terms,
            clause_number,
            is_complete,
            suggestions,
        }
    }

    /// Apply spacing rules: "암진단비" → "암 진단비".
    fn standardize(&self, normalized: &str) -> String {
        let mut standardized = normalized.to_string();
        for (term, replacement) in &self.terms.spacing {
            if standardized.contains(term.as_str()) {
                standardized = standardized.replace(term.as_str(), replacement);
            }
        }
        standardized
    }

    /// Union base keywords with noun keywords of every matching synonym
    /// entry. Matching is bidirectional: a keyword matches an entry if it
    /// overlaps the canonical term or any of its equivalents.
    fn expand_synonyms(&self, base_keywords: &[String]) -> Vec<String> {
        let mut expanded: Vec<String> = base_keywords.to_vec();
        let push_unique = |expanded: &mut Vec<String>, keyword: String| {
            if !expanded.contains(&keyword) {
                expanded.push(keyword);
            }
        };

        for keyword in base_keywords {
            for (term, synonyms) in &self.terms.synonyms {
                let key_match = term.contains(keyword.as_str()) || keyword.contains(term.as_str());
                let value_match = synonyms
                    .iter()
                    .any(|s| s.contains(keyword.as_str()) || keyword.contains(s.as_str()));
                if !key_match && !value_match {
                    continue;
                }
                for candidate in synonyms.iter().chain(std::iter::once(term)) {
                    for extracted in self.extractor.extract(candidate) {
                        push_unique(&mut expanded, extracted);
                    }
                }
            }
        }

        expanded
    }

    fn check_completeness(&self, standardized: &str) -> (bool, Vec<String>) {
        let suggestions: Vec<String> = self
            .incomplete_patterns
            .iter()
            .filter(|(regex, _)| regex.is_match(standardized))
            .map(|(_, suggestion)| suggestion.clone())
            .collect();
        (suggestions.is_empty(), suggestions)
    }
}

fn normalize(query: &str) -> String {
    WHITESPACE.replace_all(query.trim(), " ").to_string()
}

/// Extract a leading clause reference: "제 15 조의 내용" → "제15조".
fn extract_clause_number(query: &str) -> Option<String> {
    CLAUSE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|number| format!("제{}조", number.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor() -> QueryPreprocessor {
        QueryPreprocessor::new(TermsConfig::default(), Arc::new(KeywordExtractor::new()))
    }

    #[test]
    fn normalization_collapses_whitespace() {
        let result = preprocessor().preprocess("  제15조   암진단비\t얼마인가요?  ");
        assert_eq!(result.normalized, "제15조 암진단비 얼마인가요?");
        assert_eq!(result.standardized, "제15조 암 진단비 얼마인가요?");
    }

    #[test]
    fn spacing_standardization_applies() {
        let result = preprocessor().preprocess("암진단비 얼마인가요?");
        assert_eq!(result.standardized, "암 진단비 얼마인가요?");
        assert!(result.is_complete);
    }

    #[test]
    fn synonym_expansion_reaches_dictionary_terms() {
        let result = preprocessor().preprocess("암진단비 얼마인가요?");
        assert!(result.expanded_terms.contains(&"악성신생물".to_string()),
            "expanded: {:?}", result.expanded_terms);
        assert!(result.expanded_terms.contains(&"암질환".to_string()));
    }

    #[test]
    fn clause_number_detection() {
        let result = preprocessor().preprocess("제15조의 내용을 알려줘");
        assert_eq!(result.clause_number.as_deref(), Some("제15조"));
        assert!(result.is_complete);

        let result = preprocessor().preprocess("제 15 조 보장 내용");
        assert_eq!(result.clause_number.as_deref(), Some("제15조"));

        let result = preprocessor().preprocess("보험금 얼마인가요?");
        assert!(result.clause_number.is_none());
    }

    #[test]
    fn incomplete_queries_collect_suggestions() {
        let result = preprocessor().preprocess("얼마");
        assert!(!result.is_complete);
        assert!(!result.suggestions.is_empty());

        let result = preprocessor().preprocess("제15조");
        assert!(!result.is_complete);

        let result = preprocessor().preprocess("암 진단비 얼마인가요?");
        assert!(result.is_complete);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn preprocessing_is_idempotent_on_standardized() {
        let preprocessor = preprocessor();
        let first = preprocessor.preprocess("암진단비 얼마인가요?");
        let second = preprocessor.preprocess(&first.standardized);
        assert_eq!(first.standardized, second.standardized);
        assert_eq!(first.clause_number, second.clause_number);
        assert_eq!(first.is_complete, second.is_complete);
    }

    #[test]
    fn empty_query_passes_through() {
        let result = preprocessor().preprocess("   ");
        assert!(result.is_complete);
        assert_eq!(result.expanded_terms.len(), 1);
    }
}
