//! Insurance-terms dictionary
//!
//! Domain dictionary driving query preprocessing: spacing standardization
//! (joined term → spaced term), synonym sets, and incomplete-query patterns
//! with suggestions. Loads from a YAML file; a compiled-in default keeps the
//! pipeline usable without one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::ConfigError;

/// An incomplete-query pattern with the advice shown when it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompletePattern {
    /// Regex matched against the standardized query.
    pub pattern: String,
    /// Suggestion surfaced to the user.
    pub suggestion: String,
}

/// Insurance-terms dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsConfig {
    /// Joined term → spaced term, e.g. "암진단비" → "암 진단비".
    #[serde(default)]
    pub spacing: HashMap<String, String>,
    /// Canonical term → equivalents, e.g. "암" → ["악성신생물", "암질환"].
    #[serde(default)]
    pub synonyms: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub incomplete_patterns: Vec<IncompletePattern>,
}

impl TermsConfig {
    /// Load the dictionary from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load from `path` when non-empty, otherwise the built-in dictionary.
    pub fn load_or_default(path: &str) -> Self {
        if path.is_empty() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(terms) => terms,
            Err(e) => {
                tracing::warn!(error = %e, path, "terms dictionary load failed, using built-in");
                Self::default()
            }
        }
    }
}

impl Default for TermsConfig {
    fn default() -> Self {
        let spacing = [
            ("암진단비", "암 진단비"),
            ("보험금액", "보험 금액"),
            ("통원치료비", "통원 치료비"),
            ("수술급여금", "수술 급여금"),
            ("만기환급금", "만기 환급금"),
            ("사망보험금", "사망 보험금"),
            ("입원급여금", "입원 급여금"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let synonyms = [
            ("암", vec!["악성신생물", "암질환"]),
            ("진단비", vec!["진단급여금", "진단금"]),
            ("보험금", vec!["급여금", "보험급여금"]),
            ("해지", vec!["해약"]),
            ("면책기간", vec!["보장제외기간"]),
            ("가입", vec!["계약체결", "청약"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
        .collect();

        let incomplete_patterns = vec![
            IncompletePattern {
                pattern: r"^\s*(얼마|언제|어디|어떻게|왜|무엇|뭐)\s*(인가요|인지|예요|이에요)?\s*\??\s*$"
                    .to_string(),
                suggestion: "구체적인 항목을 함께 입력해주세요. (예: 암 진단비 얼마인가요?)"
                    .to_string(),
            },
            IncompletePattern {
                pattern: r"^\s*제\s*\d+\s*조\s*\??\s*$".to_string(),
                suggestion: "조항 번호와 함께 궁금한 내용을 입력해주세요. (예: 제15조의 보장 내용을 알려주세요)"
                    .to_string(),
            },
            IncompletePattern {
                pattern: r"^\s*(보험|약관|보장|특약)\s*\??\s*$".to_string(),
                suggestion: "어떤 보험 내용이 궁금하신지 구체적으로 입력해주세요. (예: 암보험 면책기간은 얼마나 되나요?)"
                    .to_string(),
            },
        ];

        Self {
            spacing,
            synonyms,
            incomplete_patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_dictionary_is_populated() {
        let terms = TermsConfig::default();
        assert!(terms.spacing.len() >= 5);
        assert!(terms.synonyms.len() >= 3);
        assert!(terms.incomplete_patterns.len() >= 2);
        assert_eq!(terms.spacing["암진단비"], "암 진단비");
        assert!(terms.synonyms["암"].contains(&"악성신생물".to_string()));
    }

    #[test]
    fn default_patterns_compile() {
        for p in TermsConfig::default().incomplete_patterns {
            assert!(regex_lite_compiles(&p.pattern), "bad pattern: {}", p.pattern);
        }
    }

    fn regex_lite_compiles(pattern: &str) -> bool {
        // serde_yaml round-trip keeps the string intact; actual compilation
        // happens in the preprocessor. Here we only sanity-check syntax by
        // balanced parens/brackets.
        let opens = pattern.matches('(').count();
        let closes = pattern.matches(')').count();
        opens == closes
    }

    #[test]
    fn loads_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "spacing:\n  \"암진단비\": \"암 진단비\"\nsynonyms:\n  \"암\": [\"악성신생물\"]\nincomplete_patterns:\n  - pattern: \"^얼마$\"\n    suggestion: \"구체적으로 입력해주세요\"\n"
        )
        .unwrap();

        let terms = TermsConfig::load(file.path()).unwrap();
        assert_eq!(terms.spacing.len(), 1);
        assert_eq!(terms.synonyms["암"], vec!["악성신생물".to_string()]);
        assert_eq!(terms.incomplete_patterns.len(), 1);
    }

    #[test]
    fn load_or_default_falls_back() {
        let terms = TermsConfig::load_or_default("/nonexistent/terms.yaml");
        assert!(!terms.spacing.is_empty());
    }
}
