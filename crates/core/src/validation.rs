//! Answer validation report types
//!
//! Four independent validation axes are combined into a weighted
//! confidence score; an answer is reliable when confidence reaches 0.7.

use serde::{Deserialize, Serialize};

/// Confidence threshold above which an answer counts as reliable.
pub const RELIABILITY_THRESHOLD: f64 = 0.7;

/// Outcome of a single validation axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDetail {
    pub check_name: String,
    pub passed: bool,
    /// Score in `[0, 1]`.
    pub score: f64,
    pub details: Option<String>,
}

impl ValidationDetail {
    pub fn new(check_name: &str, passed: bool, score: f64, details: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            passed,
            score: score.clamp(0.0, 1.0),
            details: Some(details.into()),
        }
    }
}

/// Full validation report for one generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Weighted confidence in `[0, 1]`.
    pub confidence_score: f64,
    /// `confidence_score >= 0.7`.
    pub is_reliable: bool,
    pub hallucination_check: ValidationDetail,
    pub clause_existence_check: ValidationDetail,
    pub context_match_check: ValidationDetail,
    pub format_check: ValidationDetail,
    /// Wall-clock validation time in seconds.
    pub validation_time: f64,
    /// Number of regenerations before this answer (0 = first attempt).
    pub regeneration_count: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Assemble a report from the four axis results, clamping confidence
    /// and deriving reliability.
    pub fn from_checks(
        hallucination_check: ValidationDetail,
        clause_existence_check: ValidationDetail,
        context_match_check: ValidationDetail,
        format_check: ValidationDetail,
        confidence_score: f64,
        validation_time: f64,
        warnings: Vec<String>,
    ) -> Self {
        let confidence_score = confidence_score.clamp(0.0, 1.0);
        Self {
            confidence_score,
            is_reliable: confidence_score >= RELIABILITY_THRESHOLD,
            hallucination_check,
            clause_existence_check,
            context_match_check,
            format_check,
            validation_time,
            regeneration_count: 0,
            warnings,
        }
    }
}
