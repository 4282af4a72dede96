//! Korean text analysis for policy documents
//!
//! Features:
//! - Noun keyword extraction with the ko-dic morphological dictionary
//!   (compound merge, stop-word and length filtering, rule-based fallback)
//! - cl100k_base token counting shared by context assembly and prompting
//! - Hierarchical structure detection and truncation analysis for
//!   policy-clause chunks

pub mod keywords;
pub mod structure;
pub mod tokens;

pub use keywords::KeywordExtractor;
pub use structure::{
    Completeness, SequenceIssue, SequenceIssueKind, StructureAnalyzer, StructureElement,
    StructureElements,
};
pub use tokens::TokenCounter;
