//! Noun keyword extraction
//!
//! Extracts a de-duplicated, insertion-ordered list of noun keywords from a
//! Korean query using the ko-dic morphological dictionary. Adjacent noun
//! tokens are merged into compounds ("면책" + "기간" → "면책기간") so that
//! domain terms survive segmentation. When the analyzer is unavailable, a
//! rule-based splitter with a small particle stripper takes over.

use std::collections::HashSet;

use lindera::dictionary::{load_dictionary_from_kind, DictionaryKind};
use lindera::mode::Mode;
use lindera::segmenter::Segmenter;
use lindera::tokenizer::Tokenizer;
use once_cell::sync::Lazy;

/// Noun-family part-of-speech tags kept by the extractor: general noun,
/// proper noun, bound noun, nominal suffix.
const NOUN_TAGS: [&str; 4] = ["NNG", "NNP", "NNB", "XSN"];

/// Single-character nouns worth keeping (insurance/medical atoms).
static IMPORTANT_SINGLE_CHAR: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "암", "간", "폐", "위", "뇌", "심", "장", "혈", "골", "신", "눈", "귀", "코", "입", "치",
        "손", "발", "목",
    ]
    .into_iter()
    .collect()
});

/// Question words and weightless bound nouns dropped from keyword lists.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "얼마", "어디", "언제", "누구", "무엇", "뭐", "왜", "어떻게", "어느", "어떤", "무슨",
        "몇", "어찌", "하는", "되는", "있는", "것", "수", "때", "등", "및", "또",
    ]
    .into_iter()
    .collect()
});

/// Trailing particles stripped by the fallback splitter.
const FALLBACK_PARTICLES: [&str; 16] = [
    "은", "는", "이", "가", "을", "를", "의", "에", "에서", "으로", "로", "와", "과", "도",
    "이란", "란",
];

/// Morphological noun keyword extractor.
pub struct KeywordExtractor {
    tokenizer: Option<Tokenizer>,
}

impl KeywordExtractor {
    /// Build the extractor. Dictionary load failure is logged and the
    /// extractor degrades to the rule-based fallback.
    pub fn new() -> Self {
        let tokenizer = match load_dictionary_from_kind(DictionaryKind::KoDic) {
            Ok(dictionary) => {
                let segmenter = Segmenter::new(Mode::Normal, dictionary, None);
                Some(Tokenizer::new(segmenter))
            }
            Err(e) => {
                tracing::warn!(error = %e, "ko-dic load failed, using rule-based fallback");
                None
            }
        };
        Self { tokenizer }
    }

    /// Extract noun keywords, insertion-ordered and de-duplicated.
    pub fn extract(&self, query: &str) -> Vec<String> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let keywords = match &self.tokenizer {
            Some(tokenizer) => match self.extract_morphological(tokenizer, query) {
                Ok(keywords) => keywords,
                Err(e) => {
                    tracing::warn!(error = %e, "morphological analysis failed, using fallback");
                    extract_fallback(query)
                }
            },
            None => extract_fallback(query),
        };

        if keywords.is_empty() {
            // No nouns survived: degrade to the plain splitter so the
            // keyword search side still has something to work with.
            tracing::debug!(query, "no nouns extracted, falling back to word split");
            return extract_fallback(query);
        }

        keywords
    }

    fn extract_morphological(
        &self,
        tokenizer: &Tokenizer,
        query: &str,
    ) -> lindera::LinderaResult<Vec<String>> {
        let mut tokens = tokenizer.tokenize(query)?;

        let mut keywords: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut prev_end: Option<usize> = None;

        let flush = |current: &mut Vec<String>, keywords: &mut Vec<String>| {
            if current.is_empty() {
                return;
            }
            let compound = current.concat();
            if keep_keyword(&compound) {
                keywords.push(compound);
            }
            current.clear();
        };

        for token in tokens.iter_mut() {
            let surface = token.text.to_string();
            let byte_start = token.byte_start;
            let byte_end = token.byte_end;
            let is_noun = token
                .details()
                .first()
                .map(|tag| NOUN_TAGS.contains(&tag.as_ref()))
                .unwrap_or(false);

            if is_noun {
                // Contiguous byte spans mean the original text had no
                // separator between the nouns: merge into one compound.
                if prev_end != Some(byte_start) {
                    flush(&mut current, &mut keywords);
                }
                current.push(surface);
                prev_end = Some(byte_end);
            } else {
                flush(&mut current, &mut keywords);
                prev_end = None;
            }
        }
        flush(&mut current, &mut keywords);

        Ok(dedup_ordered(keywords))
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Length/allow-list/stop-word filter for a candidate keyword.
fn keep_keyword(compound: &str) -> bool {
    if STOP_WORDS.contains(compound) {
        return false;
    }
    compound.chars().count() >= 2 || IMPORTANT_SINGLE_CHAR.contains(compound)
}

/// Rule-based fallback: whitespace/punctuation split with trailing-particle
/// stripping and question-word removal.
pub(crate) fn extract_fallback(query: &str) -> Vec<String> {
    let clean: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || ('가'..='힣').contains(&c) {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut words = Vec::new();
    for word in clean.split_whitespace() {
        if word.chars().count() < 2 || STOP_WORDS.contains(word) {
            continue;
        }
        let mut stripped = word.to_string();
        for particle in FALLBACK_PARTICLES {
            if let Some(stem) = stripped.strip_suffix(particle) {
                if !stem.is_empty() {
                    stripped = stem.to_string();
                }
                break;
            }
        }
        if stripped.chars().count() >= 2 && !STOP_WORDS.contains(stripped.as_str()) {
            words.push(stripped);
        }
    }

    if words.is_empty() {
        words = clean
            .split_whitespace()
            .filter(|w| w.chars().count() >= 2)
            .map(String::from)
            .collect();
    }

    dedup_ordered(words)
}

fn dedup_ordered(words: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    words.into_iter().filter(|w| seen.insert(w.clone())).collect()
}
