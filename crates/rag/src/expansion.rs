//! Chunk expansion
//!
//! Replaces a truncated chunk with a merge of itself and its neighbors in
//! the requested direction. The merge alternates outward from the pivot
//! under a token budget and stops forward expansion at a new-section
//! boundary (a fresh 제N조/장/절 header, a numbered heading, or a table the
//! pivot did not start).

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use policy_agent_config::constants::expansion as expansion_constants;
use policy_agent_core::{
    AnnotatedChunk, ExpandDirection, ExpandRequest, ResultMetadata, SearchResult,
};
use policy_agent_store::ChunkStore;
use policy_agent_text::TokenCounter;

static SECTION_START: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^제\d+조", r"^제\d+장", r"^제\d+절", r"^\d+\.\s*[가-힣]+"]
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("bad pattern {p}: {e}")))
        .collect()
});

/// Result of merging a pivot with neighbors.
#[derive(Debug, Clone)]
pub struct MergedChunk {
    pub content: String,
    /// Chunk ids in ascending `chunk_index` order; always contains the pivot.
    pub included_chunks: Vec<i64>,
    pub total_tokens: usize,
    pub truncated: bool,
}

/// Expands truncated chunks with adjacent content.
pub struct ChunkExpander {
    store: Arc<dyn ChunkStore>,
    tokens: TokenCounter,
    /// Per-pass token ceiling.
    max_tokens: usize,
}

impl ChunkExpander {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            tokens: TokenCounter::new(),
            max_tokens: expansion_constants::MAX_EXPANSION_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Does `content` open a semantic section the pivot does not belong to?
    fn starts_new_section(content: &str, primary_content: &str) -> bool {
        let first_line = match content.trim().lines().next() {
            Some(line) => line.trim(),
            None => return false,
        };
        if first_line.is_empty() {
            return false;
        }

        if first_line.starts_with('|') {
            // A table row continues the pivot's table; otherwise it is a
            // fresh table and a fresh section.
            return !primary_content.contains('|');
        }

        SECTION_START.iter().any(|re| re.is_match(first_line))
    }

    fn chunk_tokens(&self, chunk: &AnnotatedChunk) -> usize {
        match chunk.chunk.token_count {
            Some(n) => n.max(0) as usize,
            None => self.tokens.count(&chunk.chunk.content),
        }
    }

    /// Merge the pivot with its neighbors under `max_tokens`.
    ///
    /// The pivot is always included. Neighbors are added alternately
    /// forward and backward; forward expansion stops at a new-section
    /// boundary, either direction stops when the budget would be exceeded.
    pub fn merge_chunks(
        &self,
        primary: &SearchResult,
        prev: &[AnnotatedChunk],
        next: &[AnnotatedChunk],
        max_tokens: usize,
    ) -> MergedChunk {
        struct Piece {
            chunk_id: i64,
            content: String,
            tokens: usize,
        }

        let pieces: Vec<Piece> = prev
            .iter()
            .map(|c| Piece {
                chunk_id: c.chunk.chunk_id,
                content: c.chunk.content.clone(),
                tokens: self.chunk_tokens(c),
            })
            .chain(std::iter::once(Piece {
                chunk_id: primary.chunk_id,
                content: primary.content.clone(),
                tokens: self.tokens.count(&primary.content),
            }))
            .chain(next.iter().map(|c| Piece {
                chunk_id: c.chunk.chunk_id,
                content: c.chunk.content.clone(),
                tokens: self.chunk_tokens(c),
            }))
            .collect();

        let primary_idx = prev.len();
        let mut included: Vec<i64> = vec![pieces[primary_idx].chunk_id];
        let mut parts: Vec<&str> = vec![&pieces[primary_idx].content];
        let mut total_tokens = pieces[primary_idx].tokens;
        let mut truncated = total_tokens > max_tokens;

        let mut prev_idx = primary_idx.checked_sub(1);
        let mut next_idx = primary_idx + 1;

        while (prev_idx.is_some() || next_idx < pieces.len()) && !truncated {
            let mut advanced = false;

            if next_idx < pieces.len() {
                let piece = &pieces[next_idx];
                if Self::starts_new_section(&piece.content, &primary.content) {
                    tracing::debug!(chunk_id = piece.chunk_id, "new section, merge stops");
                    break;
                }
                if total_tokens + piece.tokens <= max_tokens {
                    parts.push(&piece.content);
                    included.push(piece.chunk_id);
                    total_tokens += piece.tokens;
                    next_idx += 1;
                    advanced = true;
                } else {
                    truncated = true;
                    break;
                }
            }

            if let Some(index) = prev_idx {
                let piece = &pieces[index];
                if total_tokens + piece.tokens <= max_tokens {
                    parts.insert(0, &piece.content);
                    included.insert(0, piece.chunk_id);
                    total_tokens += piece.tokens;
                    prev_idx = index.checked_sub(1);
                    advanced = true;
                } else {
                    truncated = true;
                    break;
                }
            }

            if !advanced {
                break;
            }
        }

        let content = parts.join("\n\n");

        tracing::info!(
            included = included.len(),
            total_tokens,
            max_tokens,
            truncated,
            "chunks merged"
        );

        MergedChunk { content, included_chunks: included, total_tokens, truncated }
    }

    /// Rewrite `results`, expanding the requested pivots and carrying the
    /// rest through under the global budget. Once the budget is hit,
    /// trailing non-expanded results are dropped.
    pub async fn expand_search_results(
        &self,
        results: Vec<SearchResult>,
        requests: &[ExpandRequest],
        max_tokens: Option<usize>,
    ) -> Vec<SearchResult> {
        let max_tokens = max_tokens.unwrap_or(self.max_tokens).min(self.max_tokens);

        let directions: HashMap<i64, ExpandDirection> =
            requests.iter().map(|r| (r.chunk_id, r.direction)).collect();

        let mut expanded_results = Vec::with_capacity(results.len());
        let mut total_tokens = 0usize;

        for result in results {
            let Some(direction) = directions.get(&result.chunk_id).copied() else {
                let tokens = match result.token_count {
                    Some(n) if !result.metadata.expanded => n.max(0) as usize,
                    _ => self.tokens.count(&result.content),
                };
                if total_tokens + tokens > max_tokens {
                    tracing::warn!(
                        chunk_id = result.chunk_id,
                        total_tokens,
                        max_tokens,
                        "budget reached, dropping trailing results"
                    );
                    break;
                }
                total_tokens += tokens;
                expanded_results.push(result);
                continue;
            };

            if total_tokens >= max_tokens {
                tracing::warn!(
                    chunk_id = result.chunk_id,
                    "budget exhausted before expansion, keeping pivot as-is"
                );
                expanded_results.push(result);
                continue;
            }

            tracing::info!(chunk_id = result.chunk_id, ?direction, "expanding chunk");

            let adjacent = match self
                .store
                .get_adjacent(result.chunk_id, direction, expansion_constants::ADJACENT_LIMIT)
                .await
            {
                Ok(adjacent) => adjacent,
                Err(e) => {
                    tracing::error!(error = %e, chunk_id = result.chunk_id, "adjacency fetch failed");
                    let tokens = self.tokens.count(&result.content);
                    if total_tokens + tokens <= max_tokens {
                        total_tokens += tokens;
                        expanded_results.push(result);
                    }
                    continue;
                }
            };

            let merged = self.merge_chunks(
                &result,
                &adjacent.prev,
                &adjacent.next,
                max_tokens - total_tokens,
            );

            if total_tokens + merged.total_tokens > max_tokens {
                // Expansion would blow the budget: fall back to the pivot.
                let tokens = self.tokens.count(&result.content);
                if total_tokens + tokens <= max_tokens {
                    total_tokens += tokens;
                    expanded_results.push(result);
                }
                continue;
            }

            let mut metadata = ResultMetadata {
                expanded: true,
                included_chunks: merged.included_chunks.clone(),
                total_tokens: Some(merged.total_tokens),
                truncated: merged.truncated,
                ..Default::default()
            };
            metadata.extra = result.metadata.extra.clone();

            total_tokens += merged.total_tokens;
            expanded_results.push(SearchResult {
                content: merged.content,
                metadata,
                token_count: None,
                ..result
            });
        }

        tracing::info!(
            count = expanded_results.len(),
            total_tokens,
            max_tokens,
            "expansion pass done"
        );

        expanded_results
    }
}
