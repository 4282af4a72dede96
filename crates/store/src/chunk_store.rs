//! ChunkStore trait and PostgreSQL implementation
//!
//! All reads join `documents` for annotation and apply the
//! `status = 'active'` filter. Cosine similarity is expressed with the
//! pgvector `<=>` operator (`similarity = 1 - distance`); full-text search
//! runs against the pre-built `content_tsv` lexeme column with
//! `to_tsquery('simple', …)` AND semantics.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use policy_agent_core::{AdjacentChunks, AnnotatedChunk, Chunk, ChunkType, DocumentInfo, ExpandDirection};

use crate::StoreError;

/// Optional equality filters applied to searches.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub document_type: Option<String>,
    pub clause_number: Option<String>,
}

impl SearchFilters {
    pub fn clause(clause_number: Option<String>) -> Self {
        Self { document_type: None, clause_number }
    }
}

/// Read interface over ingested chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Cosine-similarity search over active documents. Results are in
    /// non-increasing similarity order; `similarity > threshold`.
    async fn search_vectors(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<AnnotatedChunk>, StoreError>;

    /// Ranked full-text search with a conjunctive lexeme query
    /// (`term1 & term2 & …`). The `ts_rank` lands in the score slot.
    async fn fts_search(
        &self,
        tsquery: &str,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<AnnotatedChunk>, StoreError>;

    /// Up to `limit` neighbors per requested direction, each side ordered
    /// by ascending `chunk_index`.
    async fn get_adjacent(
        &self,
        chunk_id: i64,
        direction: ExpandDirection,
        limit: i64,
    ) -> Result<AdjacentChunks, StoreError>;

    /// Fetch chunks by id, ordered by `(document_id, chunk_index)`.
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<AnnotatedChunk>, StoreError>;

    /// Which of the given clause numbers exist in active documents.
    async fn clause_numbers_exist(&self, clauses: &[String]) -> Result<HashSet<String>, StoreError>;
}

/// PostgreSQL-backed chunk store.
#[derive(Clone)]
pub struct PgChunkStore {
    pool: PgPool,
}

const CHUNK_COLUMNS: &str = "c.id AS chunk_id, c.document_id, c.chunk_index, c.content, \
     c.chunk_type, c.page_number, c.section_title, c.clause_number, c.metadata, c.token_count, \
     d.filename, d.document_type, d.company_name";

impl PgChunkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_chunk(row: &PgRow, score: f64) -> Result<AnnotatedChunk, StoreError> {
        let chunk_type: String = row.try_get("chunk_type")?;
        let chunk_type = match chunk_type.as_str() {
            "table" => ChunkType::Table,
            "image" => ChunkType::Image,
            _ => ChunkType::Text,
        };

        let metadata: Option<serde_json::Value> = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = match metadata {
            Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        };

        Ok(AnnotatedChunk {
            chunk: Chunk {
                chunk_id: row.try_get("chunk_id")?,
                document_id: row.try_get("document_id")?,
                chunk_index: row.try_get("chunk_index")?,
                content: row.try_get("content")?,
                chunk_type,
                token_count: row.try_get("token_count")?,
                page_number: row.try_get("page_number")?,
                section_title: row.try_get("section_title")?,
                clause_number: row.try_get("clause_number")?,
                metadata,
            },
            document: DocumentInfo {
                filename: row.try_get("filename")?,
                document_type: row.try_get("document_type")?,
                company_name: row.try_get("company_name")?,
            },
            score,
        })
    }
}

#[async_trait]
impl ChunkStore for PgChunkStore {
    async fn search_vectors(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<AnnotatedChunk>, StoreError> {
        let mut sql = format!(
            "SELECT {CHUNK_COLUMNS}, 1 - (c.embedding <=> $1) AS similarity \
             FROM document_chunks c \
             INNER JOIN documents d ON c.document_id = d.id \
             WHERE 1 - (c.embedding <=> $1) > $2 AND d.status = 'active'"
        );
        let mut next_param = 3;
        if filters.document_type.is_some() {
            sql.push_str(&format!(" AND d.document_type = ${next_param}"));
            next_param += 1;
        }
        if filters.clause_number.is_some() {
            sql.push_str(&format!(" AND c.clause_number = ${next_param}"));
            next_param += 1;
        }
        sql.push_str(&format!(" ORDER BY c.embedding <=> $1 LIMIT ${next_param}"));

        let mut query = sqlx::query(&sql)
            .bind(Vector::from(embedding.to_vec()))
            .bind(threshold);
        if let Some(document_type) = &filters.document_type {
            query = query.bind(document_type);
        }
        if let Some(clause_number) = &filters.clause_number {
            query = query.bind(clause_number);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let similarity: f64 = row.try_get("similarity")?;
                Self::row_to_chunk(row, similarity)
            })
            .collect()
    }

    async fn fts_search(
        &self,
        tsquery: &str,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<AnnotatedChunk>, StoreError> {
        let mut sql = format!(
            "SELECT {CHUNK_COLUMNS}, \
             ts_rank(c.content_tsv, to_tsquery('simple', $1)) AS rank \
             FROM document_chunks c \
             INNER JOIN documents d ON c.document_id = d.id \
             WHERE c.content_tsv @@ to_tsquery('simple', $1) AND d.status = 'active'"
        );
        let mut next_param = 2;
        if filters.document_type.is_some() {
            sql.push_str(&format!(" AND d.document_type = ${next_param}"));
            next_param += 1;
        }
        if filters.clause_number.is_some() {
            sql.push_str(&format!(" AND c.clause_number = ${next_param}"));
            next_param += 1;
        }
        sql.push_str(&format!(" ORDER BY rank DESC LIMIT ${next_param}"));

        let mut query = sqlx::query(&sql).bind(tsquery);
        if let Some(document_type) = &filters.document_type {
            query = query.bind(document_type);
        }
        if let Some(clause_number) = &filters.clause_number {
            query = query.bind(clause_number);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let rank: f32 = row.try_get("rank")?;
                Self::row_to_chunk(row, rank as f64)
            })
            .collect()
    }

    async fn get_adjacent(
        &self,
        chunk_id: i64,
        direction: ExpandDirection,
        limit: i64,
    ) -> Result<AdjacentChunks, StoreError> {
        let pivot = sqlx::query(
            "SELECT document_id, chunk_index FROM document_chunks WHERE id = $1",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(pivot) = pivot else {
            tracing::warn!(chunk_id, "adjacency pivot not found");
            return Ok(AdjacentChunks::default());
        };
        let document_id: i64 = pivot.try_get("document_id")?;
        let chunk_index: i32 = pivot.try_get("chunk_index")?;

        let mut adjacent = AdjacentChunks::default();

        if matches!(direction, ExpandDirection::Prev | ExpandDirection::Both) {
            let sql = format!(
                "SELECT {CHUNK_COLUMNS} \
                 FROM document_chunks c \
                 INNER JOIN documents d ON c.document_id = d.id \
                 WHERE c.document_id = $1 AND c.chunk_index < $2 AND d.status = 'active' \
                 ORDER BY c.chunk_index DESC LIMIT $3"
            );
            let rows = sqlx::query(&sql)
                .bind(document_id)
                .bind(chunk_index)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            // Fetched nearest-first; restore ascending document order.
            adjacent.prev = rows
                .iter()
                .rev()
                .map(|row| Self::row_to_chunk(row, 1.0))
                .collect::<Result<_, _>>()?;
        }

        if matches!(direction, ExpandDirection::Next | ExpandDirection::Both) {
            let sql = format!(
                "SELECT {CHUNK_COLUMNS} \
                 FROM document_chunks c \
                 INNER JOIN documents d ON c.document_id = d.id \
                 WHERE c.document_id = $1 AND c.chunk_index > $2 AND d.status = 'active' \
                 ORDER BY c.chunk_index ASC LIMIT $3"
            );
            let rows = sqlx::query(&sql)
                .bind(document_id)
                .bind(chunk_index)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            adjacent.next = rows
                .iter()
                .map(|row| Self::row_to_chunk(row, 1.0))
                .collect::<Result<_, _>>()?;
        }

        Ok(adjacent)
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<AnnotatedChunk>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} \
             FROM document_chunks c \
             INNER JOIN documents d ON c.document_id = d.id \
             WHERE c.id = ANY($1) \
             ORDER BY c.document_id, c.chunk_index"
        );
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;
        rows.iter().map(|row| Self::row_to_chunk(row, 1.0)).collect()
    }

    async fn clause_numbers_exist(
        &self,
        clauses: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if clauses.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            "SELECT DISTINCT c.clause_number \
             FROM document_chunks c \
             INNER JOIN documents d ON c.document_id = d.id \
             WHERE c.clause_number = ANY($1) AND d.status = 'active'",
        )
        .bind(clauses)
        .fetch_all(&self.pool)
        .await?;

        let mut existing = HashSet::new();
        for row in rows {
            if let Some(clause) = row.try_get::<Option<String>, _>("clause_number")? {
                existing.insert(clause);
            }
        }
        Ok(existing)
    }
}
