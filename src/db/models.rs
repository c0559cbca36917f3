use crate::indexer::elements::ElementKind;
use crate::indexer::identity::ChunkId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub language: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub file_id: i64,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub name: String,
    pub parent_class: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding_id: String,
}

/// A chunk ready to be written: registry row plus its vector.
#[derive(Debug, Clone)]
pub struct NewChunk<'a> {
    pub id: ChunkId,
    pub kind: ElementKind,
    pub name: &'a str,
    pub parent_class: Option<&'a str>,
    pub start_line: usize,
    pub end_line: usize,
    pub content: &'a str,
    pub vector: Vec<f32>,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub chunk_id: String,
    pub feedback_type: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata stored next to each vector and returned with search hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub file_path: String,
    pub language: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub embedding_id: String,
    pub content: String,
    pub metadata: VectorMetadata,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub file_count: usize,
    pub chunk_count: usize,
    pub vector_count: usize,
    pub feedback_count: usize,
    pub dimensions: usize,
    pub languages: Vec<String>,
    pub last_indexed: Option<DateTime<Utc>>,
}
