//! Core data models for the retrieval and chat pipeline.
//!
//! These types flow between the chunker, vector index, retrieval engine,
//! prompt composer, and chat orchestration. Everything persisted or
//! returned across the API boundary derives serde.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded text passage derived from a source document — the unit of
/// retrieval. Immutable once created; owned by the vector index after
/// insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_file: String,
    /// Zero-based position within the source document's chunk sequence.
    pub sequence_index: usize,
    /// One-based page the chunk was extracted from, when known.
    pub page: Option<usize>,
}

/// Structured pointer back to the source chunk behind a retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// One-based rank matching the passage order in [`RetrievalResult`].
    pub id: usize,
    pub source_file: String,
    pub page: Option<usize>,
    pub chunk_index: usize,
}

/// Result of a similarity retrieval against one conversation scope.
///
/// An empty scope yields the empty result — never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub passages: Vec<String>,
    pub citations: Vec<Citation>,
    /// Deduplicated source filenames behind the citations.
    pub files: Vec<String>,
}

/// Per-file ingestion record within a conversation scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub documents: usize,
    pub chunks: usize,
    pub pages: usize,
    /// Set on first ingestion of the filename and preserved thereafter.
    pub added_at: DateTime<Utc>,
    /// Advances on every re-ingestion.
    pub updated_at: DateTime<Utc>,
}

/// Document metadata for one conversation scope, keyed by filename.
///
/// Updated in lockstep with the vector index and persisted alongside it.
/// Re-ingesting a filename replaces its record (keeping `added_at`), so
/// `total_chunks` reflects only the latest ingestion per file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
    #[serde(default)]
    pub total_chunks: usize,
}

impl DocumentMetadata {
    /// Merge an ingestion of `filename`, preserving the original
    /// `added_at` when the file was seen before, and recompute
    /// `total_chunks` as the sum across files.
    pub fn record_ingest(
        &mut self,
        filename: &str,
        pages: usize,
        chunks: usize,
        now: DateTime<Utc>,
    ) {
        let added_at = self
            .files
            .get(filename)
            .map(|existing| existing.added_at)
            .unwrap_or(now);
        self.files.insert(
            filename.to_string(),
            FileRecord {
                documents: pages,
                chunks,
                pages,
                added_at,
                updated_at: now,
            },
        );
        self.total_chunks = self.files.values().map(|f| f.chunks).sum();
    }
}

/// Summary returned from a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub filename: String,
    pub documents: usize,
    pub chunks: usize,
    pub pages: usize,
    /// Conversation-wide chunk count after this ingestion.
    pub total_chunks: usize,
    /// All filenames ingested into the scope so far.
    pub files: Vec<String>,
}

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalized label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of conversation history. Owned by the history store; the
/// core only consumes and produces these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A single web search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}
