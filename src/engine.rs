//! Retrieval engine orchestration.
//!
//! Coordinates the ingestion flow (extract → chunk → embed → index →
//! persist) and similarity retrieval per conversation scope. Scope state
//! lives in a bounded LRU cache of `Arc<Mutex<ScopeState>>`; the durable
//! blob store is the source of truth and every mutation is persisted
//! before the scope lock is released, so evicting a cached scope never
//! loses data.
//!
//! A scope with no persisted state is simply empty. A corrupt snapshot
//! also degrades to empty — logged as a warning, distinct from the
//! absent case — so retrieval stays available after partial storage
//! corruption.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::chunk_pages;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::extract::TextExtractor;
use crate::index::VectorIndex;
use crate::models::{Citation, DocumentMetadata, IngestSummary, RetrievalResult};
use crate::store::BlobStore;

/// Blob key for a scope's vector index snapshot.
const INDEX_KEY: &str = "index.json";
/// Blob key for a scope's document metadata record.
const META_KEY: &str = "metadata.json";

struct ScopeState {
    index: VectorIndex,
    metadata: DocumentMetadata,
}

/// Per-conversation document ingestion and similarity retrieval.
///
/// One instance per process, constructed at startup with its
/// collaborators injected. Operations on the same scope are serialized
/// by a per-scope lock; distinct scopes run concurrently.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn TextExtractor>,
    store: Arc<dyn BlobStore>,
    chunking: ChunkingConfig,
    scopes: Mutex<LruCache<String, Arc<Mutex<ScopeState>>>>,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn TextExtractor>,
        store: Arc<dyn BlobStore>,
        chunking: ChunkingConfig,
        cached_scopes: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cached_scopes.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedder,
            extractor,
            store,
            chunking,
            scopes: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Ingest a document into a scope: extract per-page text, chunk,
    /// embed the whole batch, append to the scope's index, and persist
    /// index and metadata. Embedding completes fully before the index is
    /// touched, so a failed batch never leaves a partial update behind.
    pub async fn ingest(&self, bytes: &[u8], scope: &str, filename: &str) -> Result<IngestSummary> {
        if bytes.is_empty() {
            return Err(Error::precondition("no content received for ingestion"));
        }

        let pages = self.extractor.extract_pages(bytes)?;
        let chunks = chunk_pages(&pages, filename, &self.chunking);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let state = self.scope_state(scope).await?;
        let mut state = state.lock().await;

        state.index.add(chunks, vectors)?;
        self.store
            .write(scope, INDEX_KEY, &state.index.to_bytes()?)
            .await?;

        state
            .metadata
            .record_ingest(filename, pages.len(), texts.len(), Utc::now());
        let meta_bytes = serde_json::to_vec_pretty(&state.metadata)
            .map_err(|e| Error::Storage(e.to_string()))?;
        self.store.write(scope, META_KEY, &meta_bytes).await?;

        info!(
            scope,
            filename,
            pages = pages.len(),
            chunks = texts.len(),
            total_chunks = state.metadata.total_chunks,
            "ingested document"
        );

        Ok(IngestSummary {
            filename: filename.to_string(),
            documents: pages.len(),
            chunks: texts.len(),
            pages: pages.len(),
            total_chunks: state.metadata.total_chunks,
            files: state.metadata.files.keys().cloned().collect(),
        })
    }

    /// Retrieve the `k` passages nearest to `query` from a scope, with
    /// 1-based citations. A scope with no ingested content returns the
    /// empty result.
    pub async fn retrieve(&self, query: &str, scope: &str, k: usize) -> Result<RetrievalResult> {
        let state = self.scope_state(scope).await?;
        let state = state.lock().await;
        if state.index.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query_vector = self.embedder.embed(query).await?;
        let hits = state.index.search(&query_vector, k);

        let mut passages = Vec::with_capacity(hits.len());
        let mut citations = Vec::with_capacity(hits.len());
        let mut files: Vec<String> = Vec::new();
        for (rank, (chunk, _score)) in hits.iter().enumerate() {
            passages.push(chunk.text.clone());
            citations.push(Citation {
                id: rank + 1,
                source_file: chunk.source_file.clone(),
                page: chunk.page,
                chunk_index: chunk.sequence_index,
            });
            if !files.contains(&chunk.source_file) {
                files.push(chunk.source_file.clone());
            }
        }

        debug!(scope, k, hits = passages.len(), "retrieved context");
        Ok(RetrievalResult {
            passages,
            citations,
            files,
        })
    }

    /// Document metadata for a scope; empty when nothing was ingested.
    pub async fn document_metadata(&self, scope: &str) -> Result<DocumentMetadata> {
        let state = self.scope_state(scope).await?;
        let state = state.lock().await;
        Ok(state.metadata.clone())
    }

    /// Fetch the scope's cached state, hydrating from the blob store on
    /// first access. Hydration runs under the cache lock so each scope
    /// loads at most once.
    async fn scope_state(&self, scope: &str) -> Result<Arc<Mutex<ScopeState>>> {
        let mut cache = self.scopes.lock().await;
        if let Some(state) = cache.get(scope) {
            return Ok(state.clone());
        }

        let index = match self.store.read(scope, INDEX_KEY).await {
            Ok(None) => {
                debug!(scope, "no persisted index, starting empty");
                VectorIndex::new()
            }
            Ok(Some(bytes)) => match VectorIndex::from_bytes(&bytes) {
                Ok(index) => {
                    debug!(scope, chunks = index.len(), "hydrated index snapshot");
                    index
                }
                Err(e) => {
                    warn!(scope, error = %e, "corrupt index snapshot, treating as empty");
                    VectorIndex::new()
                }
            },
            Err(e) => {
                warn!(scope, error = %e, "unreadable index snapshot, treating as empty");
                VectorIndex::new()
            }
        };

        let metadata = match self.store.read(scope, META_KEY).await {
            Ok(None) => DocumentMetadata::default(),
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(scope, error = %e, "corrupt metadata record, treating as empty");
                    DocumentMetadata::default()
                }
            },
            Err(e) => {
                warn!(scope, error = %e, "unreadable metadata record, treating as empty");
                DocumentMetadata::default()
            }
        };

        let state = Arc::new(Mutex::new(ScopeState { index, metadata }));
        if let Some((evicted, _)) = cache.push(scope.to_string(), state.clone()) {
            if evicted != scope {
                debug!(scope = %evicted, "evicted scope state from cache");
            }
        }
        Ok(state)
    }
}
