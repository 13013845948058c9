//! Per-scope in-memory vector index.
//!
//! Stores (chunk, vector) pairs for one conversation scope and answers
//! brute-force cosine nearest-neighbor queries. The index is append-only:
//! individual chunks are never updated or deleted. Snapshots serialize to
//! JSON for the blob store; a missing snapshot loads as an empty index.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Chunk;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    dims: Option<usize>,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Dimensionality of the stored vectors, once any content exists.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Append chunks and their vectors. Counts must match, and every
    /// vector must share the index's dimensionality; violations are
    /// precondition errors and leave the index untouched.
    pub fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::precondition(format!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(first) = vectors.first() {
            let dims = self.dims.unwrap_or(first.len());
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(Error::precondition(format!(
                    "embedding dimension mismatch: index has {}, got {}",
                    dims,
                    bad.len()
                )));
            }
            self.dims = Some(dims);
        }
        self.chunks.extend(chunks);
        self.vectors.extend(vectors);
        Ok(())
    }

    /// Return up to `k` chunks nearest to `query` by cosine similarity,
    /// nearest first. Ties keep insertion order (stable sort). `k` larger
    /// than the index returns everything.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(&Chunk, f32)> {
        let mut scored: Vec<(&Chunk, f32)> = self
            .chunks
            .iter()
            .zip(self.vectors.iter())
            .map(|(chunk, vector)| (chunk, cosine_similarity(query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Serialize the full index for the blob store.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Storage(e.to_string()))
    }

    /// Deserialize a snapshot previously produced by [`to_bytes`].
    ///
    /// Corrupt input is an error here; the caller decides whether to
    /// degrade to an empty index.
    ///
    /// [`to_bytes`]: VectorIndex::to_bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Storage(e.to_string()))
    }
}

/// Cosine similarity in `[-1, 1]`; zero for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, idx: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_file: "test.pdf".to_string(),
            sequence_index: idx,
            page: Some(1),
        }
    }

    #[test]
    fn add_rejects_count_mismatch() {
        let mut index = VectorIndex::new();
        let err = index
            .add(vec![chunk("a", 0)], vec![vec![1.0], vec![2.0]])
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(index.is_empty());
    }

    #[test]
    fn add_rejects_dimension_mismatch() {
        let mut index = VectorIndex::new();
        index.add(vec![chunk("a", 0)], vec![vec![1.0, 0.0]]).unwrap();
        let err = index.add(vec![chunk("b", 1)], vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.dims(), Some(2));
    }

    #[test]
    fn search_orders_nearest_first_and_caps_at_len() {
        let mut index = VectorIndex::new();
        index
            .add(
                vec![chunk("x-axis", 0), chunk("y-axis", 1), chunk("diagonal", 2)],
                vec![
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![0.7, 0.7],
                ],
            )
            .unwrap();

        let hits = index.search(&[1.0, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.text, "x-axis");
        assert!(hits[0].1 >= hits[1].1);

        let all = index.search(&[1.0, 0.0], 10);
        assert_eq!(all.len(), 3, "k larger than index returns everything");
    }

    #[test]
    fn search_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index
            .add(
                vec![chunk("first", 0), chunk("second", 1)],
                vec![vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].0.text, "first");
        assert_eq!(hits[1].0.text, "second");
    }

    #[test]
    fn snapshot_roundtrip_preserves_search() {
        let mut index = VectorIndex::new();
        index
            .add(
                vec![chunk("a", 0), chunk("b", 1)],
                vec![vec![0.9, 0.1], vec![0.1, 0.9]],
            )
            .unwrap();
        let restored = VectorIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.dims(), Some(2));

        let before: Vec<String> = index
            .search(&[1.0, 0.0], 2)
            .into_iter()
            .map(|(c, _)| c.text.clone())
            .collect();
        let after: Vec<String> = restored
            .search(&[1.0, 0.0], 2)
            .into_iter()
            .map(|(c, _)| c.text.clone())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn corrupt_snapshot_is_storage_error() {
        assert!(matches!(
            VectorIndex::from_bytes(b"{not json"),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
