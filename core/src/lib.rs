use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

pub mod accumulator;
pub mod builder;
pub mod config;
pub mod coordinator;
pub mod csr;
pub mod error;
pub mod index;
pub mod search;
pub mod store;
pub mod topk;

pub use builder::{build, IndexBuilder, Progress};
pub use config::{BuildOptions, EngineConfig, ErrorPolicy, SearchParams};
pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use index::{Index, IndexStats};
pub use search::{search, search_with_params, Budget};

pub type DimId = u32;
pub type DocId = u32;

/// One entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32,
}

/// A sparse vector given as its nonzero (dimension, weight) pairs.
///
/// Pairs are kept in the order they were supplied. Scores accumulate in that
/// order, so two vectors with the same pairs in a different order may score
/// with different rounding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(DimId, f32)>,
}

impl SparseVector {
    pub fn new(entries: Vec<(DimId, f32)>) -> Self {
        Self { entries }
    }

    /// Builds a vector from a map, ordering the pairs by dimension so the
    /// result does not depend on hash iteration order.
    pub fn from_map(map: &HashMap<DimId, f32>) -> Self {
        let mut entries: Vec<(DimId, f32)> = map.iter().map(|(&d, &w)| (d, w)).collect();
        entries.sort_unstable_by_key(|&(d, _)| d);
        Self { entries }
    }

    pub fn entries(&self) -> &[(DimId, f32)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (DimId, f32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(DimId, f32)> for SparseVector {
    fn from_iter<I: IntoIterator<Item = (DimId, f32)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// Outcome of the inner product computation for a single document.
///
/// Ordered so that the *better* result is the greater one: higher score
/// first, and on equal scores the lower document id wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: f32,
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> Ordering {
        // partial_cmp keeps 0.0 == -0.0 a tie; total_cmp only orders NaNs.
        self.score
            .partial_cmp(&other.score)
            .unwrap_or_else(|| self.score.total_cmp(&other.score))
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_score_is_greater() {
        let a = SearchResult { doc_id: 5, score: 2.0 };
        let b = SearchResult { doc_id: 1, score: 1.0 };
        assert!(a > b);
    }

    #[test]
    fn equal_scores_prefer_lower_doc_id() {
        let a = SearchResult { doc_id: 0, score: 3.0 };
        let b = SearchResult { doc_id: 2, score: 3.0 };
        assert!(a > b);
        let z = SearchResult { doc_id: 0, score: -0.0 };
        let w = SearchResult { doc_id: 1, score: 0.0 };
        assert!(z > w);
    }

    #[test]
    fn from_map_orders_by_dimension() {
        let map = HashMap::from([(9u32, 1.0f32), (2, 0.5), (5, 0.25)]);
        let v = SparseVector::from_map(&map);
        let dims: Vec<DimId> = v.iter().map(|(d, _)| d).collect();
        assert_eq!(dims, vec![2, 5, 9]);
    }
}
