use crate::topk::TopK;
use crate::{DocId, SearchResult};

/// Per-query map from candidate document to its running score.
///
/// Backed by a dense score array the size of the corpus plus the list of ids
/// that received at least one contribution, so extraction only walks actual
/// candidates. A document stays a candidate even if its sum comes back to 0.
/// Each query owns its accumulator; it is never shared.
#[derive(Debug)]
pub struct Accumulator {
    scores: Vec<f32>,
    seen: Vec<bool>,
    candidates: Vec<DocId>,
}

impl Accumulator {
    pub fn new(num_docs: usize) -> Self {
        Self {
            scores: vec![0.0; num_docs],
            seen: vec![false; num_docs],
            candidates: Vec::new(),
        }
    }

    /// Adds `contribution` to the score of `doc_id`, starting from 0.
    #[inline]
    pub fn add(&mut self, doc_id: DocId, contribution: f32) {
        let slot = doc_id as usize;
        if !self.seen[slot] {
            self.seen[slot] = true;
            self.candidates.push(doc_id);
        }
        self.scores[slot] += contribution;
    }

    /// The `k` best candidates, best first.
    pub fn top_k(self, k: usize) -> Vec<SearchResult> {
        let mut top = TopK::new(k);
        for &doc_id in &self.candidates {
            top.push(SearchResult { doc_id, score: self.scores[doc_id as usize] });
        }
        top.into_sorted_vec()
    }
}
