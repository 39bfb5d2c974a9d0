//! Budgeted coordinate-at-a-time scoring.
//!
//! Each query dimension's posting list is walked in its stored descending
//! weight order, but only the first `ceil(b * len)` entries are visited. With
//! `b = 1.0` the scan is exhaustive and scores are exact inner products.

use crate::accumulator::Accumulator;
use crate::config::SearchParams;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::{DimId, DocId, SearchResult, SparseVector};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Fraction of each posting list to scan, validated to lie in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Budget(f64);

impl Budget {
    pub const EXHAUSTIVE: Budget = Budget(1.0);

    pub fn new(fraction: f64) -> Result<Self> {
        if fraction > 0.0 && fraction <= 1.0 {
            Ok(Budget(fraction))
        } else {
            Err(Error::InvalidBudget(fraction))
        }
    }

    pub fn fraction(self) -> f64 {
        self.0
    }

    /// Number of leading entries to visit in a list of `len`.
    ///
    /// The product is nudged down by a few ulps so that decimal budgets such
    /// as 0.3 don't round up past the intended entry count.
    pub fn cutoff(self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let x = self.0 * len as f64;
        let n = (x - x * 4.0 * f64::EPSILON).ceil() as usize;
        n.clamp(1, len)
    }
}

impl Index {
    /// Top-k documents for a single query, best first, with their scores.
    pub fn retrieve(&self, query: &SparseVector, params: &SearchParams) -> Result<Vec<SearchResult>> {
        let budget = Budget::new(params.budget)?;
        let time_budget = params.time_budget()?;
        Ok(score_query(self, query, params.k, budget, time_budget))
    }
}

/// Scores one query against `index`.
///
/// With a time budget the dimensions are taken in descending |weight| order
/// and scoring stops once the budget is spent; top-k extraction is not
/// counted against it.
pub(crate) fn score_query(
    index: &Index,
    query: &SparseVector,
    k: usize,
    budget: Budget,
    time_budget: Option<Duration>,
) -> Vec<SearchResult> {
    if k == 0 || query.is_empty() || index.num_docs() == 0 {
        return Vec::new();
    }

    let mut acc = Accumulator::new(index.num_docs());
    match time_budget {
        None => {
            for (dim, query_weight) in query.iter() {
                accumulate(index, dim, query_weight, budget, &mut acc);
            }
        }
        Some(limit) => {
            let mut dims: Vec<(DimId, f32)> = query.entries().to_vec();
            dims.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
            let start = Instant::now();
            for (dim, query_weight) in dims {
                accumulate(index, dim, query_weight, budget, &mut acc);
                if start.elapsed() >= limit {
                    break;
                }
            }
        }
    }
    acc.top_k(k)
}

#[inline]
fn accumulate(index: &Index, dim: DimId, query_weight: f32, budget: Budget, acc: &mut Accumulator) {
    let list = index.posting_list(dim);
    for posting in &list[..budget.cutoff(list.len())] {
        acc.add(posting.doc_id, query_weight * posting.weight);
    }
}

/// Runs every query in parallel and returns one ranked id list per query, in
/// input order.
///
/// The budget is checked before any scoring starts. `k == 0` yields empty
/// lists.
pub fn search(index: &Index, queries: &[SparseVector], k: usize, budget: f64) -> Result<Vec<Vec<DocId>>> {
    let params = SearchParams::new(k, budget);
    let ranked = search_with_params(index, queries, &params)?;
    Ok(ranked
        .into_iter()
        .map(|results| results.into_iter().map(|r| r.doc_id).collect())
        .collect())
}

/// Like [`search`] but keeps the scores and honours the optional time budget.
pub fn search_with_params(
    index: &Index,
    queries: &[SparseVector],
    params: &SearchParams,
) -> Result<Vec<Vec<SearchResult>>> {
    let budget = Budget::new(params.budget)?;
    let time_budget = params.time_budget()?;
    let start = Instant::now();
    let results: Vec<Vec<SearchResult>> = queries
        .par_iter()
        .map(|query| score_query(index, query, params.k, budget, time_budget))
        .collect();
    tracing::debug!(
        queries = queries.len(),
        k = params.k,
        budget = budget.fraction(),
        took_s = start.elapsed().as_secs_f64(),
        "batch search complete"
    );
    Ok(results)
}
