use crate::store::PostingStore;
use crate::{DimId, DocId, Posting};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reporting-only statistics; nothing in the query path reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_dims: usize,
    pub num_postings: usize,
    /// Average nonzero count per document.
    pub avg_nnz: f32,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Linscan statistics:")?;
        writeln!(f, "# documents: {}", self.num_docs)?;
        writeln!(f, "# dimensions in inverted index: {}", self.num_dims)?;
        writeln!(f, "# postings: {}", self.num_postings)?;
        write!(f, "Avg. nnz per vector: {}", self.avg_nnz)
    }
}

/// A finalized, read-only inverted index.
///
/// Only the builder can produce one, and it does so after sealing the posting
/// store, so any `&Index` (or `Arc<Index>`) may be queried from many threads
/// at once.
#[derive(Debug)]
pub struct Index {
    store: PostingStore,
    num_docs: DocId,
}

impl Index {
    pub(crate) fn new(store: PostingStore, num_docs: DocId) -> Self {
        debug_assert!(store.is_finalized());
        Self { store, num_docs }
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs as usize
    }

    /// Entries for `dim` in descending weight order; empty when unknown.
    pub fn posting_list(&self, dim: DimId) -> &[Posting] {
        self.store.posting_list(dim)
    }

    pub fn stats(&self) -> IndexStats {
        let num_postings = self.store.num_postings();
        let avg_nnz = if self.num_docs == 0 { 0.0 } else { num_postings as f32 / self.num_docs as f32 };
        IndexStats {
            num_docs: self.num_docs(),
            num_dims: self.store.num_dims(),
            num_postings,
            avg_nnz,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.stats(), f)
    }
}
