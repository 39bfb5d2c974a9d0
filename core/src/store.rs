use crate::error::{Error, Result};
use crate::{DimId, DocId, Posting};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Per-dimension posting lists.
///
/// Lists live in one flat arena indexed by a dense slot; `slots` maps a
/// dimension id to its slot and only ever grows. While building, entries are
/// kept in insertion order. `finalize` reorders every list by weight
/// descending (ties by ascending doc id) and seals the store.
#[derive(Debug, Default)]
pub struct PostingStore {
    slots: FxHashMap<DimId, u32>,
    lists: Vec<Vec<Posting>>,
    num_postings: usize,
    finalized: bool,
}

impl PostingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry to the list of `dim`.
    ///
    /// Documents must arrive in increasing id order, which is what the
    /// builder does. A repeat of the list's last document is a duplicate
    /// dimension; a lower id is out of order. Nothing is written when an
    /// error is returned.
    pub fn append(&mut self, dim: DimId, doc_id: DocId, weight: f32) -> Result<()> {
        if self.finalized {
            return Err(Error::StoreSealed);
        }
        if !weight.is_finite() {
            return Err(Error::InvalidWeight { dim, weight });
        }

        let slot = match self.slots.get(&dim) {
            Some(&slot) => slot as usize,
            None => {
                let slot = self.lists.len();
                self.slots.insert(dim, slot as u32);
                self.lists.push(Vec::new());
                slot
            }
        };
        let list = &mut self.lists[slot];
        if let Some(last) = list.last() {
            if doc_id == last.doc_id {
                return Err(Error::DuplicateDimension { doc: doc_id, dim });
            }
            if doc_id < last.doc_id {
                return Err(Error::OutOfOrder { dim, doc: doc_id, last: last.doc_id });
            }
        }
        list.push(Posting { doc_id, weight });
        self.num_postings += 1;
        Ok(())
    }

    /// Sorts every list into value order and seals the store.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        self.lists.par_iter_mut().for_each(|list| {
            list.sort_by(|a, b| {
                b.weight
                    .total_cmp(&a.weight)
                    .then_with(|| a.doc_id.cmp(&b.doc_id))
            });
            list.shrink_to_fit();
        });
        self.finalized = true;
        tracing::debug!(dims = self.lists.len(), postings = self.num_postings, "posting store finalized");
        Ok(())
    }

    /// Entries for `dim`; empty for a dimension never seen.
    pub fn posting_list(&self, dim: DimId) -> &[Posting] {
        match self.slots.get(&dim) {
            Some(&slot) => &self.lists[slot as usize],
            None => &[],
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Vocabulary size.
    pub fn num_dims(&self) -> usize {
        self.lists.len()
    }

    pub fn num_postings(&self) -> usize {
        self.num_postings
    }
}
