use crate::config::{BuildOptions, ErrorPolicy};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::store::PostingStore;
use crate::{DimId, DocId, SparseVector};
use std::borrow::Borrow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of input vectors the builder has consumed, skipped ones included.
///
/// Cloned handles observe the same counter, so a display thread can poll it
/// while the build runs.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicUsize>);

impl Progress {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumes sparse vectors, assigns sequential document ids and fills the
/// posting store. `finish` seals the store and hands out the `Index`.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    store: PostingStore,
    options: BuildOptions,
    next_doc: DocId,
    skipped: usize,
    progress: Progress,
    scratch: Vec<DimId>,
}

impl IndexBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options, ..Self::default() }
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Documents indexed so far.
    pub fn num_docs(&self) -> usize {
        self.next_doc as usize
    }

    /// Indexes one document and returns its id, or `None` when the policy
    /// skipped it.
    ///
    /// The vector is validated in full before any entry is appended, so a
    /// rejected document leaves no trace in the store. Non-finite weights
    /// are an error under either policy.
    pub fn add(&mut self, vector: &SparseVector) -> Result<Option<DocId>> {
        let doc_id = self.next_doc;
        if let Err(err) = self.validate(doc_id, vector) {
            self.progress.inc();
            return match (err, self.options.on_error) {
                (err @ Error::DuplicateDimension { .. }, ErrorPolicy::Skip) => {
                    tracing::warn!(input = self.progress.get() - 1, error = %err, "skipping document");
                    self.skipped += 1;
                    Ok(None)
                }
                (err, _) => Err(err),
            };
        }

        for (dim, weight) in vector.iter() {
            self.store.append(dim, doc_id, weight)?;
        }
        self.next_doc += 1;
        self.progress.inc();
        Ok(Some(doc_id))
    }

    pub fn extend<I>(&mut self, vectors: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Borrow<SparseVector>,
    {
        for vector in vectors {
            self.add(vector.borrow())?;
        }
        Ok(())
    }

    /// Seals the posting store and publishes the index.
    pub fn finish(mut self) -> Result<Index> {
        self.seal()
    }

    /// Like `finish` but through `&mut self`: on error the builder keeps its
    /// documents; on success its store is left empty.
    pub(crate) fn seal(&mut self) -> Result<Index> {
        self.store.finalize()?;
        let index = Index::new(std::mem::take(&mut self.store), self.next_doc);
        let stats = index.stats();
        tracing::info!(
            num_docs = stats.num_docs,
            num_dims = stats.num_dims,
            num_postings = stats.num_postings,
            skipped = self.skipped,
            "index build complete"
        );
        Ok(index)
    }

    #[cfg(test)]
    pub(crate) fn finalize_store(&mut self) -> Result<()> {
        self.store.finalize()
    }

    fn validate(&mut self, doc_id: DocId, vector: &SparseVector) -> Result<()> {
        self.scratch.clear();
        for (dim, weight) in vector.iter() {
            if !weight.is_finite() {
                return Err(Error::InvalidWeight { dim, weight });
            }
            self.scratch.push(dim);
        }
        self.scratch.sort_unstable();
        if let Some(w) = self.scratch.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DuplicateDimension { doc: doc_id, dim: w[0] });
        }
        Ok(())
    }
}

/// Bulk construction: indexes every vector in order and finalizes.
pub fn build<I>(vectors: I, options: &BuildOptions) -> Result<Index>
where
    I: IntoIterator,
    I::Item: Borrow<SparseVector>,
{
    let mut builder = IndexBuilder::new(options.clone());
    builder.extend(vectors)?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(on_error: ErrorPolicy) -> BuildOptions {
        BuildOptions { on_error }
    }

    #[test]
    fn assigns_sequential_ids() {
        let mut b = IndexBuilder::new(BuildOptions::default());
        let v = SparseVector::new(vec![(1, 1.0)]);
        assert_eq!(b.add(&v).unwrap(), Some(0));
        assert_eq!(b.add(&v).unwrap(), Some(1));
        assert_eq!(b.num_docs(), 2);
        assert_eq!(b.progress().get(), 2);
    }

    #[test]
    fn skip_policy_does_not_consume_an_id() {
        let mut b = IndexBuilder::new(opts(ErrorPolicy::Skip));
        let bad = SparseVector::new(vec![(3, 1.0), (2, 1.0), (3, 0.5)]);
        let good = SparseVector::new(vec![(3, 1.0)]);
        assert_eq!(b.add(&bad).unwrap(), None);
        assert_eq!(b.add(&good).unwrap(), Some(0));
        assert_eq!(b.skipped, 1);
        assert_eq!(b.progress().get(), 2);

        let index = b.finish().unwrap();
        assert_eq!(index.num_docs(), 1);
        assert_eq!(index.posting_list(2).len(), 0);
    }

    #[test]
    fn rejected_document_leaves_store_untouched() {
        let mut b = IndexBuilder::new(opts(ErrorPolicy::Abort));
        let bad = SparseVector::new(vec![(1, 1.0), (2, f32::NAN)]);
        assert!(matches!(b.add(&bad), Err(Error::InvalidWeight { dim: 2, .. })));
        assert_eq!(b.num_docs(), 0);
        let index = b.finish().unwrap();
        assert_eq!(index.stats().num_postings, 0);
    }

    #[test]
    fn failed_seal_keeps_documents() {
        let mut b = IndexBuilder::new(BuildOptions::default());
        b.add(&SparseVector::new(vec![(1, 1.0), (2, 2.0)])).unwrap();
        b.finalize_store().unwrap();
        assert!(matches!(b.seal(), Err(Error::AlreadyFinalized)));
        assert_eq!(b.num_docs(), 1);
        assert_eq!(b.store.num_postings(), 2);
    }

    #[test]
    fn invalid_weight_is_fatal_under_skip() {
        let vectors = vec![SparseVector::new(vec![(1, f32::INFINITY)])];
        let err = build(&vectors, &opts(ErrorPolicy::Skip)).unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { .. }));
    }
}
