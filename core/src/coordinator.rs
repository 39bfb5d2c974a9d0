//! Write-then-read lifecycle shared between one builder and many searchers.
//!
//! The coordinator is either `Building`, where inserts go through an
//! exclusive lock and no read handle is handed out, or `Finalized`, where the
//! index sits behind an `Arc` and any number of queries share it without
//! further locking. The transition happens once and cannot be undone.

use crate::builder::{IndexBuilder, Progress};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::search::{search, search_with_params};
use crate::{DocId, SearchParams, SearchResult, SparseVector};
use parking_lot::RwLock;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::borrow::Borrow;
use std::sync::Arc;

enum Phase {
    Building(IndexBuilder),
    Finalized(Arc<Index>),
}

pub struct Coordinator {
    phase: RwLock<Phase>,
    progress: Progress,
    pool: Option<ThreadPool>,
}

impl Coordinator {
    /// Starts an empty index in the building phase.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let builder = IndexBuilder::new(config.build.clone());
        let progress = builder.progress();
        Ok(Self {
            phase: RwLock::new(Phase::Building(builder)),
            progress,
            pool: make_pool(config.threads)?,
        })
    }

    /// Wraps an index that was already built, e.g. by [`crate::build`].
    pub fn from_index(index: Index, threads: Option<usize>) -> Result<Self> {
        Ok(Self {
            phase: RwLock::new(Phase::Finalized(Arc::new(index))),
            progress: Progress::default(),
            pool: make_pool(threads)?,
        })
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Indexes one document. Fails with `StoreSealed` once finalized.
    pub fn insert(&self, vector: &SparseVector) -> Result<Option<DocId>> {
        match &mut *self.phase.write() {
            Phase::Building(builder) => builder.add(vector),
            Phase::Finalized(_) => Err(Error::StoreSealed),
        }
    }

    /// Indexes a batch under a single acquisition of the write lock and
    /// returns how many documents were added.
    pub fn insert_batch<I>(&self, vectors: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Borrow<SparseVector>,
    {
        match &mut *self.phase.write() {
            Phase::Building(builder) => {
                let before = builder.num_docs();
                builder.extend(vectors)?;
                Ok(builder.num_docs() - before)
            }
            Phase::Finalized(_) => Err(Error::StoreSealed),
        }
    }

    /// Seals the index and switches to the read phase.
    pub fn finalize(&self) -> Result<Arc<Index>> {
        let mut phase = self.phase.write();
        let index = match &mut *phase {
            // Phase only changes once sealing succeeded.
            Phase::Building(builder) => Arc::new(builder.seal()?),
            Phase::Finalized(_) => return Err(Error::AlreadyFinalized),
        };
        *phase = Phase::Finalized(Arc::clone(&index));
        Ok(index)
    }

    /// A shared handle on the finalized index. Withheld while building.
    pub fn reader(&self) -> Result<Arc<Index>> {
        match &*self.phase.read() {
            Phase::Finalized(index) => Ok(Arc::clone(index)),
            Phase::Building(_) => Err(Error::NotFinalized),
        }
    }

    /// Batched search on the coordinator's worker pool.
    pub fn search(&self, queries: &[SparseVector], k: usize, budget: f64) -> Result<Vec<Vec<DocId>>> {
        let index = self.reader()?;
        self.install(|| search(&index, queries, k, budget))
    }

    pub fn search_with_params(&self, queries: &[SparseVector], params: &SearchParams) -> Result<Vec<Vec<SearchResult>>> {
        let index = self.reader()?;
        self.install(|| search_with_params(&index, queries, params))
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

fn make_pool(threads: Option<usize>) -> Result<Option<ThreadPool>> {
    match threads {
        Some(n) => {
            let pool = ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("linscan-query-{i}"))
                .build()?;
            Ok(Some(pool))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(u32, f32)]) -> SparseVector {
        SparseVector::new(pairs.to_vec())
    }

    #[test]
    fn reads_are_withheld_until_finalized() {
        let coord = Coordinator::new(&EngineConfig::default()).unwrap();
        coord.insert(&doc(&[(1, 1.0)])).unwrap();
        assert!(matches!(coord.reader(), Err(Error::NotFinalized)));
        assert!(matches!(coord.search(&[doc(&[(1, 1.0)])], 1, 1.0), Err(Error::NotFinalized)));

        coord.finalize().unwrap();
        assert_eq!(coord.reader().unwrap().num_docs(), 1);
    }

    #[test]
    fn writes_are_refused_after_finalize() {
        let coord = Coordinator::new(&EngineConfig::default()).unwrap();
        coord.finalize().unwrap();
        assert!(matches!(coord.insert(&doc(&[(1, 1.0)])), Err(Error::StoreSealed)));
        assert!(matches!(coord.insert_batch(vec![doc(&[(1, 1.0)])]), Err(Error::StoreSealed)));
        assert!(matches!(coord.finalize(), Err(Error::AlreadyFinalized)));
    }

    #[test]
    fn failed_finalize_stays_in_building_phase() {
        let coord = Coordinator::new(&EngineConfig::default()).unwrap();
        coord.insert(&doc(&[(1, 1.0)])).unwrap();
        if let Phase::Building(builder) = &mut *coord.phase.write() {
            builder.finalize_store().unwrap();
        }
        assert!(matches!(coord.finalize(), Err(Error::AlreadyFinalized)));
        assert!(matches!(coord.reader(), Err(Error::NotFinalized)));
        match &*coord.phase.read() {
            Phase::Building(builder) => assert_eq!(builder.num_docs(), 1),
            Phase::Finalized(_) => panic!("phase changed after a failed finalize"),
        };
    }

    #[test]
    fn batch_insert_counts_and_progress() {
        let coord = Coordinator::new(&EngineConfig::default()).unwrap();
        let progress = coord.progress();
        let added = coord.insert_batch(vec![doc(&[(1, 1.0)]), doc(&[(2, 1.0)])]).unwrap();
        assert_eq!(added, 2);
        assert_eq!(progress.get(), 2);
    }

    #[test]
    fn searches_on_a_dedicated_pool() {
        let config = EngineConfig { threads: Some(2), ..EngineConfig::default() };
        let coord = Coordinator::new(&config).unwrap();
        coord.insert_batch(vec![doc(&[(1, 1.0)]), doc(&[(1, 2.0)])]).unwrap();
        coord.finalize().unwrap();
        let out = coord.search(&[doc(&[(1, 1.0)]), doc(&[])], 5, 1.0).unwrap();
        assert_eq!(out, vec![vec![1, 0], vec![]]);
    }
}
