use anyhow::{Context, Result};
use linscan::csr::read_sparse_matrix;
use linscan::{BuildOptions, Coordinator, DocId, EngineConfig, ErrorPolicy, Index, IndexBuilder, IndexStats, SparseVector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub created_at: String,
    pub stats: IndexStats,
    pub num_queries: usize,
    pub k: usize,
    pub budget: f64,
    pub build_s: f64,
    pub search_s: f64,
    pub qps: f64,
    /// Mean recall against an exhaustive scan, when requested.
    pub recall: Option<f64>,
    pub results: Option<Vec<Vec<DocId>>>,
}

pub struct RunOptions {
    pub input: PathBuf,
    pub queries: PathBuf,
    pub config: EngineConfig,
    pub recall: bool,
    pub keep_results: bool,
}

pub fn load_vectors(path: &Path) -> Result<Vec<SparseVector>> {
    let matrix = read_sparse_matrix(path).with_context(|| format!("reading {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = matrix.nrows(), cols = matrix.ncols(), nnz = matrix.nnz(), "loaded sparse matrix");
    Ok(matrix.into_vectors()?)
}

/// Builds the index while a side thread logs the builder's progress counter.
pub fn build_index(vectors: &[SparseVector], options: &BuildOptions) -> Result<Index> {
    let mut builder = IndexBuilder::new(options.clone());
    let progress = builder.progress();
    let total = vectors.len();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let reporter = thread::spawn(move || {
        while let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(PROGRESS_INTERVAL) {
            tracing::info!(inserted = progress.get(), total, "building index");
        }
    });

    let built = builder.extend(vectors).and_then(|_| builder.finish());
    drop(done_tx);
    join_reporter(reporter);
    Ok(built?)
}

/// Waits for the progress thread. A panic there is logged, not propagated;
/// returns whether the thread exited cleanly.
fn join_reporter(handle: thread::JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            tracing::warn!(error = %msg, "progress reporter panicked");
            false
        }
    }
}

/// Mean fraction of each exact list found in the matching approximate list.
/// Queries with an empty exact list are left out.
pub fn recall(approx: &[Vec<DocId>], exact: &[Vec<DocId>]) -> f64 {
    let mut total = 0.0;
    let mut counted = 0usize;
    for (a, e) in approx.iter().zip(exact) {
        if e.is_empty() {
            continue;
        }
        let truth: HashSet<DocId> = e.iter().copied().collect();
        let hits = a.iter().filter(|id| truth.contains(id)).count();
        total += hits as f64 / e.len() as f64;
        counted += 1;
    }
    if counted == 0 { 1.0 } else { total / counted as f64 }
}

pub fn run_search(opts: &RunOptions) -> Result<Report> {
    let docs = load_vectors(&opts.input)?;
    let queries = load_vectors(&opts.queries)?;

    let start = Instant::now();
    let index = build_index(&docs, &opts.config.build)?;
    let build_s = start.elapsed().as_secs_f64();
    drop(docs);
    println!("{index}");

    let stats = index.stats();
    let coord = Coordinator::from_index(index, opts.config.threads)?;
    let params = &opts.config.search;

    let start = Instant::now();
    let ranked = coord.search_with_params(&queries, params)?;
    let search_s = start.elapsed().as_secs_f64();
    let ids: Vec<Vec<DocId>> = ranked
        .into_iter()
        .map(|results| results.into_iter().map(|r| r.doc_id).collect())
        .collect();
    let qps = if search_s > 0.0 { queries.len() as f64 / search_s } else { 0.0 };
    tracing::info!(queries = queries.len(), search_s, qps, "queries complete");

    let recall = if opts.recall {
        let exact = coord.search(&queries, params.k, 1.0)?;
        let r = recall(&ids, &exact);
        tracing::info!(recall = r, "recall against exhaustive scan");
        Some(r)
    } else {
        None
    };

    Ok(Report {
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        stats,
        num_queries: queries.len(),
        k: params.k,
        budget: params.budget,
        build_s,
        search_s,
        qps,
        recall,
        results: opts.keep_results.then_some(ids),
    })
}

pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    let mut f = File::create(path)?;
    let json = serde_json::to_string_pretty(report)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

/// Overlays CLI flags onto a config file, or onto defaults without one.
pub fn merge_config(
    file: Option<&Path>,
    k: Option<usize>,
    budget: Option<f64>,
    time_budget_ms: Option<f64>,
    threads: Option<usize>,
    skip_errors: bool,
) -> Result<EngineConfig> {
    let mut config = match file {
        Some(path) => EngineConfig::from_json_file(path).with_context(|| format!("reading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(k) = k {
        config.search.k = k;
    }
    if let Some(b) = budget {
        config.search.budget = b;
    }
    if time_budget_ms.is_some() {
        config.search.time_budget_ms = time_budget_ms;
    }
    if threads.is_some() {
        config.threads = threads;
    }
    if skip_errors {
        config.build.on_error = ErrorPolicy::Skip;
    }
    config.search.time_budget()?;
    Ok(config)
}
