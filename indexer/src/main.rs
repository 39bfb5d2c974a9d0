use anyhow::Result;
use clap::{Parser, Subcommand};
use linscan::{BuildOptions, ErrorPolicy};
use linscan_indexer::{build_index, load_vectors, merge_config, run_search, write_report, RunOptions};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a sparse inner-product index from CSR files and run query batches", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and print its statistics
    Stats {
        /// Corpus in CSR format
        #[arg(long)]
        input: PathBuf,
        /// Drop documents with repeated dimensions instead of failing
        #[arg(long, default_value_t = false)]
        skip_errors: bool,
    },
    /// Build the index, run a query batch and report throughput
    Search {
        /// Corpus in CSR format
        #[arg(long)]
        input: PathBuf,
        /// Queries in CSR format
        #[arg(long)]
        queries: PathBuf,
        /// JSON engine config; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        k: Option<usize>,
        /// Fraction of each posting list to scan, in (0, 1]
        #[arg(long)]
        budget: Option<f64>,
        /// Wall-clock scoring limit per query, in milliseconds
        #[arg(long)]
        time_budget_ms: Option<f64>,
        /// Query worker threads
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long, default_value_t = false)]
        skip_errors: bool,
        /// Also run an exhaustive scan and report recall
        #[arg(long, default_value_t = false)]
        recall: bool,
        /// Write a JSON report, including ranked ids, to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { input, skip_errors } => {
            let options = BuildOptions {
                on_error: if skip_errors { ErrorPolicy::Skip } else { ErrorPolicy::Abort },
            };
            let vectors = load_vectors(&input)?;
            let index = build_index(&vectors, &options)?;
            println!("{index}");
            Ok(())
        }
        Commands::Search { input, queries, config, k, budget, time_budget_ms, threads, skip_errors, recall, output } => {
            let config = merge_config(config.as_deref(), k, budget, time_budget_ms, threads, skip_errors)?;
            let opts = RunOptions { input, queries, config, recall, keep_results: output.is_some() };
            let report = run_search(&opts)?;
            println!(
                "{} queries in {:.3}s; {:.2} QPS",
                report.num_queries, report.search_s, report.qps
            );
            if let Some(r) = report.recall {
                println!("recall@{}: {:.4}", report.k, r);
            }
            if let Some(path) = output {
                write_report(&path, &report)?;
                tracing::info!(path = %path.display(), "report written");
            }
            Ok(())
        }
    }
}
