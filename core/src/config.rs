use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// What the builder does with a document that repeats a dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the whole build and return the error.
    #[default]
    Abort,
    /// Drop the document and keep going.
    Skip,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Fraction of each posting list to scan, in (0, 1].
    #[serde(default = "default_budget")]
    pub budget: f64,
    /// Optional wall-clock limit on scoring. When set, results depend on
    /// timing and are no longer reproducible.
    #[serde(default)]
    pub time_budget_ms: Option<f64>,
}
fn default_k() -> usize { 10 }
fn default_budget() -> f64 { 1.0 }

impl Default for SearchParams {
    fn default() -> Self {
        Self { k: default_k(), budget: default_budget(), time_budget_ms: None }
    }
}

impl SearchParams {
    pub fn new(k: usize, budget: f64) -> Self {
        Self { k, budget, time_budget_ms: None }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(budget.as_secs_f64() * 1000.0);
        self
    }

    /// The wall-clock limit, if any. Negative, NaN or infinite values are
    /// rejected rather than read as "no limit".
    pub fn time_budget(&self) -> Result<Option<Duration>> {
        match self.time_budget_ms {
            None => Ok(None),
            Some(ms) => Duration::try_from_secs_f64(ms / 1000.0)
                .map(Some)
                .map_err(|_| Error::InvalidTimeBudget(ms)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub build: BuildOptions,
    #[serde(default)]
    pub search: SearchParams,
    /// Size of the query worker pool; rayon's default when absent.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Format(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut f = File::open(path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        Self::from_json_str(&buf)
    }
}
