use crate::engine::{ParallelEngine, SequentialEngine};
use crate::pipeline::{ExecutionEngine, JoinPlan};
use crate::record::FieldPolicy;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EngineKind {
    Sequential,
    #[default]
    Parallel,
}

impl EngineKind {
    pub fn build(self) -> Box<dyn ExecutionEngine> {
        match self {
            EngineKind::Sequential => Box::new(SequentialEngine),
            EngineKind::Parallel => Box::new(ParallelEngine::default()),
        }
    }
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Path or glob pattern of the dengue case files.
    pub cases: String,
    /// Path or glob pattern of the rainfall files.
    pub rainfall: String,
    pub output_prefix: PathBuf,
    pub output_suffix: String,
    pub shards: usize,
    pub engine: EngineKind,
    /// Worker threads, 0 for one per core.
    pub threads: usize,
    pub policy: FieldPolicy,
    /// Output lines echoed to the log.
    pub preview: usize,
    pub progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cases: "sample_casos_dengue.txt".to_string(),
            rainfall: "sample_chuvas.csv".to_string(),
            output_prefix: PathBuf::from("resultado"),
            output_suffix: ".csv".to_string(),
            shards: 1,
            engine: EngineKind::default(),
            threads: 0,
            policy: FieldPolicy::default(),
            preview: 0,
            progress: false,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            bail!("--shards must be at least 1");
        }
        if self.cases.trim().is_empty() || self.rainfall.trim().is_empty() {
            bail!("both --cases and --rainfall inputs are required");
        }
        if self.output_prefix.as_os_str().is_empty() {
            bail!("--output prefix must not be empty");
        }
        Ok(())
    }

    pub fn plan(&self) -> JoinPlan {
        JoinPlan::new(self.policy)
    }
}
