//! Merge monthly dengue case counts with rainfall totals.
//!
//! Both datasets are keyed by `"{uf}-{yyyy}-{mm}"`, summed per key, and joined
//! so that only keys present in both survive. Each surviving key becomes one
//! `UF;ANO;MES;CHUVA;DENGUE` row.
//!
//! The transformation core (`record`, `keys`, `aggregate`, `join`, `output`)
//! is pure. [`pipeline::JoinPlan`] describes the stages and an
//! [`pipeline::ExecutionEngine`] runs them; [`io`] handles the files.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod join;
pub mod keys;
pub mod output;
pub mod pipeline;
pub mod record;

pub use config::{EngineKind, RunConfig};
pub use error::{Dataset, MergeError};
pub use output::OutputRow;
pub use pipeline::{ExecutionEngine, JoinPlan, PipelineInputs, RunStats};

use anyhow::Context;
use log::info;
use std::path::PathBuf;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: Vec<OutputRow>,
    pub stats: RunStats,
    pub files: Vec<PathBuf>,
}

/// Reads both inputs, executes the plan on the configured engine and writes
/// the report shards.
pub fn run(config: &RunConfig) -> anyhow::Result<RunReport> {
    config.validate()?;

    info!("Reading dengue cases from: {}", config.cases);
    let cases = io::read_dataset(&config.cases, config.progress)?;
    info!("Reading rainfall from: {}", config.rainfall);
    let rainfall = io::read_dataset(&config.rainfall, config.progress)?;
    let inputs = PipelineInputs { cases, rainfall };

    let plan = config.plan();
    let engine = config.engine.build();
    info!("Executing {} stages on the {} engine", plan.stages().len(), engine.name());
    let output = engine
        .execute(&plan, &inputs)
        .context("Merge pipeline failed")?;

    let files = io::write_shards(
        &output.rows,
        &config.output_prefix,
        &config.output_suffix,
        config.shards,
    )?;

    Ok(RunReport {
        rows: output.rows,
        stats: output.stats,
        files,
    })
}
