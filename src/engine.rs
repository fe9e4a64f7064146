//! In-process engines for a [`JoinPlan`].

use crate::error::{Dataset, Result};
use crate::pipeline::{finish, AggregatePass, ExecutionEngine, InputLine, JoinPlan, PipelineInputs, PipelineOutput};
use log::info;
use rayon::prelude::*;

/// Lines handed to one rayon task at a minimum.
pub const DEFAULT_MIN_CHUNK: usize = 4096;

/// Runs every stage on the calling thread, in input order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialEngine;

impl ExecutionEngine for SequentialEngine {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn aggregate(&self, plan: &JoinPlan, dataset: Dataset, lines: &[InputLine]) -> Result<AggregatePass> {
        info!("Aggregating {} {} lines", lines.len(), dataset);
        let mut pass = AggregatePass::default();
        for line in lines {
            pass.push(plan, dataset, line)?;
        }
        Ok(pass)
    }
}

/// Keys records on the rayon pool and folds partial aggregates per task.
///
/// Both datasets are aggregated concurrently; the join waits for both.
#[derive(Debug, Clone, Copy)]
pub struct ParallelEngine {
    min_chunk: usize,
}

impl Default for ParallelEngine {
    fn default() -> Self {
        Self {
            min_chunk: DEFAULT_MIN_CHUNK,
        }
    }
}

impl ParallelEngine {
    pub fn with_min_chunk(min_chunk: usize) -> Self {
        Self {
            min_chunk: min_chunk.max(1),
        }
    }
}

impl ExecutionEngine for ParallelEngine {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn aggregate(&self, plan: &JoinPlan, dataset: Dataset, lines: &[InputLine]) -> Result<AggregatePass> {
        info!(
            "Aggregating {} {} lines on {} threads",
            lines.len(),
            dataset,
            rayon::current_num_threads()
        );
        lines
            .par_iter()
            .with_min_len(self.min_chunk)
            .try_fold(AggregatePass::default, |mut pass, line| {
                pass.push(plan, dataset, line)?;
                Ok(pass)
            })
            .try_reduce(AggregatePass::default, |left, right| Ok(left.merge(right)))
    }

    fn execute(&self, plan: &JoinPlan, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        let (cases, rainfall) = rayon::join(
            || self.aggregate(plan, Dataset::Cases, &inputs.cases),
            || self.aggregate(plan, Dataset::Rainfall, &inputs.rainfall),
        );
        finish(plan, cases?, rainfall?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;

    fn lines(texts: &[&str]) -> Vec<InputLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| InputLine::new(i + 2, *text))
            .collect()
    }

    fn sample_inputs() -> PipelineInputs {
        PipelineInputs {
            cases: lines(&[
                "1|2015-01-17|12|230010|Abaiara|CE|63240-000|-7.36|-39.04",
                "2|2015-01-24|abc|230010|Abaiara|CE|63240-000|-7.36|-39.04",
                "3|2015-02-07|5|330455|Rio de Janeiro|RJ|20000-000|-22.9|-43.2",
                "4|2015-03-07|7|230010|Abaiara|CE|63240-000|-7.36|-39.04",
            ]),
            rainfall: lines(&[
                "2015-01-05,10.0,CE",
                "2015-01-20,-5,CE",
                "2015-02-01,0.25,RJ",
                "2015-02-02,0.11,RJ",
                "2015-04-02,3.0,CE",
            ]),
        }
    }

    #[test]
    fn test_engines_agree() {
        let plan = JoinPlan::default();
        let inputs = sample_inputs();

        let sequential = SequentialEngine.execute(&plan, &inputs).unwrap();
        let parallel = ParallelEngine::with_min_chunk(1).execute(&plan, &inputs).unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_sample_rows_and_stats() {
        let output = SequentialEngine
            .execute(&JoinPlan::default(), &sample_inputs())
            .unwrap();

        let rendered: Vec<String> = output.rows.iter().map(|row| row.to_string()).collect();
        assert_eq!(rendered, vec!["CE;2015;01;10.0;12.0", "RJ;2015;02;0.4;5.0"]);
        assert_eq!(output.stats.cases_lines, 4);
        assert_eq!(output.stats.rainfall_lines, 5);
        assert_eq!(output.stats.case_keys, 3);
        assert_eq!(output.stats.rainfall_keys, 3);
        assert_eq!(output.stats.cases_only, 1);
        assert_eq!(output.stats.rainfall_only, 1);
    }

    #[test]
    fn test_parse_error_aborts_run() {
        let mut inputs = sample_inputs();
        inputs.cases.push(InputLine::new(99, "5|2015-01-31|1x|230010|Abaiara|CE|63240-000|0|0"));

        for engine in [&SequentialEngine as &dyn ExecutionEngine, &ParallelEngine::with_min_chunk(1)] {
            let err = engine.execute(&JoinPlan::default(), &inputs).unwrap_err();
            assert!(matches!(err, MergeError::Parse { line: 99, .. }), "{}", engine.name());
        }
    }
}
