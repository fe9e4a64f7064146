//! The transform graph and the engine seam.
//!
//! A [`JoinPlan`] is a plain value: it names every stage, which stages feed
//! it, and carries the per-record transforms. It can be inspected and tested
//! without running anything. An [`ExecutionEngine`] decides how the record
//! level stages are scheduled; the two materialisation points (per-dataset
//! aggregation and the join) are the same for every engine.

use crate::aggregate::{case_measure, rainfall_measure, AggregateTable, Aggregator, Rounding};
use crate::error::{Dataset, Result};
use crate::join::inner_join;
use crate::keys::CompositeKey;
use crate::output::{flatten, OutputRow};
use crate::record::{
    split_record, CaseRecord, FieldPolicy, RainfallRecord, CASE_DELIMITER, RAINFALL_DELIMITER,
};
use log::{debug, info};
use std::collections::HashSet;

/// A raw line with its 1-based position in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub line: usize,
    pub text: String,
}

impl InputLine {
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

/// Header-stripped lines of both datasets.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub cases: Vec<InputLine>,
    pub rainfall: Vec<InputLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Split, bind fields and build the composite key of each record.
    Keying(Dataset),
    /// Sum per key. Needs every record of the dataset.
    Aggregate(Dataset),
    /// Outer co-group of both tables, then drop one-sided keys. Needs both tables.
    Join,
    /// Split keys back into columns and render the values.
    Flatten,
}

impl StageKind {
    /// Whether the stage has to see its whole input before emitting anything.
    pub fn is_barrier(&self) -> bool {
        matches!(self, StageKind::Aggregate(_) | StageKind::Join)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub kind: StageKind,
    pub inputs: Vec<&'static str>,
}

pub const CASES_SOURCE: &str = "read dengue cases";
pub const RAINFALL_SOURCE: &str = "read rainfall";

/// Immutable description of the dengue/rainfall merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    policy: FieldPolicy,
    stages: Vec<Stage>,
}

impl Default for JoinPlan {
    fn default() -> Self {
        Self::new(FieldPolicy::default())
    }
}

impl JoinPlan {
    pub fn new(policy: FieldPolicy) -> Self {
        let stages = vec![
            Stage {
                name: "key dengue records",
                kind: StageKind::Keying(Dataset::Cases),
                inputs: vec![CASES_SOURCE],
            },
            Stage {
                name: "sum dengue cases per key",
                kind: StageKind::Aggregate(Dataset::Cases),
                inputs: vec!["key dengue records"],
            },
            Stage {
                name: "key rainfall records",
                kind: StageKind::Keying(Dataset::Rainfall),
                inputs: vec![RAINFALL_SOURCE],
            },
            Stage {
                name: "sum rainfall per key",
                kind: StageKind::Aggregate(Dataset::Rainfall),
                inputs: vec!["key rainfall records"],
            },
            Stage {
                name: "join on key",
                kind: StageKind::Join,
                inputs: vec!["sum dengue cases per key", "sum rainfall per key"],
            },
            Stage {
                name: "flatten rows",
                kind: StageKind::Flatten,
                inputs: vec!["join on key"],
            },
        ];
        Self { policy, stages }
    }

    pub fn policy(&self) -> FieldPolicy {
        self.policy
    }

    /// Stages in an order where every stage follows its inputs.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    pub fn stage_for(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.kind == kind)
    }

    /// Every stage or source that `name` transitively depends on.
    pub fn upstream(&self, name: &str) -> HashSet<&'static str> {
        let mut seen = HashSet::new();
        let mut pending: Vec<&'static str> = match self.stage(name) {
            Some(stage) => stage.inputs.clone(),
            None => return seen,
        };
        while let Some(next) = pending.pop() {
            if seen.insert(next) {
                if let Some(stage) = self.stage(next) {
                    pending.extend(stage.inputs.iter().copied());
                }
            }
        }
        seen
    }

    /// Key and measure of one dengue line, `None` for lines that cannot be keyed.
    pub fn key_case_line(&self, input: &InputLine) -> Result<Option<(CompositeKey, f64)>> {
        if input.text.is_empty() {
            return Ok(None);
        }
        let tokens = split_record(&input.text, CASE_DELIMITER);
        let record = CaseRecord::from_tokens(&tokens, self.policy, input.line)?;
        let key = match CompositeKey::for_case(&record) {
            Some(key) => key,
            None => {
                debug!("dengue line {}: no state or date, skipping", input.line);
                return Ok(None);
            }
        };
        let cases = case_measure(record.cases, input.line)?;
        Ok(Some((key, cases)))
    }

    /// Key and measure of one rainfall line, `None` for lines that cannot be keyed.
    pub fn key_rainfall_line(&self, input: &InputLine) -> Result<Option<(CompositeKey, f64)>> {
        if input.text.is_empty() {
            return Ok(None);
        }
        let tokens = split_record(&input.text, RAINFALL_DELIMITER);
        let record = match RainfallRecord::from_tokens(&tokens, self.policy, input.line)? {
            Some(record) => record,
            None => {
                debug!("rainfall line {}: fewer than 3 fields, skipping", input.line);
                return Ok(None);
            }
        };
        let mm = rainfall_measure(record.millimeters, input.line)?;
        Ok(Some((CompositeKey::for_rainfall(&record), mm)))
    }

    pub fn key_line(&self, dataset: Dataset, input: &InputLine) -> Result<Option<(CompositeKey, f64)>> {
        match dataset {
            Dataset::Cases => self.key_case_line(input),
            Dataset::Rainfall => self.key_rainfall_line(input),
        }
    }

    pub fn rounding(&self, dataset: Dataset) -> Rounding {
        match dataset {
            Dataset::Cases => Rounding::Unrounded,
            Dataset::Rainfall => Rounding::OneDecimal,
        }
    }

    /// Join and flatten stages over two finished tables.
    pub fn join_tables(&self, cases: &AggregateTable, rainfall: &AggregateTable) -> Result<JoinedRows> {
        let outcome = inner_join(cases, rainfall);
        let rows = outcome
            .entries
            .iter()
            .map(flatten)
            .collect::<Result<Vec<_>>>()?;
        Ok(JoinedRows {
            rows,
            cases_only: outcome.cases_only,
            rainfall_only: outcome.rainfall_only,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRows {
    pub rows: Vec<OutputRow>,
    pub cases_only: usize,
    pub rainfall_only: usize,
}

/// Per-dataset result of the keying and aggregation stages.
#[derive(Debug, Default, Clone)]
pub struct AggregatePass {
    pub aggregator: Aggregator,
    pub lines: usize,
    pub skipped: usize,
}

impl AggregatePass {
    /// Runs the keying stage for one line and accumulates its measure.
    pub fn push(&mut self, plan: &JoinPlan, dataset: Dataset, input: &InputLine) -> Result<()> {
        self.lines += 1;
        match plan.key_line(dataset, input)? {
            Some((key, value)) => self.aggregator.add(key, value),
            None => self.skipped += 1,
        }
        Ok(())
    }

    pub fn merge(self, other: AggregatePass) -> Self {
        Self {
            aggregator: self.aggregator.merge(other.aggregator),
            lines: self.lines + other.lines,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub cases_lines: usize,
    pub rainfall_lines: usize,
    pub cases_skipped: usize,
    pub rainfall_skipped: usize,
    pub case_keys: usize,
    pub rainfall_keys: usize,
    pub joined_rows: usize,
    pub cases_only: usize,
    pub rainfall_only: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub rows: Vec<OutputRow>,
    pub stats: RunStats,
}

/// Schedules the record level stages of a [`JoinPlan`].
pub trait ExecutionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Keying and aggregation of one dataset.
    fn aggregate(&self, plan: &JoinPlan, dataset: Dataset, lines: &[InputLine]) -> Result<AggregatePass>;

    /// Runs the whole plan: both aggregations, then the join.
    fn execute(&self, plan: &JoinPlan, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        let cases = self.aggregate(plan, Dataset::Cases, &inputs.cases)?;
        let rainfall = self.aggregate(plan, Dataset::Rainfall, &inputs.rainfall)?;
        finish(plan, cases, rainfall)
    }
}

/// Closes both aggregation barriers and runs the join and flatten stages.
pub fn finish(plan: &JoinPlan, cases: AggregatePass, rainfall: AggregatePass) -> Result<PipelineOutput> {
    let case_table = cases.aggregator.finish(plan.rounding(Dataset::Cases));
    let rainfall_table = rainfall.aggregator.finish(plan.rounding(Dataset::Rainfall));
    info!(
        "Aggregated {} dengue keys and {} rainfall keys",
        case_table.len(),
        rainfall_table.len()
    );

    let joined = plan.join_tables(&case_table, &rainfall_table)?;
    info!(
        "Joined {} keys ({} dengue-only and {} rainfall-only keys dropped)",
        joined.rows.len(),
        joined.cases_only,
        joined.rainfall_only
    );

    let stats = RunStats {
        cases_lines: cases.lines,
        rainfall_lines: rainfall.lines,
        cases_skipped: cases.skipped,
        rainfall_skipped: rainfall.skipped,
        case_keys: case_table.len(),
        rainfall_keys: rainfall_table.len(),
        joined_rows: joined.rows.len(),
        cases_only: joined.cases_only,
        rainfall_only: joined.rainfall_only,
    };
    Ok(PipelineOutput {
        rows: joined.rows,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;

    #[test]
    fn test_stages_follow_their_inputs() {
        let plan = JoinPlan::default();
        let mut seen: HashSet<&str> = [CASES_SOURCE, RAINFALL_SOURCE].into_iter().collect();
        for stage in plan.stages() {
            for input in &stage.inputs {
                assert!(seen.contains(input), "{} runs before its input {}", stage.name, input);
            }
            seen.insert(stage.name);
        }
    }

    #[test]
    fn test_join_depends_on_both_aggregations() {
        let plan = JoinPlan::default();
        let join = plan.stage_for(StageKind::Join).unwrap();
        let upstream = plan.upstream(join.name);

        assert!(upstream.contains(CASES_SOURCE));
        assert!(upstream.contains(RAINFALL_SOURCE));
        assert!(upstream.contains("sum dengue cases per key"));
        assert!(upstream.contains("sum rainfall per key"));
        assert!(join.kind.is_barrier());
    }

    #[test]
    fn test_aggregation_branches_are_independent() {
        let plan = JoinPlan::default();
        let cases = plan.stage_for(StageKind::Aggregate(Dataset::Cases)).unwrap();
        let rainfall = plan.stage_for(StageKind::Aggregate(Dataset::Rainfall)).unwrap();

        assert!(!plan.upstream(cases.name).contains(RAINFALL_SOURCE));
        assert!(!plan.upstream(rainfall.name).contains(CASES_SOURCE));
        assert!(cases.kind.is_barrier() && rainfall.kind.is_barrier());
    }

    #[test]
    fn test_key_case_line() {
        let plan = JoinPlan::default();
        let line = InputLine::new(2, "1|2015-01-17|12|230010|Abaiara|CE|63240-000|-7.36|-39.04");

        let (key, cases) = plan.key_case_line(&line).unwrap().unwrap();
        assert_eq!(key.as_str(), "CE-2015-01");
        assert_eq!(cases, 12.0);
    }

    #[test]
    fn test_unkeyable_lines_are_skipped() {
        let plan = JoinPlan::default();

        assert_eq!(plan.key_case_line(&InputLine::new(2, "")).unwrap(), None);
        assert_eq!(plan.key_case_line(&InputLine::new(3, "1|2015-01-17|12")).unwrap(), None);
        assert_eq!(plan.key_rainfall_line(&InputLine::new(4, "2015-01-17,3")).unwrap(), None);
    }

    #[test]
    fn test_strict_plan_rejects_short_lines() {
        let plan = JoinPlan::new(FieldPolicy::Strict);
        let err = plan.key_case_line(&InputLine::new(3, "1|2015-01-17|12")).unwrap_err();
        assert!(matches!(err, MergeError::FieldCount { line: 3, .. }));
    }

    #[test]
    fn test_push_counts_lines_and_skips() {
        let plan = JoinPlan::default();
        let mut pass = AggregatePass::default();
        pass.push(&plan, Dataset::Rainfall, &InputLine::new(2, "2015-01-05,10.0,CE")).unwrap();
        pass.push(&plan, Dataset::Rainfall, &InputLine::new(3, "")).unwrap();

        assert_eq!(pass.lines, 2);
        assert_eq!(pass.skipped, 1);
        assert_eq!(pass.aggregator.record_count(), 1);
    }
}
