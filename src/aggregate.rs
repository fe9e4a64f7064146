//! Per-key summation of the case and rainfall measures.
//!
//! An [`Aggregator`] collects every contribution for a key before summing.
//! Contributions are summed in `total_cmp` order, so a key's total is the
//! same bit pattern no matter how records were ordered or partitioned.

use crate::error::{Dataset, MergeError, Result};
use crate::keys::CompositeKey;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref DIGIT_RE: Regex = Regex::new(r"\d").unwrap();
}

/// Case count of a dengue record.
///
/// A value without any digit (empty, `"abc"`, missing) counts as `0.0`. A
/// value that has a digit must parse, otherwise it is a [`MergeError::Parse`].
pub fn case_measure(raw: Option<&str>, line: usize) -> Result<f64> {
    let raw = match raw {
        Some(value) if DIGIT_RE.is_match(value) => value,
        _ => return Ok(0.0),
    };
    parse_number(raw, Dataset::Cases, "casos", line)
}

/// Rainfall in millimeters, with negative readings (including `-0.0`) clamped to zero.
pub fn rainfall_measure(raw: &str, line: usize) -> Result<f64> {
    let mm = parse_number(raw, Dataset::Rainfall, "mm", line)?;
    Ok(if mm <= 0.0 { 0.0 } else { mm })
}

fn parse_number(raw: &str, dataset: Dataset, field: &'static str, line: usize) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|source| MergeError::Parse {
            dataset,
            field,
            value: raw.to_string(),
            line,
            source,
        })
}

/// Post-processing applied to each key's sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Unrounded,
    OneDecimal,
}

impl Rounding {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::Unrounded => value,
            // Rounds the exact binary value: 2.675 is stored below 2.675.
            Rounding::OneDecimal => format!("{:.1}", value).parse().unwrap_or(value),
        }
    }
}

/// Accumulates contributions per key. Mergeable, so partial aggregators built
/// on different threads can be combined before [`Aggregator::finish`].
#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    contributions: BTreeMap<CompositeKey, Vec<f64>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: CompositeKey, value: f64) {
        self.contributions.entry(key).or_default().push(value);
    }

    pub fn merge(mut self, other: Aggregator) -> Self {
        for (key, mut values) in other.contributions {
            self.contributions.entry(key).or_default().append(&mut values);
        }
        self
    }

    pub fn record_count(&self) -> usize {
        self.contributions.values().map(Vec::len).sum()
    }

    pub fn finish(self, rounding: Rounding) -> AggregateTable {
        let values = self
            .contributions
            .into_iter()
            .map(|(key, mut contributions)| {
                contributions.sort_by(f64::total_cmp);
                // `+ 0.0` turns a `-0.0` total into `0.0`.
                let total = contributions.iter().sum::<f64>() + 0.0;
                (key, rounding.apply(total) + 0.0)
            })
            .collect();
        AggregateTable { values }
    }
}

impl Extend<(CompositeKey, f64)> for Aggregator {
    fn extend<I: IntoIterator<Item = (CompositeKey, f64)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl FromIterator<(CompositeKey, f64)> for Aggregator {
    fn from_iter<I: IntoIterator<Item = (CompositeKey, f64)>>(iter: I) -> Self {
        let mut aggregator = Aggregator::new();
        aggregator.extend(iter);
        aggregator
    }
}

/// One total per key for a single dataset.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregateTable {
    values: BTreeMap<CompositeKey, f64>,
}

impl AggregateTable {
    pub fn get(&self, key: &CompositeKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, f64)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }
}

impl FromIterator<(CompositeKey, f64)> for AggregateTable {
    /// Builds a table from already-final totals. Later duplicates replace earlier ones.
    fn from_iter<I: IntoIterator<Item = (CompositeKey, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
