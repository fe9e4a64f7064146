use crate::aggregate::AggregateTable;
use crate::keys::CompositeKey;
use std::collections::BTreeSet;

/// Values gathered for one key from both tables.
///
/// After aggregation each side holds at most one value.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedEntry {
    pub key: CompositeKey,
    pub rainfall: Vec<f64>,
    pub cases: Vec<f64>,
}

impl JoinedEntry {
    /// Both datasets contributed to this key.
    pub fn is_complete(&self) -> bool {
        !self.rainfall.is_empty() && !self.cases.is_empty()
    }
}

/// Full outer co-group: one entry per key found in either table.
pub fn co_group(cases: &AggregateTable, rainfall: &AggregateTable) -> Vec<JoinedEntry> {
    let keys: BTreeSet<&CompositeKey> = cases
        .iter()
        .map(|(key, _)| key)
        .chain(rainfall.iter().map(|(key, _)| key))
        .collect();

    keys.into_iter()
        .map(|key| JoinedEntry {
            key: key.clone(),
            rainfall: rainfall.get(key).into_iter().collect(),
            cases: cases.get(key).into_iter().collect(),
        })
        .collect()
}

/// Result of joining the two aggregate tables.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JoinOutcome {
    pub entries: Vec<JoinedEntry>,
    pub cases_only: usize,
    pub rainfall_only: usize,
}

/// Co-groups both tables and keeps only keys present in each.
pub fn inner_join(cases: &AggregateTable, rainfall: &AggregateTable) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();
    for entry in co_group(cases, rainfall) {
        if entry.is_complete() {
            outcome.entries.push(entry);
        } else if entry.cases.is_empty() {
            outcome.rainfall_only += 1;
        } else {
            outcome.cases_only += 1;
        }
    }
    outcome
}
