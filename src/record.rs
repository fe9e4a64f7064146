//! Turning raw input lines into typed records.
//!
//! Lines are split positionally on a single delimiter character. The dengue
//! file is bound to [`CASE_SCHEMA`]; the rainfall file is consumed as its
//! three leading fields.

use crate::error::{Dataset, MergeError, Result};

pub const CASE_DELIMITER: char = '|';
pub const RAINFALL_DELIMITER: char = ',';

/// Column order of the dengue case file.
pub const CASE_SCHEMA: [&str; 9] = [
    "id",
    "data_iniSE",
    "casos",
    "ibge_code",
    "cidade",
    "uf",
    "cep",
    "latitude",
    "longitude",
];

/// Leading columns of the rainfall file that are read.
pub const RAINFALL_SCHEMA: [&str; 3] = ["data", "mm", "uf"];

/// How a record whose token count differs from its schema is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPolicy {
    /// Extra tokens are dropped and missing trailing fields are absent.
    #[default]
    Lenient,
    /// Any count mismatch is a [`MergeError::FieldCount`].
    Strict,
}

/// Splits a line on `delimiter`. Never fails; an empty line yields one empty token.
pub fn split_record(line: &str, delimiter: char) -> Vec<&str> {
    line.split(delimiter).collect()
}

/// One row of the dengue case file, borrowed from its source line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseRecord<'a> {
    pub id: Option<&'a str>,
    pub date: Option<&'a str>,
    pub cases: Option<&'a str>,
    pub ibge_code: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub postal_code: Option<&'a str>,
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
}

impl<'a> CaseRecord<'a> {
    /// Binds tokens to [`CASE_SCHEMA`] by position.
    pub fn from_tokens(tokens: &[&'a str], policy: FieldPolicy, line: usize) -> Result<Self> {
        check_count(Dataset::Cases, tokens.len(), CASE_SCHEMA.len(), policy, line)?;

        let field = |idx: usize| tokens.get(idx).copied();
        Ok(Self {
            id: field(0),
            date: field(1),
            cases: field(2),
            ibge_code: field(3),
            city: field(4),
            state: field(5),
            postal_code: field(6),
            latitude: field(7),
            longitude: field(8),
        })
    }

    /// `YYYY-MM` of the epidemiological week start date, if the date is present.
    pub fn year_month(&self) -> Option<String> {
        self.date.map(crate::keys::year_month)
    }
}

/// One row of the rainfall file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RainfallRecord<'a> {
    pub date: &'a str,
    pub millimeters: &'a str,
    pub state: &'a str,
}

impl<'a> RainfallRecord<'a> {
    /// Takes the three leading tokens. Returns `Ok(None)` when fewer than three
    /// are present under the lenient policy.
    pub fn from_tokens(tokens: &[&'a str], policy: FieldPolicy, line: usize) -> Result<Option<Self>> {
        if policy == FieldPolicy::Strict && tokens.len() < RAINFALL_SCHEMA.len() {
            return Err(MergeError::FieldCount {
                dataset: Dataset::Rainfall,
                expected: RAINFALL_SCHEMA.len(),
                found: tokens.len(),
                line,
            });
        }

        match tokens {
            [date, millimeters, state, ..] => Ok(Some(Self {
                date: *date,
                millimeters: *millimeters,
                state: *state,
            })),
            _ => Ok(None),
        }
    }
}

fn check_count(
    dataset: Dataset,
    found: usize,
    expected: usize,
    policy: FieldPolicy,
    line: usize,
) -> Result<()> {
    if policy == FieldPolicy::Strict && found != expected {
        return Err(MergeError::FieldCount {
            dataset,
            expected,
            found,
            line,
        });
    }
    Ok(())
}
