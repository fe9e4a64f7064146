use std::num::ParseFloatError;
use thiserror::Error;

/// Which input a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Cases,
    Rainfall,
}

impl Dataset {
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Cases => "dengue",
            Dataset::Rainfall => "rainfall",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by the transformation core.
///
/// The core performs no I/O, so nothing here wraps `std::io::Error`; file
/// problems are reported by the `io` layer through `anyhow`.
#[derive(Error, Debug)]
pub enum MergeError {
    /// A measure that has to be numeric could not be parsed.
    #[error("{dataset} line {line}: cannot parse {field} value {value:?} as a number: {source}")]
    Parse {
        dataset: Dataset,
        field: &'static str,
        value: String,
        line: usize,
        #[source]
        source: ParseFloatError,
    },

    /// Token count does not match the schema (strict field policy only).
    #[error("{dataset} line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        dataset: Dataset,
        expected: usize,
        found: usize,
        line: usize,
    },

    /// A composite key that does not split into state, year and month.
    #[error("composite key {0:?} does not split into exactly three '-' separated parts")]
    MalformedKey(String),

    /// A joined entry missing the value from one of the datasets.
    #[error("key {0:?} has no value from one of the datasets")]
    IncompleteEntry(String),
}

pub type Result<T> = std::result::Result<T, MergeError>;
