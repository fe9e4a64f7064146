use crate::error::{MergeError, Result};
use crate::join::JoinedEntry;

pub const OUTPUT_DELIMITER: char = ';';

/// Column names in output order.
pub const HEADER_COLUMNS: [&str; 5] = ["UF", "ANO", "MES", "CHUVA", "DENGUE"];

/// Header line written once per output set.
pub const HEADER: &str = "UF;ANO;MES;CHUVA;DENGUE";

/// One line of the merged report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRow {
    pub state: String,
    pub year: String,
    pub month: String,
    pub rainfall: String,
    pub cases: String,
}

impl OutputRow {
    /// Fields in [`HEADER_COLUMNS`] order.
    pub fn to_record(&self) -> [&str; 5] {
        [
            self.state.as_str(),
            self.year.as_str(),
            self.month.as_str(),
            self.rainfall.as_str(),
            self.cases.as_str(),
        ]
    }
}

impl std::fmt::Display for OutputRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_line(self, OUTPUT_DELIMITER))
    }
}

/// Renders a measure with at least one fractional digit: `10.0`, `0.4`, `21.5`.
///
/// Values outside `[1e-4, 1e16)` use a signed, two-digit minimum exponent:
/// `1e+16`, `1.5e-05`.
pub fn format_measure(value: f64) -> String {
    let shortest = format!("{:?}", value);
    match shortest.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => shortest,
    }
}

/// Splits the entry's key into its parts and pairs it with both totals.
pub fn flatten(entry: &JoinedEntry) -> Result<OutputRow> {
    let (state, year, month) = entry.key.parts()?;
    let (rainfall, cases) = match (entry.rainfall.first(), entry.cases.first()) {
        (Some(rainfall), Some(cases)) => (*rainfall, *cases),
        _ => return Err(MergeError::IncompleteEntry(entry.key.to_string())),
    };

    Ok(OutputRow {
        state: state.to_string(),
        year: year.to_string(),
        month: month.to_string(),
        rainfall: format_measure(rainfall),
        cases: format_measure(cases),
    })
}

pub fn format_line(row: &OutputRow, delimiter: char) -> String {
    row.to_record().join(delimiter.to_string().as_str())
}
