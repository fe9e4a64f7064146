use crate::error::{MergeError, Result};
use crate::record::{CaseRecord, RainfallRecord};

pub const KEY_SEPARATOR: char = '-';

/// First two `-` separated segments of a date, e.g. `2015-01-17` -> `2015-01`.
///
/// No validation: an input with fewer segments comes back as-is.
pub fn year_month(date: &str) -> String {
    match date.match_indices(KEY_SEPARATOR).nth(1) {
        Some((second, _)) => date[..second].to_string(),
        None => date.to_string(),
    }
}

/// `"{state}-{year_month}"`, the key both datasets are joined on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(state: &str, year_month: &str) -> Self {
        Self(format!("{}{}{}", state, KEY_SEPARATOR, year_month))
    }

    /// Key for a case record, or `None` when the state or date is missing.
    pub fn for_case(record: &CaseRecord<'_>) -> Option<Self> {
        let state = record.state?;
        let month = record.year_month()?;
        Some(Self::new(state, &month))
    }

    pub fn for_rainfall(record: &RainfallRecord<'_>) -> Self {
        Self::new(record.state, &year_month(record.date))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits back into `(state, year, month)`.
    ///
    /// Fails unless the key holds exactly two separators, which also rejects
    /// a state code that itself contains `-`.
    pub fn parts(&self) -> Result<(&str, &str, &str)> {
        let parts: Vec<&str> = self.0.split(KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [state, year, month] => Ok((*state, *year, *month)),
            _ => Err(MergeError::MalformedKey(self.0.clone())),
        }
    }
}

impl From<&str> for CompositeKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldPolicy;

    #[test]
    fn test_year_month_truncates_day() {
        assert_eq!(year_month("2015-01-17"), "2015-01");
        assert_eq!(year_month("2015-01"), "2015-01");
        assert_eq!(year_month("2015-01-17-extra"), "2015-01");
        assert_eq!(year_month("2015--17"), "2015-");
    }

    #[test]
    fn test_year_month_short_input_passes_through() {
        assert_eq!(year_month("2015"), "2015");
        assert_eq!(year_month(""), "");
    }

    #[test]
    fn test_rainfall_key() {
        let tokens = ["2015-01-05", "10.0", "CE"];
        let record = RainfallRecord::from_tokens(&tokens, FieldPolicy::Lenient, 1)
            .unwrap()
            .unwrap();

        assert_eq!(CompositeKey::for_rainfall(&record).as_str(), "CE-2015-01");
    }

    #[test]
    fn test_case_key_requires_state_and_date() {
        let full = CaseRecord {
            date: Some("2015-01-17"),
            state: Some("CE"),
            ..Default::default()
        };
        assert_eq!(CompositeKey::for_case(&full), Some(CompositeKey::from("CE-2015-01")));

        let no_state = CaseRecord {
            date: Some("2015-01-17"),
            ..Default::default()
        };
        assert_eq!(CompositeKey::for_case(&no_state), None);
    }

    #[test]
    fn test_parts_splits_into_three() {
        let key = CompositeKey::from("CE-2015-01");
        assert_eq!(key.parts().unwrap(), ("CE", "2015", "01"));
    }

    #[test]
    fn test_parts_rejects_hyphenated_state() {
        let key = CompositeKey::new("X-Y", "2015-01");
        assert!(matches!(key.parts(), Err(MergeError::MalformedKey(k)) if k == "X-Y-2015-01"));

        let short = CompositeKey::new("CE", "2015");
        assert!(short.parts().is_err());
    }
}
