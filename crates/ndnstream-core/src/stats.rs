//! Statistics records written by the publisher.
//!
//! The publisher appends one tab-separated line per sampling period:
//!
//! ```text
//! <timestamp>\t<value 1>\t<value 2>\t...
//! ```
//!
//! Field 0 identifies the sample and is ignored. Fields 1..N map
//! positionally onto the statistic names declared in the publisher's
//! configuration, in declared order. Fields past the declared list are
//! dropped without complaint.

use thiserror::Error;

/// Field delimiter used by the publisher's statistics files.
pub const FIELD_DELIMITER: char = '\t';

/// A non-fatal problem with a single statistics field.
///
/// The rest of the line is still processed when one of these occurs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// The line ended before the declared statistic's column
    #[error("statistic {name} is missing from the line")]
    MissingField { name: String },

    /// The column was present but not a number
    #[error("statistic {name} has malformed value {value:?}")]
    MalformedValue { name: String, value: String },

    /// The statistic has no caption and cannot be shown
    #[error("unknown statistic {name}")]
    UnknownStatistic { name: String },
}

/// One parsed statistics line.
///
/// Values are kept in declared order. Statistics whose field was missing
/// or malformed are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatRecord {
    values: Vec<(String, f64)>,
}

impl StatRecord {
    /// Parses a raw line against the declared statistic names.
    ///
    /// Returns the record together with any per-field warnings.
    pub fn parse<S: AsRef<str>>(line: &str, names: &[S]) -> (Self, Vec<ParseWarning>) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut fields = line.split(FIELD_DELIMITER).skip(1);
        let mut values = Vec::with_capacity(names.len());
        let mut warnings = Vec::new();

        for name in names {
            let name = name.as_ref();
            match fields.next() {
                Some(raw) => match raw.trim().parse::<f64>() {
                    Ok(value) if value.is_finite() => values.push((name.to_string(), value)),
                    _ => warnings.push(ParseWarning::MalformedValue {
                        name: name.to_string(),
                        value: raw.to_string(),
                    }),
                },
                None => warnings.push(ParseWarning::MissingField {
                    name: name.to_string(),
                }),
            }
        }

        (Self { values }, warnings)
    }

    /// Returns the value recorded for a statistic, if any.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Iterates over `(name, value)` pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
