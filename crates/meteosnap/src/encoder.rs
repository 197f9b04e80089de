//! Flattening of a nested weather response into a tabular record.
//!
//! The provider returns a JSON object mixing top-level scalars (latitude,
//! timezone, ...) with nested blocks. A block holds scalar entries and,
//! for the forecast section, a set of index-aligned parallel arrays
//! (same length, same index = same timestamp). [`WeatherSnapshot`]
//! validates that shape up front so [`encode`] is a pure, total transform.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Shape validation errors raised while building the typed snapshot.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("weather response is not a JSON object")]
    NotAnObject,

    #[error("unsupported value shape at '{path}'")]
    UnsupportedShape { path: String },

    #[error("array length mismatch in section '{section}': '{key}' has {found} entries, expected {expected}")]
    ArrayLengthMismatch {
        section: String,
        key: String,
        expected: usize,
        found: usize,
    },
}

/// A single scalar cell value.
///
/// Numbers keep their `serde_json` representation so `50.93` round-trips
/// as `50.93` and not as `50.930000000000000001`.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(Scalar::Number(n.clone())),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One top-level section of the response.
#[derive(Debug, Clone)]
pub enum Section {
    /// A plain top-level scalar (`"latitude": 50.93`).
    Scalar(Scalar),
    /// A nested object: scalar entries plus zero or more parallel arrays.
    Block {
        entries: Vec<(String, Scalar)>,
        series: Vec<(String, Vec<Scalar>)>,
    },
}

/// Validated, order-preserving view of a provider response.
#[derive(Debug, Clone)]
pub struct WeatherSnapshot {
    sections: Vec<(String, Section)>,
}

impl WeatherSnapshot {
    /// Validate a raw JSON response into the typed form.
    ///
    /// Rules: the top level must be an object; block members must be
    /// scalars or arrays of scalars; all arrays within one block must
    /// have equal length. Anything else is an [`EncodeError`], which the
    /// poller treats as a cycle abort.
    pub fn from_json(value: &Value) -> Result<Self, EncodeError> {
        let root = value.as_object().ok_or(EncodeError::NotAnObject)?;

        let mut sections = Vec::with_capacity(root.len());
        for (key, value) in root {
            let section = match value {
                Value::Object(block) => Self::parse_block(key, block)?,
                other => Section::Scalar(Scalar::from_value(other).ok_or_else(|| {
                    EncodeError::UnsupportedShape { path: key.clone() }
                })?),
            };
            sections.push((key.clone(), section));
        }

        Ok(Self { sections })
    }

    fn parse_block(
        section: &str,
        block: &serde_json::Map<String, Value>,
    ) -> Result<Section, EncodeError> {
        let mut entries = Vec::new();
        let mut series: Vec<(String, Vec<Scalar>)> = Vec::new();

        for (key, value) in block {
            let path = || format!("{}.{}", section, key);
            match value {
                Value::Array(items) => {
                    let mut cells = Vec::with_capacity(items.len());
                    for item in items {
                        cells.push(Scalar::from_value(item).ok_or_else(|| {
                            EncodeError::UnsupportedShape { path: path() }
                        })?);
                    }
                    if let Some((_, first)) = series.first() {
                        if cells.len() != first.len() {
                            return Err(EncodeError::ArrayLengthMismatch {
                                section: section.to_string(),
                                key: key.clone(),
                                expected: first.len(),
                                found: cells.len(),
                            });
                        }
                    }
                    series.push((key.clone(), cells));
                }
                other => {
                    let scalar = Scalar::from_value(other)
                        .ok_or_else(|| EncodeError::UnsupportedShape { path: path() })?;
                    entries.push((key.clone(), scalar));
                }
            }
        }

        Ok(Section::Block { entries, series })
    }

    /// Sections in the provider's declared order.
    pub fn sections(&self) -> &[(String, Section)] {
        &self.sections
    }
}

/// The flat, row-oriented form of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    rows: Vec<Vec<String>>,
}

impl FlatRecord {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Serialize as CSV: one comma-separated line per row.
    ///
    /// Fields containing a comma, quote or newline are quoted; everything
    /// the provider actually sends (timestamps, floats, timezone names)
    /// passes through verbatim.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(|f| escape_csv_field(f)).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }
}

fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Flatten a validated snapshot into rows.
///
/// Per top-level section, in order:
/// - scalar section: one `[key, value]` row;
/// - block section: a `[key]` header row, one `[subkey, subvalue]` row per
///   scalar entry, then (when the block carries parallel arrays) one row
///   per index position holding the i-th element of every array in the
///   block's declared order.
pub fn encode(snapshot: &WeatherSnapshot) -> FlatRecord {
    let mut rows = Vec::new();

    for (key, section) in snapshot.sections() {
        match section {
            Section::Scalar(value) => {
                rows.push(vec![key.clone(), value.to_string()]);
            }
            Section::Block { entries, series } => {
                rows.push(vec![key.clone()]);
                for (subkey, value) in entries {
                    rows.push(vec![subkey.clone(), value.to_string()]);
                }
                if let Some((_, first)) = series.first() {
                    for i in 0..first.len() {
                        rows.push(series.iter().map(|(_, cells)| cells[i].to_string()).collect());
                    }
                }
            }
        }
    }

    FlatRecord { rows }
}
