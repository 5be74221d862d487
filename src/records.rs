//! Record model and flattening.
//!
//! Salesforce injects an `attributes` object (type and URL) into every record
//! it returns. Flattening strips it so only business fields reach the CSV.
//! Field order is the order the API sent, which follows the SELECT list.

use serde_json::{Map, Value};

use crate::error::AppError;

/// Key Salesforce uses for per-record metadata.
pub const METADATA_KEY: &str = "attributes";

/// One record exactly as the query API returned it.
pub type RawRecord = Value;

// ─────────────────────────────────────────────────────────────────────────────
// FlatRecord
// ─────────────────────────────────────────────────────────────────────────────

/// Business fields of one record, in query column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    fields: Map<String, Value>,
}

impl FlatRecord {
    /// Builds a record from ordered field/value pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn has_same_keys(&self, other: &FlatRecord) -> bool {
        self.len() == other.len() && self.keys().all(|k| other.fields.contains_key(k))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResultSet
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered records that all share one key set.
///
/// The shared key set is checked on construction. An empty set is a valid
/// value, but it has no columns and cannot be written as CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    records: Vec<FlatRecord>,
}

impl ResultSet {
    /// # Errors
    ///
    /// Returns `AppError::Schema` if any record's key set differs from the
    /// first record's.
    pub fn new(records: Vec<FlatRecord>) -> Result<Self, AppError> {
        if let Some(first) = records.first() {
            if let Some(index) = records.iter().position(|r| !r.has_same_keys(first)) {
                return Err(AppError::Schema(format!(
                    "record {} has different fields than record 0",
                    index
                )));
            }
        }
        Ok(Self { records })
    }

    /// Column names in the first record's order, or `None` when empty.
    pub fn columns(&self) -> Option<Vec<&str>> {
        self.records.first().map(|r| r.keys().collect())
    }

    /// Checks that the columns are exactly `expected`, in that order.
    ///
    /// An empty set has no columns and passes; the sinks reject it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Schema` naming both column lists on a mismatch.
    pub fn ensure_columns(&self, expected: &[&str]) -> Result<(), AppError> {
        match self.columns() {
            Some(columns) if columns != expected => Err(AppError::Schema(format!(
                "columns {:?} do not match the selected fields {:?}",
                columns, expected
            ))),
            _ => Ok(()),
        }
    }

    pub fn records(&self) -> &[FlatRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flattening
// ─────────────────────────────────────────────────────────────────────────────

/// Strips the metadata key from every record.
///
/// # Errors
///
/// Returns `AppError::Schema` if a record is not a JSON object, lacks the
/// metadata key, or has a different key set than the first record.
pub fn flatten(raw_records: Vec<RawRecord>) -> Result<ResultSet, AppError> {
    let flat = raw_records
        .into_iter()
        .enumerate()
        .map(|(index, raw)| flatten_record(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    ResultSet::new(flat)
}

fn flatten_record(index: usize, raw: RawRecord) -> Result<FlatRecord, AppError> {
    let fields = match raw {
        Value::Object(fields) => fields,
        other => {
            return Err(AppError::Schema(format!(
                "record {} is a JSON {} rather than an object",
                index,
                json_kind(&other)
            )))
        }
    };

    if !fields.contains_key(METADATA_KEY) {
        return Err(AppError::Schema(format!(
            "record {} has no '{}' field",
            index, METADATA_KEY
        )));
    }

    // Rebuild rather than remove so the remaining keys keep their order.
    Ok(FlatRecord {
        fields: fields
            .into_iter()
            .filter(|(key, _)| key != METADATA_KEY)
            .collect(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
