//! Schema validation and normalisation of raw model output.
//!
//! The model returns loosely-typed JSON. [`validate_payload`] walks its
//! `records` array and turns each entry into a canonical [`Record`] or a
//! counted rejection. A rejected record never fails the document.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::record::{Confidence, Geocodable, LocationType, PrecisionLevel, Record};
use crate::vocab::Vocabulary;

/// Maximum number of rejection diagnostics kept per payload.
pub const MAX_DIAGNOSTICS: usize = 3;

/// Offending values are cut to this many characters in diagnostics.
const DIAGNOSTIC_VALUE_CHARS: usize = 60;

static SIR_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}/\d{4}\b").expect("sir_id pattern compiles"));

const NULL_SENTINELS: &[&str] = &["", "null", "none", "na", "n/a"];

/// Cardinal letters and DMS marks; checked against the lower-cased value.
const NON_DECIMAL_MARKERS: &[char] = &['n', 's', 'e', 'w', '°', '\'', '"'];

const CONTEXT_NOTE: &[&str] = &["context_note", "note_contesto"];
const EVIDENCE_QUOTE: &[&str] = &["evidence_quote", "evidenza_testuale"];
const CONFIDENCE: &[&str] = &["confidence", "confidenza"];

/// Why a single raw record was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("non-object record")]
    NotAnObject,

    #[error("invalid sir_id={0:?}")]
    MissingSirId(String),

    #[error("invalid {field} value: {value}")]
    InvalidEnum { field: &'static str, value: String },

    #[error("{field} must be a decimal number without N/E/S/W or DMS symbols: {value}")]
    NonDecimalCoordinate { field: &'static str, value: String },

    #[error("{field} must be a decimal number: {value}")]
    UnparseableCoordinate { field: &'static str, value: String },

    #[error("{field} out of range [-{bound}, {bound}]: {value}")]
    CoordinateOutOfRange {
        field: &'static str,
        bound: f64,
        value: f64,
    },

    #[error("{field} must be a non-negative integer: {value}")]
    InvalidCount { field: &'static str, value: String },

    #[error("{field} must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("dead_possible_max must be >= dead_possible_min ({max} < {min})")]
    PossibleRange { min: u64, max: u64 },

    #[error("missing required field {0}")]
    Missing(&'static str),

    #[error("evidence_quote must not be empty")]
    EmptyEvidence,
}

/// Payload-level failure: the response is unusable as a whole.
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("model response field 'records' must be an array")]
    RecordsNotArray,
}

/// Result of filtering one payload.
#[derive(Debug, Default)]
pub struct ValidatedPayload {
    pub records: Vec<Record>,
    pub rejected: u64,
    /// Up to [`MAX_DIAGNOSTICS`] short lines of the form `#<index> ...`.
    pub diagnostics: Vec<String>,
}

/// Filter a raw top-level payload into validated records.
///
/// A missing or null `records` field is an empty list. Indices in
/// diagnostics are 1-based.
pub fn validate_payload(payload: &Map<String, Value>) -> Result<ValidatedPayload, PayloadError> {
    let raw_records = match payload.get("records") {
        None | Some(Value::Null) => return Ok(ValidatedPayload::default()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(PayloadError::RecordsNotArray),
    };

    let mut out = ValidatedPayload::default();
    for (idx, raw) in raw_records.iter().enumerate() {
        let idx = idx + 1;
        match validate_record(raw) {
            Ok(record) => out.records.push(record),
            Err(e) => {
                debug!(index = idx, error = %e, "record rejected");
                out.rejected += 1;
                if out.diagnostics.len() < MAX_DIAGNOSTICS {
                    out.diagnostics.push(diagnostic(idx, raw, &e));
                }
            }
        }
    }
    Ok(out)
}

fn diagnostic(idx: usize, raw: &Value, err: &RecordError) -> String {
    match err {
        RecordError::NotAnObject | RecordError::MissingSirId(_) => format!("#{idx}: {err}"),
        _ => {
            let sir_id = raw
                .get("sir_id")
                .and_then(extract_sir_id)
                .unwrap_or_default();
            format!("#{idx} {sir_id}: {}", truncate(&err.to_string(), 120))
        }
    }
}

/// Validate and normalise one raw record.
pub fn validate_record(raw: &Value) -> Result<Record, RecordError> {
    let Value::Object(raw) = raw else {
        return Err(RecordError::NotAnObject);
    };

    // 1. sir_id: cheap pre-filter by pattern search over the raw text.
    let sir_id = raw.get("sir_id").and_then(extract_sir_id).ok_or_else(|| {
        let shown = raw.get("sir_id").map(stringify).unwrap_or_else(|| "null".into());
        RecordError::MissingSirId(truncate(&shown, DIAGNOSTIC_VALUE_CHARS))
    })?;

    // 2. Aliased fields.
    let context_note = aliased(raw, CONTEXT_NOTE);
    let evidence_quote = aliased(raw, EVIDENCE_QUOTE);
    let confidence = aliased(raw, CONFIDENCE);

    // 3. Vocabularies.
    let location_type = optional_vocab::<LocationType>(raw.get(LocationType::FIELD))?;
    let precision_level = optional_vocab::<PrecisionLevel>(raw.get(PrecisionLevel::FIELD))?;
    let geocodable = optional_vocab::<Geocodable>(raw.get(Geocodable::FIELD))?;
    let confidence = optional_vocab::<Confidence>(confidence)?;

    // 4. Coordinates and the remaining scalar fields.
    let lat = normalize_coordinate("lat", raw.get("lat"), 90.0)?;
    let lon = normalize_coordinate("lon", raw.get("lon"), 180.0)?;

    let dead_possible_min = normalize_count("dead_possible_min", raw.get("dead_possible_min"))?;
    let dead_possible_max = normalize_count("dead_possible_max", raw.get("dead_possible_max"))?;

    // 5. Cross-field range.
    if let (Some(min), Some(max)) = (dead_possible_min, dead_possible_max)
        && max < min
    {
        return Err(RecordError::PossibleRange { min, max });
    }

    // 6. Required fields.
    let evidence_quote = match evidence_quote {
        None => return Err(RecordError::Missing("evidence_quote")),
        Some(Value::String(s)) if s.is_empty() => return Err(RecordError::EmptyEvidence),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(RecordError::InvalidType {
                field: "evidence_quote",
                expected: "a string",
            });
        }
    };
    let confidence = confidence.ok_or(RecordError::Missing("confidence"))?;

    Ok(Record {
        sir_id,
        report_date: optional_string("report_date", raw.get("report_date"))?,
        incident_date: optional_string("incident_date", raw.get("incident_date"))?,
        location_details: optional_string("location_details", raw.get("location_details"))?,
        where_clear: optional_string("where_clear", raw.get("where_clear"))?,
        location_text_raw: optional_string("location_text_raw", raw.get("location_text_raw"))?,
        country_or_area: optional_string("country_or_area", raw.get("country_or_area"))?,
        location_type,
        precision_level,
        geocodable,
        geocodable_query: optional_string("geocodable_query", raw.get("geocodable_query"))?,
        lat,
        lon,
        uncertainty_note: optional_string("uncertainty_note", raw.get("uncertainty_note"))?,
        dead_confirmed: normalize_count("dead_confirmed", raw.get("dead_confirmed"))?,
        injured_confirmed: normalize_count("injured_confirmed", raw.get("injured_confirmed"))?,
        missing_confirmed: normalize_count("missing_confirmed", raw.get("missing_confirmed"))?,
        dead_possible_min,
        dead_possible_max,
        context_note: optional_string("context_note", context_note)?,
        libyan_coast_guard_involved: optional_flag(
            "libyan_coast_guard_involved",
            raw.get("libyan_coast_guard_involved"),
        )?,
        evidence_quote,
        confidence,
        evidence_pages: evidence_pages(raw.get("evidence_pages"))?,
    })
}

/// Find the first `NNNNN/YYYY` identifier in a value's textual form.
pub fn extract_sir_id(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    SIR_ID_PATTERN
        .find(&stringify(value))
        .map(|m| m.as_str().to_string())
}

/// Normalise a decimal coordinate, rejecting cardinal or DMS notation.
///
/// Null and null-like sentinel strings map to `None`. A comma is accepted
/// as the decimal separator.
pub fn normalize_coordinate(
    field: &'static str,
    value: Option<&Value>,
    bound: f64,
) -> Result<Option<f64>, RecordError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| RecordError::UnparseableCoordinate {
            field,
            value: n.to_string(),
        })?,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            let lowered = trimmed.to_lowercase();
            if NULL_SENTINELS.contains(&lowered.as_str()) {
                return Ok(None);
            }
            if lowered.contains(NON_DECIMAL_MARKERS) {
                return Err(RecordError::NonDecimalCoordinate {
                    field,
                    value: truncate(trimmed, DIAGNOSTIC_VALUE_CHARS),
                });
            }
            trimmed
                .replace(',', ".")
                .parse::<f64>()
                .map_err(|_| RecordError::UnparseableCoordinate {
                    field,
                    value: truncate(trimmed, DIAGNOSTIC_VALUE_CHARS),
                })?
        }
        Some(other) => {
            return Err(RecordError::UnparseableCoordinate {
                field,
                value: truncate(&other.to_string(), DIAGNOSTIC_VALUE_CHARS),
            });
        }
    };

    if !parsed.is_finite() || parsed.abs() > bound {
        return Err(RecordError::CoordinateOutOfRange {
            field,
            bound,
            value: parsed,
        });
    }
    Ok(Some(parsed))
}

/// Normalise an optional non-negative count.
///
/// Accepts integers, integral floats, and numeric strings.
pub fn normalize_count(field: &'static str, value: Option<&Value>) -> Result<Option<u64>, RecordError> {
    let invalid = |v: &Value| RecordError::InvalidCount {
        field,
        value: truncate(&stringify(v), DIAGNOSTIC_VALUE_CHARS),
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => integer(v).and_then(|n| u64::try_from(n).ok()).map(Some).ok_or_else(|| invalid(v)),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn evidence_pages(value: Option<&Value>) -> Result<Vec<i64>, RecordError> {
    const INVALID: RecordError = RecordError::InvalidType {
        field: "evidence_pages",
        expected: "a list of integers",
    };
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|item| integer(item).ok_or(INVALID)).collect(),
        Some(_) => Err(INVALID),
    }
}

fn optional_vocab<T: Vocabulary>(value: Option<&Value>) -> Result<Option<T>, RecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => T::from_json(v).map(Some).ok_or_else(|| RecordError::InvalidEnum {
            field: T::FIELD,
            value: truncate(&stringify(v), DIAGNOSTIC_VALUE_CHARS),
        }),
    }
}

fn optional_string(field: &'static str, value: Option<&Value>) -> Result<Option<String>, RecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RecordError::InvalidType {
            field,
            expected: "a string or null",
        }),
    }
}

fn optional_flag(field: &'static str, value: Option<&Value>) -> Result<Option<bool>, RecordError> {
    let invalid = RecordError::InvalidType {
        field,
        expected: "a boolean or null",
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(invalid),
        },
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(invalid),
        },
        Some(_) => Err(invalid),
    }
}

/// First alias present in the raw record wins.
fn aliased<'a>(raw: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| raw.get(*name))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
