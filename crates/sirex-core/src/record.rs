//! Canonical SIR record and per-document batch output types.
//!
//! These are the persisted shapes: a `BatchOutput` is written once per
//! document as `<stem>.extracted.json` and must deserialize back into the
//! exact same aggregates when a later run resumes from it.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Where an incident took place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Sea,
    Land,
    Facility,
    Mixed,
    Unknown,
}

/// How precisely the report pins down the location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionLevel {
    Exact,
    Approximate,
    Broad,
    Unknown,
}

/// Whether the location text is specific enough to be geocoded later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geocodable {
    Yes,
    No,
}

/// Extraction confidence as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// One structured incident extracted from a SIR document.
///
/// Only produced by [`crate::validate_record`]; never built from raw model
/// output directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub sir_id: String,
    pub report_date: Option<String>,
    pub incident_date: Option<String>,
    pub location_details: Option<String>,
    pub where_clear: Option<String>,
    pub location_text_raw: Option<String>,
    pub country_or_area: Option<String>,
    pub location_type: Option<LocationType>,
    pub precision_level: Option<PrecisionLevel>,
    pub geocodable: Option<Geocodable>,
    pub geocodable_query: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub uncertainty_note: Option<String>,
    pub dead_confirmed: Option<u64>,
    pub injured_confirmed: Option<u64>,
    pub missing_confirmed: Option<u64>,
    pub dead_possible_min: Option<u64>,
    pub dead_possible_max: Option<u64>,
    pub context_note: Option<String>,
    pub libyan_coast_guard_involved: Option<bool>,
    pub evidence_quote: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub evidence_pages: Vec<i64>,
}

/// Summed casualty counts over a set of records.
///
/// The possible-max total falls back to a record's possible-min when its max
/// is absent, and contributes nothing when both are absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub dead_confirmed_total: u64,
    pub injured_confirmed_total: u64,
    pub missing_confirmed_total: u64,
    pub dead_possible_total_min: u64,
    pub dead_possible_total_max: u64,
}

impl Totals {
    /// Sums saturate at `u64::MAX` rather than overflow.
    pub fn from_records(records: &[Record]) -> Self {
        let mut totals = Self::default();
        for record in records {
            totals.absorb(&Totals {
                dead_confirmed_total: record.dead_confirmed.unwrap_or(0),
                injured_confirmed_total: record.injured_confirmed.unwrap_or(0),
                missing_confirmed_total: record.missing_confirmed.unwrap_or(0),
                dead_possible_total_min: record.dead_possible_min.unwrap_or(0),
                dead_possible_total_max: record
                    .dead_possible_max
                    .or(record.dead_possible_min)
                    .unwrap_or(0),
            });
        }
        totals
    }

    /// Add another set of totals into this one, saturating.
    pub fn absorb(&mut self, other: &Totals) {
        self.dead_confirmed_total = self
            .dead_confirmed_total
            .saturating_add(other.dead_confirmed_total);
        self.injured_confirmed_total = self
            .injured_confirmed_total
            .saturating_add(other.injured_confirmed_total);
        self.missing_confirmed_total = self
            .missing_confirmed_total
            .saturating_add(other.missing_confirmed_total);
        self.dead_possible_total_min = self
            .dead_possible_total_min
            .saturating_add(other.dead_possible_total_min);
        self.dead_possible_total_max = self
            .dead_possible_total_max
            .saturating_add(other.dead_possible_total_max);
    }
}

/// Per-document extraction artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub source_file: String,
    pub model: String,
    pub generated_at_utc: String,
    pub records: Vec<Record>,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(default)]
    pub records_invalid_skipped: u64,
}

impl BatchOutput {
    /// Build a fresh output stamped with the current UTC time.
    pub fn new(
        source_file: impl Into<String>,
        model: impl Into<String>,
        records: Vec<Record>,
        records_invalid_skipped: u64,
    ) -> Self {
        let totals = Totals::from_records(&records);
        Self {
            source_file: source_file.into(),
            model: model.into(),
            generated_at_utc: utc_timestamp(),
            records,
            totals,
            records_invalid_skipped,
        }
    }
}

/// Current UTC time as RFC 3339 with microseconds and a `+00:00` offset.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Strip a `gemini/` provider prefix from a model identifier.
pub fn normalize_model_name(model: &str) -> &str {
    model.strip_prefix("gemini/").unwrap_or(model)
}
