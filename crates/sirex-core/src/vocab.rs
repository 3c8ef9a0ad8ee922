//! Closed vocabularies for the enum-valued record fields.
//!
//! Each field maps a set of accepted spellings (canonical English values plus
//! the Italian synonyms the model tends to emit) onto one variant. Lookup
//! trims and lower-cases before matching, so table keys are stored already
//! normalised.

use serde_json::Value;

use crate::record::{Confidence, Geocodable, LocationType, PrecisionLevel};

/// An enum field backed by an explicit synonym table.
pub trait Vocabulary: Sized + Copy + PartialEq + 'static {
    /// Record field name, used in rejection messages.
    const FIELD: &'static str;

    /// Normalised spelling → variant.
    const SYNONYMS: &'static [(&'static str, Self)];

    /// Map a raw string onto a variant, ignoring case and surrounding space.
    fn lookup(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase();
        Self::SYNONYMS
            .iter()
            .find(|(spelling, _)| *spelling == key)
            .map(|(_, variant)| *variant)
    }

    /// Map a JSON value onto a variant. Non-string scalars are matched on
    /// their textual form, which never hits a table entry.
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::lookup(s),
            other => Self::lookup(&other.to_string()),
        }
    }
}

impl Vocabulary for LocationType {
    const FIELD: &'static str = "location_type";
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("sea", Self::Sea),
        ("land", Self::Land),
        ("facility", Self::Facility),
        ("mixed", Self::Mixed),
        ("unknown", Self::Unknown),
    ];
}

impl Vocabulary for PrecisionLevel {
    const FIELD: &'static str = "precision_level";
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("exact", Self::Exact),
        ("approximate", Self::Approximate),
        ("broad", Self::Broad),
        ("unknown", Self::Unknown),
    ];
}

impl Vocabulary for Geocodable {
    const FIELD: &'static str = "geocodable";
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("yes", Self::Yes),
        ("no", Self::No),
        ("true", Self::Yes),
        ("false", Self::No),
    ];

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Self::Yes),
            Value::Bool(false) => Some(Self::No),
            Value::String(s) => Self::lookup(s),
            other => Self::lookup(&other.to_string()),
        }
    }
}

impl Vocabulary for Confidence {
    const FIELD: &'static str = "confidence";
    const SYNONYMS: &'static [(&'static str, Self)] = &[
        ("high", Self::High),
        ("medium", Self::Medium),
        ("low", Self::Low),
        ("alta", Self::High),
        ("media", Self::Medium),
        ("bassa", Self::Low),
    ];
}
