pub mod record;
pub mod validate;
pub mod vocab;

pub use record::{
    BatchOutput, Confidence, Geocodable, LocationType, PrecisionLevel, Record, Totals,
    normalize_model_name, utc_timestamp,
};
pub use validate::{
    PayloadError, RecordError, ValidatedPayload, extract_sir_id, validate_payload,
    validate_record,
};
pub use vocab::Vocabulary;
