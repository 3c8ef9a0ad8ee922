//! Group and run summaries: a flat per-record table plus a totals object.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sirex_core::{
    BatchOutput, Confidence, Geocodable, LocationType, PrecisionLevel, Record, Totals,
    utc_timestamp,
};
use tracing::info;

use crate::artifact::partial_path;
use crate::error::StoreError;
use crate::layout::OutputLayout;

/// Column order of `summary.csv`.
pub const SUMMARY_COLUMNS: [&str; 26] = [
    "source_file",
    "model",
    "sir_id",
    "report_date",
    "incident_date",
    "location_details",
    "where_clear",
    "location_text_raw",
    "country_or_area",
    "location_type",
    "precision_level",
    "geocodable",
    "geocodable_query",
    "lat",
    "lon",
    "uncertainty_note",
    "dead_confirmed",
    "injured_confirmed",
    "missing_confirmed",
    "dead_possible_min",
    "dead_possible_max",
    "libyan_coast_guard_involved",
    "confidence",
    "evidence_pages",
    "evidence_quote",
    "context_note",
];

/// One record flattened for the summary table.
///
/// Field order must match [`SUMMARY_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub source_file: String,
    pub model: String,
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
    pub libyan_coast_guard_involved: Option<bool>,
    pub confidence: Confidence,
    pub evidence_pages: String,
    pub evidence_quote: String,
    pub context_note: Option<String>,
}

impl SummaryRow {
    pub fn from_record(record: &Record, source_file: &str, model: &str) -> Self {
        let evidence_pages = record
            .evidence_pages
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self {
            source_file: source_file.to_string(),
            model: model.to_string(),
            sir_id: record.sir_id.clone(),
            report_date: record.report_date.clone(),
            incident_date: record.incident_date.clone(),
            location_details: record.location_details.clone(),
            where_clear: record.where_clear.clone(),
            location_text_raw: record.location_text_raw.clone(),
            country_or_area: record.country_or_area.clone(),
            location_type: record.location_type,
            precision_level: record.precision_level,
            geocodable: record.geocodable,
            geocodable_query: record.geocodable_query.clone(),
            lat: record.lat,
            lon: record.lon,
            uncertainty_note: record.uncertainty_note.clone(),
            dead_confirmed: record.dead_confirmed,
            injured_confirmed: record.injured_confirmed,
            missing_confirmed: record.missing_confirmed,
            dead_possible_min: record.dead_possible_min,
            dead_possible_max: record.dead_possible_max,
            libyan_coast_guard_involved: record.libyan_coast_guard_involved,
            confidence: record.confidence,
            evidence_pages,
            evidence_quote: record.evidence_quote.clone(),
            context_note: record.context_note.clone(),
        }
    }
}

/// Contents of `summary_totals.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub generated_at_utc: String,
    pub model: String,
    pub input_path: String,
    pub files_processed: u64,
    pub files_failed: u64,
    pub records_total: u64,
    #[serde(flatten)]
    pub totals: Totals,
    pub records_invalid_skipped: u64,
    /// Always zero; budget-limited files are not counted.
    pub files_skipped_by_limit: u64,
}

/// Accumulates document outcomes for one group or a whole run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    rows: Vec<SummaryRow>,
    totals: Totals,
    files_processed: u64,
    files_failed: u64,
    records_invalid_skipped: u64,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a processed document, fresh or loaded from cache.
    pub fn add_output(&mut self, output: &BatchOutput) {
        self.rows.extend(
            output
                .records
                .iter()
                .map(|r| SummaryRow::from_record(r, &output.source_file, &output.model)),
        );
        self.totals.absorb(&output.totals);
        self.records_invalid_skipped += output.records_invalid_skipped;
        self.files_processed += 1;
    }

    pub fn add_failure(&mut self) {
        self.files_failed += 1;
    }

    /// Fold a group summary into a run summary.
    pub fn merge(&mut self, other: &Summary) {
        self.rows.extend(other.rows.iter().cloned());
        self.totals.absorb(&other.totals);
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.records_invalid_skipped += other.records_invalid_skipped;
    }

    /// Whether any document was processed or failed.
    pub fn has_activity(&self) -> bool {
        self.files_processed + self.files_failed > 0
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed
    }

    pub fn files_failed(&self) -> u64 {
        self.files_failed
    }

    pub fn records_total(&self) -> u64 {
        self.rows.len() as u64
    }

    pub fn records_invalid_skipped(&self) -> u64 {
        self.records_invalid_skipped
    }

    /// Snapshot the counters as a totals object stamped with the current time.
    pub fn to_totals(&self, model: &str, input_path: &str) -> SummaryTotals {
        SummaryTotals {
            generated_at_utc: utc_timestamp(),
            model: model.to_string(),
            input_path: input_path.to_string(),
            files_processed: self.files_processed,
            files_failed: self.files_failed,
            records_total: self.records_total(),
            totals: self.totals,
            records_invalid_skipped: self.records_invalid_skipped,
            files_skipped_by_limit: 0,
        }
    }

    /// Write `summary.csv` and `summary_totals.json` into `dir`.
    pub fn write(
        &self,
        dir: &Path,
        model: &str,
        input_path: &str,
    ) -> Result<SummaryTotals, StoreError> {
        fs::create_dir_all(dir).map_err(StoreError::io(dir))?;

        // Both files are staged first; the CSV marks the group complete, so
        // it is renamed into place last.
        let csv_path = OutputLayout::summary_csv(dir);
        let csv_staging = partial_path(&csv_path);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&csv_staging)?;
        writer.write_record(SUMMARY_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(StoreError::io(&csv_staging))?;
        drop(writer);

        let totals = self.to_totals(model, input_path);
        let json_path = OutputLayout::summary_totals(dir);
        let json_staging = partial_path(&json_path);
        fs::write(&json_staging, serde_json::to_string_pretty(&totals)?)
            .map_err(StoreError::io(&json_staging))?;

        fs::rename(&json_staging, &json_path).map_err(StoreError::io(&json_path))?;
        fs::rename(&csv_staging, &csv_path).map_err(StoreError::io(&csv_path))?;

        info!(
            dir = %dir.display(),
            files_processed = totals.files_processed,
            files_failed = totals.files_failed,
            records = totals.records_total,
            "wrote summary"
        );
        Ok(totals)
    }
}
