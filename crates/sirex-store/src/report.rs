//! Flatten every per-document artifact under an output tree into one table.
//!
//! Artifacts are read leniently: missing top-level fields become empty
//! cells and unreadable files are skipped with a warning, so one damaged
//! artifact never blocks the report.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::layout::ARTIFACT_SUFFIX;

pub const REPORT_FILE: &str = "sir_records.csv";

const PROVENANCE_COLUMNS: [&str; 6] = [
    "record_uid",
    "batch",
    "source_file",
    "record_index",
    "model",
    "generated_at_utc",
];

const RECORD_COLUMNS: [&str; 24] = [
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
    "context_note",
    "libyan_coast_guard_involved",
    "evidence_quote",
    "confidence",
    "evidence_pages",
];

#[derive(Debug, Deserialize)]
struct ArtifactView {
    #[serde(default)]
    source_file: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    generated_at_utc: Option<String>,
    #[serde(default)]
    records: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStats {
    pub path: PathBuf,
    pub artifacts_read: usize,
    pub artifacts_skipped: usize,
    pub rows_written: usize,
}

/// All artifact paths under `root`, sorted.
pub fn find_artifacts(root: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let pattern = format!(
        "{}/**/*{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        ARTIFACT_SUFFIX
    );
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable path"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Write `sir_records.csv` into `output_dir` from the artifacts under `input_dir`.
pub fn write_report(input_dir: &Path, output_dir: &Path) -> Result<ReportStats, StoreError> {
    let artifacts = find_artifacts(input_dir)?;
    fs::create_dir_all(output_dir).map_err(StoreError::io(output_dir))?;

    let path = output_dir.join(REPORT_FILE);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(PROVENANCE_COLUMNS.iter().chain(RECORD_COLUMNS.iter()))?;

    let mut stats = ReportStats {
        path: path.clone(),
        artifacts_read: 0,
        artifacts_skipped: 0,
        rows_written: 0,
    };

    for artifact in &artifacts {
        let view = match load_view(artifact) {
            Ok(view) => view,
            Err(e) => {
                warn!(path = %artifact.display(), error = %e, "skipping artifact");
                stats.artifacts_skipped += 1;
                continue;
            }
        };
        stats.artifacts_read += 1;

        let batch = artifact
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for (index, record) in view.records.iter().enumerate() {
            let Some(fields) = record.as_object() else {
                warn!(path = %artifact.display(), index, "skipping non-object record");
                continue;
            };
            stats.rows_written += 1;
            let mut row = vec![
                stats.rows_written.to_string(),
                batch.clone(),
                view.source_file.clone().unwrap_or_default(),
                index.to_string(),
                view.model.clone().unwrap_or_default(),
                view.generated_at_utc.clone().unwrap_or_default(),
            ];
            row.extend(RECORD_COLUMNS.iter().map(|c| cell(fields.get(*c))));
            writer.write_record(&row)?;
        }
    }
    writer.flush().map_err(StoreError::io(&path))?;

    info!(
        path = %path.display(),
        artifacts = stats.artifacts_read,
        skipped = stats.artifacts_skipped,
        rows = stats.rows_written,
        "wrote report"
    );
    Ok(stats)
}

fn load_view(path: &Path) -> Result<ArtifactView, StoreError> {
    let text = fs::read_to_string(path).map_err(StoreError::io(path))?;
    serde_json::from_str(&text).map_err(|source| StoreError::InvalidArtifact {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a JSON value as a CSV cell.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| cell(Some(v)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sirex_core::{BatchOutput, Record};

    use super::*;
    use crate::artifact::write_artifact;

    fn output(source: &str, sir_ids: &[&str]) -> BatchOutput {
        let records: Vec<Record> = sir_ids
            .iter()
            .map(|id| {
                serde_json::from_value(json!({
                    "sir_id": id,
                    "lat": 33.25,
                    "dead_confirmed": 2,
                    "evidence_quote": "quote",
                    "confidence": "medium",
                    "evidence_pages": [2, 4],
                }))
                .unwrap()
            })
            .collect();
        BatchOutput::new(source, "gemini-2.5-flash", records, 0)
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<csv::StringRecord>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader.records().map(Result::unwrap).collect();
        (headers, rows)
    }

    #[test]
    fn flattens_artifacts_in_sorted_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("analysis_output");
        write_artifact(
            &input.join("2025").join("b.extracted.json"),
            &output("in/2025/b.pdf", &["20000/2025"]),
        )
        .unwrap();
        write_artifact(
            &input.join("2024").join("a.extracted.json"),
            &output("in/2024/a.pdf", &["10000/2024", "10001/2024"]),
        )
        .unwrap();

        let stats = write_report(&input, &tmp.path().join("csv")).unwrap();
        assert_eq!(stats.artifacts_read, 2);
        assert_eq!(stats.rows_written, 3);

        let (headers, rows) = read_rows(&stats.path);
        assert_eq!(headers.len(), 30);
        assert_eq!(&headers[..6], &PROVENANCE_COLUMNS);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][1], "2024");
        assert_eq!(&rows[0][3], "0");
        assert_eq!(&rows[0][6], "10000/2024");
        assert_eq!(&rows[1][3], "1");
        assert_eq!(&rows[2][0], "3");
        assert_eq!(&rows[2][1], "2025");
        assert_eq!(&rows[2][3], "0");

        let lat = headers.iter().position(|h| h == "lat").unwrap();
        let pages = headers.iter().position(|h| h == "evidence_pages").unwrap();
        let possible = headers.iter().position(|h| h == "dead_possible_min").unwrap();
        assert_eq!(&rows[0][lat], "33.25");
        assert_eq!(&rows[0][pages], "2,4");
        assert_eq!(&rows[0][possible], "");
    }

    #[test]
    fn damaged_artifacts_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("out");
        write_artifact(&input.join("good.extracted.json"), &output("good.pdf", &["1/2"])).unwrap();
        fs::write(input.join("bad.extracted.json"), "not json").unwrap();
        fs::write(input.join("unrelated.json"), "{}").unwrap();

        let stats = write_report(&input, &tmp.path().join("csv")).unwrap();
        assert_eq!(stats.artifacts_read, 1);
        assert_eq!(stats.artifacts_skipped, 1);
        assert_eq!(stats.rows_written, 1);
    }

    #[test]
    fn lenient_view_tolerates_missing_fields() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(
            input.join("partial.extracted.json"),
            r#"{"records": [{"sir_id": "12345/2024", "confidence": "low"}, "stray"]}"#,
        )
        .unwrap();

        let stats = write_report(&input, &tmp.path().join("csv")).unwrap();
        assert_eq!(stats.rows_written, 1);
        let (_, rows) = read_rows(&stats.path);
        assert_eq!(&rows[0][1], "out");
        assert_eq!(&rows[0][2], "");
        assert_eq!(&rows[0][6], "12345/2024");
    }

    #[test]
    fn empty_tree_writes_header_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let stats = write_report(&tmp.path().join("missing"), &tmp.path().join("csv")).unwrap();
        assert_eq!(stats.rows_written, 0);
        let (headers, rows) = read_rows(&stats.path);
        assert_eq!(headers.len(), 30);
        assert!(rows.is_empty());
    }

    #[test]
    fn cells_render_scalars_and_lists() {
        assert_eq!(cell(None), "");
        assert_eq!(cell(Some(&Value::Null)), "");
        assert_eq!(cell(Some(&json!(true))), "true");
        assert_eq!(cell(Some(&json!(12))), "12");
        assert_eq!(cell(Some(&json!([1, "x", null]))), "1,x,");
    }
}
