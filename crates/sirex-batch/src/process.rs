//! Per-document processing: resume from an artifact or extract a fresh one.

use std::path::{Path, PathBuf};

use sirex_ai::{EnrichmentService, Extractor};
use sirex_core::{BatchOutput, normalize_model_name, validate_payload};
use sirex_store::{OutputLayout, read_artifact, write_artifact};
use tracing::{info, warn};

use crate::error::ProcessError;
use crate::prompt::PromptSource;

/// Result of processing one document.
#[derive(Debug, Clone)]
pub struct Processed {
    pub artifact: PathBuf,
    pub output: BatchOutput,
    /// Loaded from an earlier run's artifact; no external call was made.
    pub from_cache: bool,
}

/// Process one document into `group_dir`.
///
/// With `skip_existing` set and an artifact already present, the artifact is
/// returned verbatim. Otherwise the document goes through the extractor, the
/// payload is validated, and a fresh artifact is written. The artifact is
/// only written once validation has finished.
pub async fn process_file<S: EnrichmentService>(
    extractor: &Extractor<S>,
    document: &Path,
    group_dir: &Path,
    skip_existing: bool,
    prompt: &PromptSource,
) -> Result<Processed, ProcessError> {
    let artifact = OutputLayout::artifact_path(group_dir, document);

    if skip_existing && artifact.exists() {
        info!(artifact = %artifact.display(), "artifact exists, reusing");
        let output = read_artifact(&artifact)?;
        return Ok(Processed {
            artifact,
            output,
            from_cache: true,
        });
    }

    let prompt_text = prompt.load().await?;
    let payload = extractor.extract(document, &prompt_text).await?;
    let validated = validate_payload(&payload)?;

    if validated.rejected > 0 {
        warn!(
            document = %document.display(),
            rejected = validated.rejected,
            diagnostics = %validated.diagnostics.join(" | "),
            "skipped non-SIR or invalid records"
        );
    }

    let output = BatchOutput::new(
        document.display().to_string(),
        normalize_model_name(extractor.model()),
        validated.records,
        validated.rejected,
    );
    write_artifact(&artifact, &output)?;

    Ok(Processed {
        artifact,
        output,
        from_cache: false,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sirex_ai::RetryPolicy;
    use sirex_ai::testing::ScriptedService;

    use super::*;

    const REPLY: &str = r#"```json
{"records": [
  {"sir_id": "SIR 12345/2024", "dead_confirmed": 3, "dead_possible_min": 2,
   "evidenza_testuale": "tre corpi", "confidenza": "Alta", "evidence_pages": [1]},
  {"sir_id": "12346/2024", "lat": "33°N", "evidence_quote": "x", "confidence": "low"},
  {"sir_id": "no id here", "evidence_quote": "x", "confidence": "low"}
]}
```"#;

    struct Fixture {
        _tmp: tempfile::TempDir,
        out: PathBuf,
        prompt: PromptSource,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::TempDir::new().unwrap();
        let prompt_path = tmp.path().join("prompt.txt");
        fs::write(&prompt_path, "extract SIR records").unwrap();
        Fixture {
            out: tmp.path().join("out"),
            prompt: PromptSource::new(prompt_path),
            _tmp: tmp,
        }
    }

    fn extractor(service: ScriptedService) -> Extractor<ScriptedService> {
        Extractor::new(service.with_model("gemini/gemini-2.5-flash"))
            .with_retry(RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn fresh_document_is_validated_and_persisted() {
        let fx = fixture();
        let ex = extractor(ScriptedService::new().with_default_reply(REPLY));
        let doc = PathBuf::from("in/2024/report.pdf");

        let processed = process_file(&ex, &doc, &fx.out, true, &fx.prompt)
            .await
            .unwrap();

        assert!(!processed.from_cache);
        assert_eq!(processed.artifact, fx.out.join("report.extracted.json"));
        assert!(processed.artifact.exists());
        let output = &processed.output;
        assert_eq!(output.model, "gemini-2.5-flash");
        assert_eq!(output.source_file, "in/2024/report.pdf");
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].sir_id, "12345/2024");
        assert_eq!(output.records_invalid_skipped, 2);
        assert_eq!(output.totals.dead_confirmed_total, 3);
        assert_eq!(output.totals.dead_possible_total_max, 2);
    }

    #[tokio::test]
    async fn existing_artifact_is_reused_without_calls() {
        let fx = fixture();
        let doc = PathBuf::from("in/report.pdf");
        let first = extractor(ScriptedService::new().with_default_reply(REPLY));
        let original = process_file(&first, &doc, &fx.out, true, &fx.prompt)
            .await
            .unwrap();
        let bytes = fs::read(&original.artifact).unwrap();

        let second = extractor(ScriptedService::new());
        let resumed = process_file(&second, &doc, &fx.out, true, &fx.prompt)
            .await
            .unwrap();

        assert!(resumed.from_cache);
        assert_eq!(second.service().stage_count(), 0);
        assert_eq!(resumed.output, original.output);
        assert_eq!(fs::read(&resumed.artifact).unwrap(), bytes);
    }

    #[tokio::test]
    async fn skip_existing_off_calls_again() {
        let fx = fixture();
        let doc = PathBuf::from("in/report.pdf");
        let ex = extractor(ScriptedService::new().with_default_reply(REPLY));
        process_file(&ex, &doc, &fx.out, false, &fx.prompt).await.unwrap();
        process_file(&ex, &doc, &fx.out, false, &fx.prompt).await.unwrap();
        assert_eq!(ex.service().infer_count(), 2);
    }

    #[tokio::test]
    async fn records_not_an_array_fails_without_artifact() {
        let fx = fixture();
        let ex = extractor(ScriptedService::new().with_default_reply(r#"{"records": {}}"#));
        let doc = PathBuf::from("in/report.pdf");
        let err = process_file(&ex, &doc, &fx.out, true, &fx.prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Payload(_)));
        assert!(!OutputLayout::artifact_path(&fx.out, &doc).exists());
    }

    #[tokio::test]
    async fn unparseable_reply_fails_without_artifact() {
        let fx = fixture();
        let ex = extractor(ScriptedService::new().with_default_reply("I could not read it"));
        let doc = PathBuf::from("in/report.pdf");
        let err = process_file(&ex, &doc, &fx.out, true, &fx.prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Enrich(_)));
        assert_eq!(ex.service().infer_count(), 1);
        assert!(!fx.out.exists());
    }
}
