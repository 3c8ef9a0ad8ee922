//! Group/batch orchestrator.
//!
//! Visits groups in key order and documents in path order, one external
//! call at a time. Per-document failures are counted and logged, never
//! propagated; only summary persistence can fail the run itself.

use std::path::{Path, PathBuf};

use sirex_ai::{EnrichmentService, Extractor};
use sirex_core::normalize_model_name;
use sirex_store::{OutputLayout, ROOT_GROUP, Summary};
use tracing::{debug, error, info};

use crate::config::BatchConfig;
use crate::error::ProcessError;
use crate::group::Groups;
use crate::process::process_file;
use crate::prompt::PromptSource;
use crate::state::RunState;

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// No group had any document to process or load.
    NothingToDo { incremental: bool },
    Completed(RunReport),
}

/// Run-wide results.
#[derive(Debug)]
pub struct RunReport {
    pub summary: Summary,
    pub state: RunState,
    pub groups_with_activity: usize,
    /// Whether a run-wide summary was written to the output root.
    pub wrote_run_summary: bool,
}

impl RunReport {
    /// A run fails when any document failed anywhere.
    pub fn failed(&self) -> bool {
        self.summary.files_failed() > 0
    }
}

pub struct BatchRunner<S> {
    extractor: Extractor<S>,
    config: BatchConfig,
    layout: OutputLayout,
    prompt: PromptSource,
}

impl<S: EnrichmentService> BatchRunner<S> {
    pub fn new(extractor: Extractor<S>, config: BatchConfig) -> Self {
        let config = config.normalized();
        Self {
            layout: OutputLayout::new(&config.output_dir),
            prompt: PromptSource::new(&config.prompt_path),
            extractor,
            config,
        }
    }

    pub fn extractor(&self) -> &Extractor<S> {
        &self.extractor
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn model(&self) -> &str {
        normalize_model_name(self.extractor.model())
    }

    fn group_input_label(&self, group: &str) -> String {
        if group == ROOT_GROUP {
            self.config.input_label.clone()
        } else {
            format!("{}/{group}", self.config.input_label)
        }
    }

    pub async fn run(&self, groups: &Groups) -> Result<RunOutcome, ProcessError> {
        let incremental = self.config.incremental();
        let mut state = RunState::new(self.config.max_new_files);
        let mut run = Summary::new();
        let mut groups_with_activity = 0;

        for (group, documents) in groups {
            let group_dir = self.layout.group_dir(group);

            if self.config.skip_existing
                && self.config.skip_completed_groups
                && OutputLayout::is_group_complete(&group_dir)
            {
                info!(
                    group = %group,
                    summary = %OutputLayout::summary_csv(&group_dir).display(),
                    "skipping completed group"
                );
                continue;
            }

            let summary = self
                .run_group(group, documents, &group_dir, &mut state)
                .await;

            if summary.has_activity() {
                groups_with_activity += 1;
                if !incremental {
                    summary.write(&group_dir, self.model(), &self.group_input_label(group))?;
                }
                run.merge(&summary);
            }

            if state.is_halted() {
                break;
            }
        }

        if groups_with_activity == 0 {
            if incremental {
                info!("incremental batch: no new files found");
            } else {
                info!("nothing to process: all groups already have a summary");
            }
            return Ok(RunOutcome::NothingToDo { incremental });
        }

        let mut wrote_run_summary = false;
        if incremental {
            info!(
                processed = run.files_processed(),
                budget = self.config.max_new_files,
                failed = run.files_failed(),
                "incremental batch done"
            );
        } else if groups.len() > 1 || !groups.contains_key(ROOT_GROUP) {
            run.write(self.layout.root(), self.model(), &self.config.input_label)?;
            wrote_run_summary = true;
        }

        info!(
            files_processed = run.files_processed(),
            files_failed = run.files_failed(),
            records = run.records_total(),
            calls = state.calls_made(),
            "run finished"
        );

        Ok(RunOutcome::Completed(RunReport {
            summary: run,
            state,
            groups_with_activity,
            wrote_run_summary,
        }))
    }

    async fn run_group(
        &self,
        group: &str,
        documents: &[PathBuf],
        group_dir: &Path,
        state: &mut RunState,
    ) -> Summary {
        let incremental = self.config.incremental();
        let mut summary = Summary::new();

        for document in documents {
            let artifact = OutputLayout::artifact_path(group_dir, document);
            let needs_call = !(self.config.skip_existing && artifact.exists());

            if incremental && !needs_call {
                debug!(document = %document.display(), "already processed");
                continue;
            }

            if needs_call && state.budget_exhausted() {
                info!(
                    group = %group,
                    budget = state.budget().unwrap_or_default(),
                    "call budget reached, halting run"
                );
                state.halt();
                break;
            }

            if needs_call {
                if state.needs_pacing() && !self.config.min_interval.is_zero() {
                    info!(
                        wait_secs = self.config.min_interval.as_secs_f64(),
                        "pacing before next call"
                    );
                    tokio::time::sleep(self.config.min_interval).await;
                    state.record_wait();
                }
            }

            let result = process_file(
                &self.extractor,
                document,
                group_dir,
                self.config.skip_existing,
                &self.prompt,
            )
            .await;

            let reached_service = result
                .as_ref()
                .map_or_else(ProcessError::reached_service, |p| !p.from_cache);
            if needs_call && reached_service {
                state.record_attempt();
            }

            match result {
                Ok(processed) => {
                    if !processed.from_cache {
                        state.record_call();
                    }
                    info!(
                        document = %document.display(),
                        artifact = %processed.artifact.display(),
                        records = processed.output.records.len(),
                        "ok"
                    );
                    summary.add_output(&processed.output);
                }
                Err(e) => {
                    error!(document = %document.display(), error = %e, "document failed");
                    summary.add_failure();
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use sirex_ai::RetryPolicy;
    use sirex_ai::testing::ScriptedService;
    use sirex_core::BatchOutput;
    use sirex_store::write_artifact;

    use super::*;

    const REPLY: &str = r#"{"records": [
        {"sir_id": "12345/2024", "dead_confirmed": 2, "dead_possible_min": 1,
         "dead_possible_max": 3, "evidence_quote": "two bodies", "confidence": "alta"}
    ]}"#;

    struct Fixture {
        tmp: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::TempDir::new().unwrap();
            fs::write(tmp.path().join("prompt.txt"), "extract").unwrap();
            Self { tmp }
        }

        fn out(&self) -> PathBuf {
            self.tmp.path().join("out")
        }

        fn config(&self) -> BatchConfig {
            BatchConfig {
                min_interval: Duration::ZERO,
                ..BatchConfig::new(self.out(), "in", self.tmp.path().join("prompt.txt"))
            }
        }

        fn runner(&self, service: ScriptedService, config: BatchConfig) -> BatchRunner<ScriptedService> {
            let extractor = Extractor::new(service.with_default_reply(REPLY))
                .with_retry(RetryPolicy::immediate(3));
            BatchRunner::new(extractor, config)
        }
    }

    fn groups(layout: &[(&str, &[&str])]) -> Groups {
        layout
            .iter()
            .map(|(group, docs)| {
                let docs = docs
                    .iter()
                    .map(|d| {
                        if *group == ROOT_GROUP {
                            PathBuf::from(format!("in/{d}"))
                        } else {
                            PathBuf::from(format!("in/{group}/{d}"))
                        }
                    })
                    .collect();
                (group.to_string(), docs)
            })
            .collect()
    }

    fn completed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("expected a completed run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn budget_halts_across_group_boundaries() {
        let fx = Fixture::new();
        let config = BatchConfig {
            max_new_files: 2,
            ..fx.config()
        };
        let runner = fx.runner(ScriptedService::new(), config);
        let groups = groups(&[
            ("a", &["a1.pdf"]),
            ("b", &["b1.pdf", "b2.pdf", "b3.pdf"]),
            ("c", &["c1.pdf"]),
        ]);

        let report = completed(runner.run(&groups).await.unwrap());

        let service = runner.extractor().service();
        assert_eq!(service.infer_count(), 2);
        assert_eq!(service.staged_files(), vec!["a1.pdf", "b1.pdf"]);
        assert!(report.state.is_halted());
        assert_eq!(report.summary.files_processed(), 2);
        assert!(!report.wrote_run_summary);
        assert!(!OutputLayout::is_group_complete(&fx.out().join("a")));
        assert!(!fx.out().join("c").exists());
    }

    #[tokio::test]
    async fn structural_failure_is_isolated() {
        let fx = Fixture::new();
        let service = ScriptedService::new().with_replies("d2.pdf", vec![Ok("no json at all".into())]);
        let runner = fx.runner(service, fx.config());
        let groups = groups(&[("2024", &["d1.pdf", "d2.pdf", "d3.pdf"])]);

        let report = completed(runner.run(&groups).await.unwrap());

        assert_eq!(report.summary.files_failed(), 1);
        assert_eq!(report.summary.files_processed(), 2);
        assert!(report.failed());
        assert_eq!(
            runner.extractor().service().staged_files(),
            vec!["d1.pdf", "d2.pdf", "d3.pdf"]
        );
        assert!(OutputLayout::is_group_complete(&fx.out().join("2024")));
        assert!(report.wrote_run_summary);
    }

    #[tokio::test]
    async fn completed_group_is_skipped() {
        let fx = Fixture::new();
        let group_dir = fx.out().join("2024");
        fs::create_dir_all(&group_dir).unwrap();
        fs::write(OutputLayout::summary_csv(&group_dir), "source_file\n").unwrap();
        let runner = fx.runner(ScriptedService::new(), fx.config());

        let outcome = runner
            .run(&groups(&[("2024", &["d1.pdf", "d2.pdf"])]))
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NothingToDo { incremental: false }));
        assert_eq!(runner.extractor().service().stage_count(), 0);
    }

    #[tokio::test]
    async fn resumed_run_makes_no_calls_and_matches_totals() {
        let fx = Fixture::new();
        let groups = groups(&[("2024", &["d1.pdf", "d2.pdf"]), ("2025", &["d3.pdf"])]);
        let config = BatchConfig {
            skip_completed_groups: false,
            ..fx.config()
        };

        let first = completed(fx.runner(ScriptedService::new(), config.clone()).run(&groups).await.unwrap());
        let runner = fx.runner(ScriptedService::new(), config);
        let second = completed(runner.run(&groups).await.unwrap());

        assert_eq!(runner.extractor().service().stage_count(), 0);
        assert_eq!(second.state.calls_made(), 0);
        assert_eq!(second.summary.totals(), first.summary.totals());
        assert_eq!(second.summary.records_total(), 3);
        assert_eq!(second.summary.totals().dead_confirmed_total, 6);
        assert_eq!(second.summary.totals().dead_possible_total_max, 9);
    }

    #[tokio::test]
    async fn every_call_after_the_first_is_paced() {
        let fx = Fixture::new();
        let config = BatchConfig {
            min_interval: Duration::from_millis(1),
            ..fx.config()
        };
        let runner = fx.runner(
            ScriptedService::new().with_failing_stage("d2.pdf"),
            config.clone(),
        );
        let groups = groups(&[("2024", &["d1.pdf", "d2.pdf"]), ("2025", &["d3.pdf"])]);

        let report = completed(runner.run(&groups).await.unwrap());
        assert_eq!(report.state.calls_attempted(), 3);
        assert_eq!(report.state.waits(), 2);

        let resumed = completed(
            fx.runner(ScriptedService::new(), BatchConfig {
                skip_completed_groups: false,
                ..config
            })
            .run(&groups)
            .await
            .unwrap(),
        );
        assert_eq!(resumed.state.calls_attempted(), 1);
        assert_eq!(resumed.state.waits(), 0);
    }

    #[tokio::test]
    async fn prompt_failures_do_not_count_as_calls() {
        let fx = Fixture::new();
        let config = BatchConfig {
            prompt_path: fx.tmp.path().join("missing_prompt.txt"),
            min_interval: Duration::from_millis(1),
            ..fx.config()
        };
        let runner = fx.runner(ScriptedService::new(), config);

        let report = completed(
            runner
                .run(&groups(&[("2024", &["d1.pdf", "d2.pdf", "d3.pdf"])]))
                .await
                .unwrap(),
        );

        assert_eq!(report.summary.files_failed(), 3);
        assert_eq!(report.state.calls_attempted(), 0);
        assert_eq!(report.state.waits(), 0);
        assert_eq!(runner.extractor().service().stage_count(), 0);
    }

    #[tokio::test]
    async fn incremental_mode_skips_processed_files_and_writes_no_summaries() {
        let fx = Fixture::new();
        let existing = BatchOutput::new("in/2024/d1.pdf", "scripted-model", vec![], 0);
        write_artifact(&fx.out().join("2024").join("d1.extracted.json"), &existing).unwrap();
        let config = BatchConfig {
            max_new_files: 5,
            ..fx.config()
        };
        let runner = fx.runner(ScriptedService::new(), config);

        let report = completed(
            runner
                .run(&groups(&[("2024", &["d1.pdf", "d2.pdf"])]))
                .await
                .unwrap(),
        );

        assert_eq!(runner.extractor().service().staged_files(), vec!["d2.pdf"]);
        assert_eq!(report.summary.files_processed(), 1);
        assert!(!report.state.is_halted());
        assert!(!OutputLayout::is_group_complete(&fx.out().join("2024")));
        assert!(!OutputLayout::is_group_complete(&fx.out()));
    }

    #[tokio::test]
    async fn incremental_with_nothing_new_is_nothing_to_do() {
        let fx = Fixture::new();
        let existing = BatchOutput::new("in/d1.pdf", "scripted-model", vec![], 0);
        write_artifact(&fx.out().join("d1.extracted.json"), &existing).unwrap();
        let config = BatchConfig {
            max_new_files: 1,
            ..fx.config()
        };
        let runner = fx.runner(ScriptedService::new(), config);

        let outcome = runner.run(&groups(&[(ROOT_GROUP, &["d1.pdf"])])).await.unwrap();
        assert!(matches!(outcome, RunOutcome::NothingToDo { incremental: true }));
    }

    #[tokio::test]
    async fn flat_input_writes_only_the_root_summary() {
        let fx = Fixture::new();
        let runner = fx.runner(ScriptedService::new().with_model("gemini/gemini-2.5-pro"), fx.config());

        let report = completed(
            runner
                .run(&groups(&[(ROOT_GROUP, &["d1.pdf", "d2.pdf"])]))
                .await
                .unwrap(),
        );

        assert!(!report.wrote_run_summary);
        assert!(OutputLayout::is_group_complete(&fx.out()));
        let totals: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(OutputLayout::summary_totals(&fx.out())).unwrap(),
        )
        .unwrap();
        assert_eq!(totals["input_path"], "in");
        assert_eq!(totals["model"], "gemini-2.5-pro");
        assert_eq!(totals["files_processed"], 2);
        assert_eq!(totals["records_total"], 2);
    }

    #[tokio::test]
    async fn group_summary_uses_group_input_label() {
        let fx = Fixture::new();
        let runner = fx.runner(ScriptedService::new(), fx.config());
        completed(runner.run(&groups(&[("2024", &["d1.pdf"])])).await.unwrap());

        let totals: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(OutputLayout::summary_totals(&fx.out().join("2024"))).unwrap(),
        )
        .unwrap();
        assert_eq!(totals["input_path"], "in/2024");
        assert!(OutputLayout::is_group_complete(&fx.out()));
    }
}
