mod discover;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use sirex_ai::{Extractor, GeminiClient};
use sirex_batch::{BatchConfig, BatchRunner, RunOutcome, group_by_top_folder};
use sirex_core::normalize_model_name;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sirex", version)]
#[command(about = "Extract structured incident records from SIR PDF reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records from a PDF file or a folder of PDFs
    Extract(ExtractArgs),

    /// Flatten extracted artifacts into sir_records.csv
    Report {
        #[arg(long, default_value = "analysis_output")]
        input_dir: PathBuf,
        #[arg(long, default_value = "output_csv")]
        output_dir: PathBuf,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// PDF file or folder containing PDFs
    input: PathBuf,

    #[arg(long, default_value = "gemini-2.5-flash")]
    model: String,

    #[arg(long, default_value = "analysis_output")]
    output_dir: PathBuf,

    /// Glob matched against the full path or the file name (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    #[arg(long, default_value_t = 4.0)]
    min_seconds_between_calls: f64,

    /// Call the service even when a document artifact already exists
    #[arg(long)]
    no_skip_existing: bool,

    #[arg(long, default_value = "prompts/extract_sir.txt")]
    prompt_path: PathBuf,

    /// Revisit groups that already have a summary.csv
    #[arg(long)]
    no_skip_completed_groups: bool,

    /// Stop after this many new documents (0 = no limit)
    #[arg(long, default_value_t = 0)]
    max_new_files: u64,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the Gemini API endpoint
    #[arg(long)]
    api_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Extract(args) => extract(args).await,
        Commands::Report {
            input_dir,
            output_dir,
        } => report(&input_dir, &output_dir),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn extract(args: ExtractArgs) -> anyhow::Result<ExitCode> {
    let min_interval = Duration::try_from_secs_f64(args.min_seconds_between_calls)
        .context("--min-seconds-between-calls must be a non-negative number")?;
    let Some(api_key) = args.api_key.filter(|k| !k.trim().is_empty()) else {
        bail!("missing GEMINI_API_KEY (set the variable or pass --api-key)");
    };

    let patterns = discover::compile_patterns(&args.exclude)?;
    let targets = discover::read_pdf_targets(&args.input)?;
    let targets = discover::apply_exclusions(targets, &patterns);
    if targets.is_empty() {
        bail!("no .pdf files found in {}", args.input.display());
    }

    let model = normalize_model_name(&args.model).to_string();
    let mut client = GeminiClient::new(api_key, &model);
    if let Some(url) = args.api_base_url {
        client = client.with_base_url(url);
    }

    let groups = group_by_top_folder(&targets, &args.input);
    let config = BatchConfig {
        skip_existing: !args.no_skip_existing,
        skip_completed_groups: !args.no_skip_completed_groups,
        max_new_files: args.max_new_files,
        min_interval,
        ..BatchConfig::new(
            &args.output_dir,
            args.input.display().to_string(),
            &args.prompt_path,
        )
    };

    info!(
        documents = targets.len(),
        groups = groups.len(),
        model = %model,
        output = %args.output_dir.display(),
        "starting extraction"
    );
    let runner = BatchRunner::new(Extractor::new(client), config);

    let outcome = runner.run(&groups).await.context("writing summaries")?;
    if let RunOutcome::Completed(report) = &outcome
        && report.failed()
    {
        warn!(
            files_failed = report.summary.files_failed(),
            "completed with failures"
        );
    }
    Ok(ExitCode::from(exit_status(&outcome)))
}

/// Process exit status for a finished run: 1 when any document failed.
fn exit_status(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::NothingToDo { .. } => 0,
        RunOutcome::Completed(report) if report.failed() => 1,
        RunOutcome::Completed(_) => 0,
    }
}

fn report(input_dir: &Path, output_dir: &Path) -> anyhow::Result<ExitCode> {
    let stats = sirex_store::write_report(input_dir, output_dir)
        .with_context(|| format!("flattening artifacts under {}", input_dir.display()))?;
    if stats.artifacts_read == 0 {
        warn!(input = %input_dir.display(), "no readable artifacts found");
    }
    info!(path = %stats.path.display(), rows = stats.rows_written, "report written");
    Ok(ExitCode::SUCCESS)
}
