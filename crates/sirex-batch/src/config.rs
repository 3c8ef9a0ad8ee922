//! Run options carried into the orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// Input path as given by the user, written into summary totals.
    pub input_label: String,
    /// Prompt file, read before every external call.
    pub prompt_path: PathBuf,
    /// Reuse a document's artifact instead of calling the service again.
    pub skip_existing: bool,
    /// Skip whole groups whose summary table already exists.
    pub skip_completed_groups: bool,
    /// Budget of new external calls for the run; zero means unlimited.
    pub max_new_files: u64,
    /// Minimum wait before every external call after the first.
    pub min_interval: Duration,
}

impl BatchConfig {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        input_label: impl Into<String>,
        prompt_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            input_label: input_label.into(),
            prompt_path: prompt_path.into(),
            skip_existing: true,
            skip_completed_groups: true,
            max_new_files: 0,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }

    /// Incremental mode is active whenever a call budget is set.
    pub fn incremental(&self) -> bool {
        self.max_new_files > 0
    }

    /// Resolve conflicting options.
    ///
    /// Incremental runs leave groups partially processed, so a group summary
    /// cannot mean "complete" and group skipping is switched off.
    pub fn normalized(mut self) -> Self {
        if self.incremental() && self.skip_completed_groups {
            info!(
                max_new_files = self.max_new_files,
                "call budget set, disabling completed-group skip for incremental processing"
            );
            self.skip_completed_groups = false;
        }
        self
    }
}
