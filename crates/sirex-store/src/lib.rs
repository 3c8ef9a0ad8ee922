pub mod artifact;
pub mod error;
pub mod layout;
pub mod report;
pub mod summary;

pub use artifact::{read_artifact, write_artifact};
pub use error::StoreError;
pub use layout::{ARTIFACT_SUFFIX, OutputLayout, ROOT_GROUP};
pub use report::{ReportStats, find_artifacts, write_report};
pub use summary::{SUMMARY_COLUMNS, Summary, SummaryRow, SummaryTotals};
