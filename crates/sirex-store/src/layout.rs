//! Output directory layout.
//!
//! ```text
//! <root>/
//!   <stem>.extracted.json        documents of the "." group
//!   summary.csv                  run summary (or "." group summary)
//!   summary_totals.json
//!   <group>/
//!     <stem>.extracted.json
//!     summary.csv                group completion marker
//!     summary_totals.json
//! ```

use std::path::{Path, PathBuf};

/// Group key for documents directly under the input root.
pub const ROOT_GROUP: &str = ".";

pub const ARTIFACT_SUFFIX: &str = ".extracted.json";
pub const SUMMARY_CSV: &str = "summary.csv";
pub const SUMMARY_TOTALS: &str = "summary_totals.json";

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output directory of a group: the root itself for [`ROOT_GROUP`].
    pub fn group_dir(&self, group: &str) -> PathBuf {
        if group == ROOT_GROUP {
            self.root.clone()
        } else {
            self.root.join(group)
        }
    }

    /// Per-document artifact path: `<group_dir>/<stem>.extracted.json`.
    pub fn artifact_path(group_dir: &Path, document: &Path) -> PathBuf {
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        group_dir.join(format!("{stem}{ARTIFACT_SUFFIX}"))
    }

    pub fn summary_csv(dir: &Path) -> PathBuf {
        dir.join(SUMMARY_CSV)
    }

    pub fn summary_totals(dir: &Path) -> PathBuf {
        dir.join(SUMMARY_TOTALS)
    }

    /// A group whose summary table exists was fully processed by an earlier run.
    pub fn is_group_complete(group_dir: &Path) -> bool {
        Self::summary_csv(group_dir).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_group_maps_to_root() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.group_dir(ROOT_GROUP), PathBuf::from("out"));
        assert_eq!(layout.group_dir("2024"), PathBuf::from("out/2024"));
    }

    #[test]
    fn artifact_uses_document_stem() {
        let path = OutputLayout::artifact_path(Path::new("out/2024"), Path::new("in/2024/SIR 12345.pdf"));
        assert_eq!(path, PathBuf::from("out/2024/SIR 12345.extracted.json"));
    }

    #[test]
    fn group_completion_follows_summary_presence() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(!OutputLayout::is_group_complete(tmp.path()));
        std::fs::write(OutputLayout::summary_csv(tmp.path()), "source_file\n").unwrap();
        assert!(OutputLayout::is_group_complete(tmp.path()));
    }
}
