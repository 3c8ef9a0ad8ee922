//! Local document discovery and exclusion.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use glob::Pattern;

/// Resolve the input path to a sorted list of PDF documents.
pub fn read_pdf_targets(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !input.exists() {
        bail!("input path not found: {}", input.display());
    }
    if input.is_file() {
        let is_pdf = input
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            bail!("input file must be .pdf: {}", input.display());
        }
        return Ok(vec![input.to_path_buf()]);
    }

    let pattern = format!("{}/**/*.pdf", Pattern::escape(&input.to_string_lossy()));
    let mut targets = Vec::new();
    for entry in glob::glob(&pattern).context("building discovery pattern")? {
        let path = entry.context("reading input directory")?;
        if path.is_file() {
            targets.push(path);
        }
    }
    targets.sort();
    Ok(targets)
}

/// Compile `--exclude` patterns.
pub fn compile_patterns(raw: &[String]) -> anyhow::Result<Vec<Pattern>> {
    raw.iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid --exclude pattern {p:?}")))
        .collect()
}

/// A path is excluded when a pattern matches the full path or any run of
/// its trailing components, so `2023/*.pdf` excludes `in/2023/a.pdf` and
/// `a.pdf` matches by file name.
pub fn should_exclude(path: &Path, patterns: &[Pattern]) -> bool {
    let components: Vec<_> = path.components().collect();
    let suffixes: Vec<PathBuf> = (0..components.len())
        .map(|start| components[start..].iter().collect())
        .collect();
    patterns
        .iter()
        .any(|p| p.matches_path(path) || suffixes.iter().any(|s| p.matches_path(s)))
}

pub fn apply_exclusions(targets: Vec<PathBuf>, patterns: &[Pattern]) -> Vec<PathBuf> {
    if patterns.is_empty() {
        return targets;
    }
    targets
        .into_iter()
        .filter(|t| !should_exclude(t, patterns))
        .collect()
}
