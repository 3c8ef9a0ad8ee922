//! Partition documents by top-level input folder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sirex_store::ROOT_GROUP;

/// Documents keyed by group, both in sorted order.
pub type Groups = BTreeMap<String, Vec<PathBuf>>;

/// Group documents by the first component of their path relative to
/// `input_root`. Documents directly under the root, and every document when
/// the input is a single file, land in [`ROOT_GROUP`].
pub fn group_by_top_folder(targets: &[PathBuf], input_root: &Path) -> Groups {
    let mut groups = Groups::new();
    if input_root.is_file() {
        let mut docs = targets.to_vec();
        docs.sort();
        groups.insert(ROOT_GROUP.to_string(), docs);
        return groups;
    }

    for target in targets {
        let group = relative_to(target, input_root)
            .and_then(|rel| {
                let mut parts = rel.components();
                let first = parts.next()?;
                parts
                    .next()
                    .is_some()
                    .then(|| first.as_os_str().to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| ROOT_GROUP.to_string());
        groups.entry(group).or_default().push(target.clone());
    }
    for docs in groups.values_mut() {
        docs.sort();
    }
    groups
}

fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }
    let path = path.canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}
