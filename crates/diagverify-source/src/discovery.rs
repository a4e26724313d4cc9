use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "build", "__pycache__"];

/// Finds fixture files with the given extension under `root`, sorted by path.
///
/// A `root` that is itself a file is returned as-is, whatever its extension.
pub fn discover_fixtures(root: &Path, extension: &str) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let extension = extension.trim_start_matches('.');
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_str().unwrap_or("");
            if e.depth() > 0 && name.starts_with('.') {
                return false;
            }
            !(e.file_type().is_dir() && SKIPPED_DIRS.contains(&name))
        })
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == extension)
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    debug!("discovered {} fixtures under {}", files.len(), root.display());
    files
}
