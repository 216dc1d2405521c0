use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub fn collect_files(root: &Path, extension: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    if recursive {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if has_extension(entry.path(), extension) {
                debug!(path = %entry.path().display(), "found file");
                out.push(entry.into_path());
            }
        }
    } else {
        for entry in
            fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?
        {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", root.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if has_extension(&path, extension) {
                debug!(path = %path.display(), "found file");
                out.push(path);
            }
        }
    }

    out.sort();
    Ok(out)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
