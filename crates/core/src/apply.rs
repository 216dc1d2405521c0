use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;
    debug!(dir = %dir.display(), "directory created");
    Ok(())
}

pub fn copy_preserving_times(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        ensure_dir(parent)?;
    }

    if let Err(err) = fs::copy(source, destination) {
        remove_partial_output(destination);
        return Err(anyhow::Error::from(err).context(format!(
            "failed to copy {} -> {}",
            source.display(),
            destination.display()
        )));
    }

    if let Err(err) = preserve_file_times(source, destination) {
        remove_partial_output(destination);
        return Err(err);
    }
    Ok(())
}

pub fn preserve_file_times(source: &Path, destination: &Path) -> Result<()> {
    let metadata = fs::metadata(source)
        .with_context(|| format!("failed to stat {}", source.display()))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(destination, mtime, mtime)
        .with_context(|| format!("failed to set file times on {}", destination.display()))?;
    Ok(())
}

// Only called for destinations the planner found free before the write.
pub fn remove_partial_output(destination: &Path) {
    if destination.is_file() {
        let _ = fs::remove_file(destination);
    }
}
