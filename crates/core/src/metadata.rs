use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimestampSource {
    ExifDateTimeOriginal,
    ExifDateTime,
    FileModified,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub source: TimestampSource,
    pub taken_at: NaiveDateTime,
}

// mtime is captured once, as local wall-clock time.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub modified: Option<NaiveDateTime>,
}

impl SourceFile {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            modified: file_modified_to_local(path),
        }
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "untitled".to_string())
    }
}

fn file_modified_to_local(path: &Path) -> Option<NaiveDateTime> {
    let time = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(time).naive_local())
}
