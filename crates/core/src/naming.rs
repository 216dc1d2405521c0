use crate::sanitize::{truncate_to_bytes, MAX_FILENAME_BYTES};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::path::PathBuf;

pub fn format_timestamp(taken_at: &NaiveDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        taken_at.year(),
        taken_at.month(),
        taken_at.day(),
        taken_at.hour(),
        taken_at.minute(),
        taken_at.second()
    )
}

pub fn date_tree_subpath(taken_at: &NaiveDateTime) -> PathBuf {
    let mut path = PathBuf::from(format!("{:04}", taken_at.year()));
    path.push(format!("{:02}", taken_at.month()));
    path
}

// Counter 0 is the bare `<base>_<timestamp>.<ext>` candidate. The base is cut
// so the whole name stays within MAX_FILENAME_BYTES.
pub fn candidate_file_name(base: &str, timestamp: &str, counter: usize, extension: &str) -> String {
    let tail = if counter == 0 {
        format!("_{}.{}", timestamp, extension)
    } else {
        format!("_{}_{}.{}", timestamp, counter, extension)
    };
    let base = truncate_to_bytes(base, MAX_FILENAME_BYTES.saturating_sub(tail.len()));
    format!("{}{}", base, tail)
}
