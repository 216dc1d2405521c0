use crate::exif_reader::{parse_exif_date, read_exif_dates, ExifDates};
use crate::metadata::{ResolvedTimestamp, SourceFile, TimestampSource};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to open {}: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("failed to read EXIF from {}: {source}", .path.display())]
    Exif { path: PathBuf, source: exif::Error },
    #[error("unparseable EXIF {tag} in {}: {raw:?}", .path.display())]
    InvalidExifDate {
        path: PathBuf,
        tag: &'static str,
        raw: String,
    },
    #[error("no timestamp source available for {}", .path.display())]
    NoSource { path: PathBuf },
    #[error("offset of {offset_secs}s moves {taken_at} out of the supported range")]
    OffsetOutOfRange {
        taken_at: NaiveDateTime,
        offset_secs: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStrategy {
    ExifDateTimeOriginal,
    ExifDateTime,
    FileModified,
}

impl TimestampStrategy {
    fn source(self) -> TimestampSource {
        match self {
            Self::ExifDateTimeOriginal => TimestampSource::ExifDateTimeOriginal,
            Self::ExifDateTime => TimestampSource::ExifDateTime,
            Self::FileModified => TimestampSource::FileModified,
        }
    }
}

/// Tries each strategy in order. A strategy that finds its source but cannot
/// parse it ends the search with an error instead of falling through.
#[derive(Debug, Clone)]
pub struct TimestampResolver {
    strategies: Vec<TimestampStrategy>,
}

impl TimestampResolver {
    pub fn new(strategies: Vec<TimestampStrategy>) -> Self {
        Self { strategies }
    }

    pub fn file_modified_only() -> Self {
        Self::new(vec![TimestampStrategy::FileModified])
    }

    pub fn image_aware() -> Self {
        Self::new(vec![
            TimestampStrategy::ExifDateTimeOriginal,
            TimestampStrategy::ExifDateTime,
            TimestampStrategy::FileModified,
        ])
    }

    pub fn resolve(&self, file: &SourceFile) -> Result<ResolvedTimestamp, TimestampError> {
        let mut exif_cache: Option<Option<ExifDates>> = None;

        for &strategy in &self.strategies {
            let found = match strategy {
                TimestampStrategy::ExifDateTimeOriginal | TimestampStrategy::ExifDateTime => {
                    if exif_cache.is_none() {
                        exif_cache = Some(read_exif_dates(&file.path)?);
                    }
                    let dates = exif_cache.as_ref().and_then(Option::as_ref);
                    exif_timestamp(file, dates, strategy)?
                }
                TimestampStrategy::FileModified => file.modified,
            };

            if let Some(taken_at) = found {
                return Ok(ResolvedTimestamp {
                    source: strategy.source(),
                    taken_at,
                });
            }
        }

        Err(TimestampError::NoSource {
            path: file.path.clone(),
        })
    }
}

fn exif_timestamp(
    file: &SourceFile,
    dates: Option<&ExifDates>,
    strategy: TimestampStrategy,
) -> Result<Option<NaiveDateTime>, TimestampError> {
    let (tag, raw) = match strategy {
        TimestampStrategy::ExifDateTimeOriginal => (
            "DateTimeOriginal",
            dates.and_then(|d| d.date_time_original.as_deref()),
        ),
        TimestampStrategy::ExifDateTime => {
            ("DateTime", dates.and_then(|d| d.date_time.as_deref()))
        }
        TimestampStrategy::FileModified => return Ok(None),
    };

    let Some(raw) = raw else {
        return Ok(None);
    };

    parse_exif_date(raw)
        .map(Some)
        .ok_or_else(|| TimestampError::InvalidExifDate {
            path: file.path.clone(),
            tag,
            raw: raw.to_string(),
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffset {
    pub seconds: i64,
}

impl TimeOffset {
    pub fn from_parts(hours: i64, minutes: i64, seconds: i64) -> Option<Self> {
        let total = hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)?;
        Some(Self { seconds: total })
    }

    pub fn apply(&self, taken_at: NaiveDateTime) -> Result<NaiveDateTime, TimestampError> {
        let out_of_range = || TimestampError::OffsetOutOfRange {
            taken_at,
            offset_secs: self.seconds,
        };
        let delta = TimeDelta::try_seconds(self.seconds).ok_or_else(out_of_range)?;
        taken_at.checked_add_signed(delta).ok_or_else(out_of_range)
    }
}

impl ResolvedTimestamp {
    pub fn shifted(self, offset: TimeOffset) -> Result<Self, TimestampError> {
        Ok(Self {
            source: self.source,
            taken_at: offset.apply(self.taken_at)?,
        })
    }
}
