use crate::timestamp::TimestampError;
use chrono::{DateTime, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifDates {
    pub date_time_original: Option<String>,
    pub date_time: Option<String>,
}

/// Reads the EXIF date tags of `path`.
///
/// `Ok(None)` means the container was readable but carries no EXIF block, so
/// callers may fall back to another source. A file that is not a supported
/// image container is an error.
pub fn read_exif_dates(path: &Path) -> Result<Option<ExifDates>, TimestampError> {
    let file = File::open(path).map_err(|source| TimestampError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buf = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut buf) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(source) => {
            return Err(TimestampError::Exif {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    Ok(Some(ExifDates {
        date_time_original: find_field_value(&exif, Tag::DateTimeOriginal),
        date_time: find_field_value(&exif, Tag::DateTime),
    }))
}

fn find_field_value(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let raw = match field.value {
        Value::Ascii(ref values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).to_string())?,
        _ => field.display_value().to_string(),
    };
    normalize(raw)
}

fn normalize(value: String) -> Option<String> {
    let trimmed = value.trim_matches(char::from(0)).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_exif_date(input: &str) -> Option<NaiveDateTime> {
    let normalized = input.trim();

    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    for fmt in candidates {
        if let Ok(naive) = NaiveDateTime::parse_from_str(normalized, fmt) {
            return Some(naive);
        }
    }

    // Offsets are dropped: the wall-clock time is what names the file.
    for fmt in ["%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(normalized, fmt) {
            return Some(dt.naive_local());
        }
    }

    None
}
