use crate::apply::{copy_preserving_times, ensure_dir, preserve_file_times, remove_partial_output};
use crate::config::NamingConfig;
use crate::convert::{convert_file, ConverterOptions};
use crate::metadata::{ResolvedTimestamp, SourceFile};
use crate::planner::DestinationPlanner;
use crate::scanner::collect_files;
use crate::timestamp::TimestampResolver;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum RunMode {
    RenameFiles,
    RenameImages,
    ConvertHeic(ConverterOptions),
}

impl RunMode {
    pub fn resolver(&self) -> TimestampResolver {
        match self {
            Self::RenameImages => TimestampResolver::image_aware(),
            Self::RenameFiles | Self::ConvertHeic(_) => TimestampResolver::file_modified_only(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub source_extension: String,
    pub recursive: bool,
    pub naming: NamingConfig,
    pub mode: RunMode,
    pub dry_run: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutcomeStatus {
    Copied,
    Converted,
    Skipped,
    Planned,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub status: OutcomeStatus,
    pub timestamp: Option<ResolvedTimestamp>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub discovered: usize,
    // Written by copy or conversion.
    pub copied: usize,
    pub skipped: usize,
    pub errors: usize,
    pub planned: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            OutcomeStatus::Copied | OutcomeStatus::Converted => self.copied += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Planned => self.planned += 1,
            OutcomeStatus::Failed => self.errors += 1,
        }
        self.outcomes.push(outcome);
    }
}

// Per-file failures land in the summary; only run-level problems are errors.
pub fn run_batch(options: &RunOptions) -> Result<RunSummary> {
    let input_dir = validate_input_dir(&options.input_dir)?;
    let output_dir = match &options.output_dir {
        Some(dir) => absolute(dir)?,
        None => input_dir.clone(),
    };

    if !options.dry_run && !output_dir.exists() {
        ensure_dir(&output_dir)?;
        info!(dir = %output_dir.display(), "directory created");
    }

    let files = collect_files(&input_dir, &options.source_extension, options.recursive)?;
    let resolver = options.mode.resolver();
    let mut planner = DestinationPlanner::new(&output_dir, options.naming.clone());
    let mut summary = RunSummary {
        input_dir,
        output_dir,
        discovered: files.len(),
        ..RunSummary::default()
    };

    let progress = progress_bar(files.len() as u64, options.show_progress);
    for path in &files {
        let outcome = process_file(path, options, &resolver, &mut planner);
        if let Some(error) = outcome.error.as_deref() {
            progress.suspend(|| warn!(source = %path.display(), "failure: {error}"));
        }
        summary.record(outcome);
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(summary)
}

fn validate_input_dir(input_dir: &Path) -> Result<PathBuf> {
    if input_dir.as_os_str().is_empty() {
        bail!("no input directory specified");
    }
    let path = absolute(input_dir)?;
    if !path.is_dir() {
        bail!("not a directory: {}", path.display());
    }
    fs::canonicalize(&path).with_context(|| format!("failed to resolve {}", path.display()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("failed to read the current directory")?;
    Ok(cwd.join(path))
}

fn process_file(
    path: &Path,
    options: &RunOptions,
    resolver: &TimestampResolver,
    planner: &mut DestinationPlanner,
) -> FileOutcome {
    let file = SourceFile::open(path);
    let timestamp = match resolver
        .resolve(&file)
        .and_then(|resolved| resolved.shifted(options.naming.offset))
    {
        Ok(timestamp) => timestamp,
        Err(err) => return failed(path, None, None, err.to_string()),
    };

    let planned = planner.plan(&file, &timestamp.taken_at);
    if planned.skipped {
        debug!(
            source = %path.display(),
            destination = %planned.path.display(),
            "skip"
        );
        return FileOutcome {
            source: path.to_path_buf(),
            destination: Some(planned.path),
            status: OutcomeStatus::Skipped,
            timestamp: Some(timestamp),
            error: None,
        };
    }

    if options.dry_run {
        planner.commit(&planned.path);
        return FileOutcome {
            source: path.to_path_buf(),
            destination: Some(planned.path),
            status: OutcomeStatus::Planned,
            timestamp: Some(timestamp),
            error: None,
        };
    }

    let (result, status) = match &options.mode {
        RunMode::ConvertHeic(converter) => (
            convert_preserving_times(converter, path, &planned.path),
            OutcomeStatus::Converted,
        ),
        RunMode::RenameFiles | RunMode::RenameImages => (
            copy_preserving_times(path, &planned.path),
            OutcomeStatus::Copied,
        ),
    };

    match result {
        Ok(()) => {
            planner.commit(&planned.path);
            debug!(
                source = %path.display(),
                destination = %planned.path.display(),
                ?status,
                "done"
            );
            FileOutcome {
                source: path.to_path_buf(),
                destination: Some(planned.path),
                status,
                timestamp: Some(timestamp),
                error: None,
            }
        }
        Err(err) => failed(
            path,
            Some(planned.path),
            Some(timestamp),
            format!("{err:#}"),
        ),
    }
}

fn convert_preserving_times(
    converter: &ConverterOptions,
    source: &Path,
    destination: &Path,
) -> Result<()> {
    if let Some(parent) = destination.parent() {
        ensure_dir(parent)?;
    }
    convert_file(converter, source, destination)?;
    if let Err(err) = preserve_file_times(source, destination) {
        remove_partial_output(destination);
        return Err(err);
    }
    Ok(())
}

fn failed(
    path: &Path,
    destination: Option<PathBuf>,
    timestamp: Option<ResolvedTimestamp>,
    error: String,
) -> FileOutcome {
    FileOutcome {
        source: path.to_path_buf(),
        destination,
        status: OutcomeStatus::Failed,
        timestamp,
        error: Some(error),
    }
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} files {msg}") {
        pb.set_style(style);
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::{run_batch, OutcomeStatus, RunMode, RunOptions};
    use crate::config::NamingConfig;
    use crate::exif_reader::fixtures::jpeg_with_exif;
    use crate::metadata::TimestampSource;
    use crate::sanitize::MAX_FILENAME_BYTES;
    use crate::timestamp::TimeOffset;
    use chrono::{Local, NaiveDate, TimeZone};
    use exif::Tag;
    use filetime::FileTime;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn set_local_mtime(path: &Path, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> FileTime {
        let naive = NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|v| v.and_hms_opt(h, mi, s))
            .expect("valid date");
        let local = Local
            .from_local_datetime(&naive)
            .single()
            .expect("unambiguous local time");
        let ft = FileTime::from_unix_time(local.timestamp(), 0);
        filetime::set_file_mtime(path, ft).expect("set mtime");
        ft
    }

    fn mtime_of(path: &Path) -> FileTime {
        FileTime::from_last_modification_time(&fs::metadata(path).expect("stat"))
    }

    fn options(input: &Path, output: &Path, mode: RunMode) -> RunOptions {
        RunOptions {
            input_dir: input.to_path_buf(),
            output_dir: Some(output.to_path_buf()),
            source_extension: "jpg".to_string(),
            recursive: true,
            naming: NamingConfig {
                prefix: Some("bla".to_string()),
                extension: "jpg".to_string(),
                create_tree: false,
                offset: TimeOffset::default(),
                skip_duplicates: false,
            },
            mode,
            dry_run: false,
            show_progress: false,
        }
    }

    fn dirs() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(&input).expect("mkdir");
        (temp, input, output)
    }

    #[test]
    fn offset_moves_the_name_back_one_day() {
        let (_temp, input, output) = dirs();
        let source = input.join("IMG_0001.jpg");
        fs::write(&source, b"pixels").expect("write");
        let original_mtime = set_local_mtime(&source, 2021, 6, 1, 10, 0, 0);

        let mut opts = options(&input, &output, RunMode::RenameFiles);
        opts.naming.offset = TimeOffset::from_parts(-24, 0, 0).expect("in range");
        let summary = run_batch(&opts).expect("run");

        let expected = output.join("bla_20210531_100000.jpg");
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(fs::read(&expected).expect("read"), b"pixels");
        assert_eq!(mtime_of(&expected), original_mtime);
        assert!(source.exists());
    }

    #[test]
    fn same_timestamp_gets_counter_suffix() {
        let (_temp, input, output) = dirs();
        for name in ["a.jpg", "b.jpg"] {
            let path = input.join(name);
            fs::write(&path, name.as_bytes()).expect("write");
            set_local_mtime(&path, 2021, 5, 31, 10, 0, 0);
        }

        let summary = run_batch(&options(&input, &output, RunMode::RenameFiles)).expect("run");

        assert_eq!(summary.copied, 2);
        assert_eq!(
            fs::read(output.join("bla_20210531_100000.jpg")).expect("first"),
            b"a.jpg"
        );
        assert_eq!(
            fs::read(output.join("bla_20210531_100000_1.jpg")).expect("second"),
            b"b.jpg"
        );
    }

    #[test]
    fn skip_duplicates_never_writes_the_collision() {
        let (_temp, input, output) = dirs();
        for name in ["a.jpg", "b.jpg"] {
            let path = input.join(name);
            fs::write(&path, name.as_bytes()).expect("write");
            set_local_mtime(&path, 2021, 5, 31, 10, 0, 0);
        }

        let mut opts = options(&input, &output, RunMode::RenameFiles);
        opts.naming.skip_duplicates = true;
        let summary = run_batch(&opts).expect("run");

        assert_eq!(summary.copied, 1);
        assert_eq!(summary.skipped, 1);
        let written: Vec<_> = fs::read_dir(&output)
            .expect("read out")
            .flatten()
            .map(|e| e.file_name())
            .collect();
        assert_eq!(written.len(), 1);
        assert!(!output.join("bla_20210531_100000_1.jpg").exists());
    }

    #[test]
    fn create_tree_uses_offset_adjusted_month() {
        let (_temp, input, output) = dirs();
        let source = input.join("IMG_0001.jpg");
        fs::write(&source, b"x").expect("write");
        set_local_mtime(&source, 2021, 6, 1, 10, 0, 0);

        let mut opts = options(&input, &output, RunMode::RenameFiles);
        opts.naming.create_tree = true;
        opts.naming.offset = TimeOffset::from_parts(-24, 0, 0).expect("in range");
        let summary = run_batch(&opts).expect("run");

        let destination = summary.outcomes[0]
            .destination
            .clone()
            .expect("destination");
        assert_eq!(
            destination,
            output.join("2021").join("05").join("bla_20210531_100000.jpg")
        );
        assert!(destination.exists());
    }

    #[test]
    fn image_mode_counts_errors_and_keeps_going() {
        let (_temp, input, output) = dirs();
        fs::write(input.join("a_broken.jpg"), b"not an image").expect("write");
        fs::write(
            input.join("b_good.jpg"),
            jpeg_with_exif(&[(Tag::DateTimeOriginal, "2020:01:02 03:04:05")]),
        )
        .expect("write");

        let summary = run_batch(&options(&input, &output, RunMode::RenameImages)).expect("run");

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.outcomes[0].status, OutcomeStatus::Failed);
        assert!(summary.outcomes[0].error.is_some());
        let good = &summary.outcomes[1];
        assert_eq!(
            good.timestamp.map(|t| t.source),
            Some(TimestampSource::ExifDateTimeOriginal)
        );
        assert!(output.join("bla_20200102_030405.jpg").exists());
    }

    #[test]
    fn dry_run_plans_distinct_names_without_writing() {
        let (_temp, input, output) = dirs();
        for name in ["a.jpg", "b.jpg"] {
            let path = input.join(name);
            fs::write(&path, b"x").expect("write");
            set_local_mtime(&path, 2021, 5, 31, 10, 0, 0);
        }

        let mut opts = options(&input, &output, RunMode::RenameFiles);
        opts.dry_run = true;
        let summary = run_batch(&opts).expect("run");

        assert_eq!(summary.planned, 2);
        assert_eq!(summary.copied, 0);
        assert_ne!(
            summary.outcomes[0].destination,
            summary.outcomes[1].destination
        );
        assert!(!output.exists());
    }

    #[test]
    fn output_defaults_to_input_directory() {
        let (_temp, input, _output) = dirs();
        let source = input.join("IMG_0001.jpg");
        fs::write(&source, b"x").expect("write");
        set_local_mtime(&source, 2021, 6, 1, 10, 0, 0);

        let mut opts = options(&input, &input, RunMode::RenameFiles);
        opts.output_dir = None;
        let summary = run_batch(&opts).expect("run");

        assert_eq!(summary.copied, 1);
        assert!(input.join("bla_20210601_100000.jpg").exists());
    }

    #[test]
    fn missing_input_directory_aborts_the_run() {
        let (_temp, input, output) = dirs();
        let err = run_batch(&options(&input.join("gone"), &output, RunMode::RenameFiles))
            .expect_err("must fail");
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn summary_serializes_for_json_output() {
        let (_temp, input, output) = dirs();
        let source = input.join("IMG_0001.jpg");
        fs::write(&source, b"x").expect("write");
        set_local_mtime(&source, 2021, 6, 1, 10, 0, 0);

        let summary = run_batch(&options(&input, &output, RunMode::RenameFiles)).expect("run");
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["copied"], 1);
        assert_eq!(json["outcomes"][0]["status"], "Copied");
        assert_eq!(
            json["outcomes"][0]["timestamp"]["source"],
            "FileModified"
        );
    }

    #[cfg(unix)]
    #[test]
    fn convert_mode_names_by_stem_and_keeps_mtime() {
        use crate::convert::ConverterOptions;
        use std::time::Duration;

        let (temp, input, output) = dirs();
        let script = temp.path().join("convert.sh");
        fs::write(&script, "cp \"$3\" \"$4\"\n").expect("write script");
        let source = input.join("IMG_0001.HEIC");
        fs::write(&source, b"heic").expect("write");
        let original_mtime = set_local_mtime(&source, 2022, 3, 4, 5, 6, 7);

        let mut opts = options(
            &input,
            &output,
            RunMode::ConvertHeic(ConverterOptions {
                program: "sh".to_string(),
                leading_args: vec![script.to_string_lossy().to_string()],
                quality: 95,
                timeout: Duration::from_secs(10),
            }),
        );
        opts.source_extension = "HEIC".to_string();
        opts.naming.prefix = None;
        opts.naming.create_tree = true;
        let summary = run_batch(&opts).expect("run");

        let expected = output
            .join("2022")
            .join("03")
            .join("IMG_0001_20220304_050607.jpg");
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.outcomes[0].status, OutcomeStatus::Converted);
        assert_eq!(mtime_of(&expected), original_mtime);
    }

    #[cfg(unix)]
    #[test]
    fn failed_conversion_is_counted_not_fatal() {
        use crate::convert::ConverterOptions;
        use std::time::Duration;

        let (temp, input, output) = dirs();
        let script = temp.path().join("convert.sh");
        fs::write(&script, "exit 1\n").expect("write script");
        let source = input.join("IMG_0001.heic");
        fs::write(&source, b"heic").expect("write");

        let mut opts = options(
            &input,
            &output,
            RunMode::ConvertHeic(ConverterOptions {
                program: "sh".to_string(),
                leading_args: vec![script.to_string_lossy().to_string()],
                quality: 95,
                timeout: Duration::from_secs(10),
            }),
        );
        opts.source_extension = "heic".to_string();
        let summary = run_batch(&opts).expect("run");

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.copied, 0);
    }

    #[cfg(unix)]
    #[test]
    fn conversion_output_is_removed_when_times_cannot_be_kept() {
        use crate::convert::ConverterOptions;
        use std::time::Duration;

        let (temp, input, output) = dirs();
        let script = temp.path().join("convert.sh");
        fs::write(&script, "cp \"$3\" \"$4\"\nrm \"$3\"\n").expect("write script");
        let source = input.join("IMG_0001.heic");
        fs::write(&source, b"heic").expect("write");
        set_local_mtime(&source, 2022, 3, 4, 5, 6, 7);

        let mut opts = options(
            &input,
            &output,
            RunMode::ConvertHeic(ConverterOptions {
                program: "sh".to_string(),
                leading_args: vec![script.to_string_lossy().to_string()],
                quality: 95,
                timeout: Duration::from_secs(10),
            }),
        );
        opts.source_extension = "heic".to_string();
        opts.naming.prefix = None;
        let summary = run_batch(&opts).expect("run");

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.copied, 0);
        assert!(!output.join("IMG_0001_20220304_050607.jpg").exists());
        let leftovers = fs::read_dir(&output).expect("read out").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn long_multibyte_stem_still_fits_the_name_budget() {
        let (_temp, input, output) = dirs();
        let stem = "写".repeat(80);
        let source = input.join(format!("{stem}.jpg"));
        fs::write(&source, b"x").expect("write");
        set_local_mtime(&source, 2021, 5, 31, 10, 0, 0);

        let mut opts = options(&input, &output, RunMode::RenameFiles);
        opts.naming.prefix = None;
        let summary = run_batch(&opts).expect("run");

        assert_eq!(summary.errors, 0);
        assert_eq!(summary.copied, 1);
        let destination = summary.outcomes[0]
            .destination
            .clone()
            .expect("destination");
        let name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .expect("utf-8 name");
        assert!(name.len() <= MAX_FILENAME_BYTES);
        assert!(name.ends_with("_20210531_100000.jpg"));
        assert!(destination.exists());
    }
}
