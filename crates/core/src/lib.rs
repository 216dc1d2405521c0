mod apply;
mod config;
mod convert;
mod exif_reader;
mod metadata;
mod naming;
mod planner;
mod runner;
mod sanitize;
mod scanner;
mod timestamp;

pub use apply::{copy_preserving_times, preserve_file_times};
pub use config::{
    app_paths, load_config, load_config_from, save_config, AppConfig, AppPaths, NamingConfig,
    DEFAULT_CONVERT_QUALITY, DEFAULT_CONVERTER_PROGRAM, DEFAULT_RENAME_PREFIX,
};
pub use convert::{convert_file, ConvertError, ConverterOptions};
pub use metadata::{ResolvedTimestamp, SourceFile, TimestampSource};
pub use naming::{candidate_file_name, date_tree_subpath, format_timestamp};
pub use planner::{DestinationPlanner, PlannedDestination};
pub use runner::{run_batch, FileOutcome, OutcomeStatus, RunMode, RunOptions, RunSummary};
pub use sanitize::normalize_extension;
pub use scanner::collect_files;
pub use timestamp::{TimeOffset, TimestampError, TimestampResolver, TimestampStrategy};
