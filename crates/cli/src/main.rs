use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use imgstamp_core::{
    app_paths, load_config, normalize_extension, run_batch, save_config, AppConfig,
    ConverterOptions, NamingConfig, OutcomeStatus, RunMode, RunOptions, RunSummary, TimeOffset,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "imgstamp", version)]
#[command(about = "Copies or converts images into timestamp-based file names")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Name files by their modification time.
    RenameFiles(RenameArgs),
    /// Name images by EXIF capture time, falling back to modification time.
    RenameImages(RenameArgs),
    /// Convert HEIC files to JPEG with heif-convert.
    ConvertHeic(ConvertArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Write a config file with the default values.
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    #[arg(long = "input_dir")]
    input_dir: Option<PathBuf>,
    /// Defaults to the input directory.
    #[arg(long = "output_dir")]
    output_dir: Option<PathBuf>,
    /// Leading part of the new names: <prefix>_<YYYYMMDD_HHMMSS>.<ext>
    #[arg(long)]
    prefix: Option<String>,
    #[arg(long, default_value_t = false)]
    verbose: bool,
    /// Place files under <output_dir>/YYYY/MM.
    #[arg(long = "create_tree", default_value_t = false)]
    create_tree: bool,
    #[arg(long = "no_recursive", default_value_t = false)]
    no_recursive: bool,
    /// Skip files whose name is already taken instead of adding a counter.
    #[arg(long = "skip_duplicates", default_value_t = false)]
    skip_duplicates: bool,
    #[arg(long = "dry_run", default_value_t = false)]
    dry_run: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value = "jpg")]
    ext: String,
    #[arg(long = "add_seconds", default_value_t = 0, allow_negative_numbers = true)]
    add_seconds: i64,
    #[arg(long = "add_minutes", default_value_t = 0, allow_negative_numbers = true)]
    add_minutes: i64,
    #[arg(long = "add_hours", default_value_t = 0, allow_negative_numbers = true)]
    add_hours: i64,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value = "HEIC")]
    ext: String,
    /// JPEG quality 0-100.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::RenameFiles(args) => cmd_rename(args, RunMode::RenameFiles),
        Commands::RenameImages(args) => cmd_rename(args, RunMode::RenameImages),
        Commands::ConvertHeic(args) => cmd_convert(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init { force } => cmd_config_init(force),
        },
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "imgstamp=debug"
    } else {
        "imgstamp=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_rename(args: RenameArgs, mode: RunMode) -> Result<()> {
    init_logging(args.common.verbose);
    let config = load_config()?;

    let offset = TimeOffset::from_parts(args.add_hours, args.add_minutes, args.add_seconds)
        .context("time offset is too large")?;
    let extension = parse_extension(&args.ext)?;
    let prefix = args
        .common
        .prefix
        .clone()
        .unwrap_or_else(|| config.rename_prefix.clone());

    let naming = NamingConfig {
        prefix: Some(prefix),
        extension: extension.clone(),
        create_tree: args.common.create_tree,
        offset,
        skip_duplicates: args.common.skip_duplicates,
    };

    run(&args.common, &config, extension, naming, mode)
}

fn cmd_convert(args: ConvertArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let config = load_config()?;

    let converter = ConverterOptions {
        program: config.converter_program.clone(),
        leading_args: config.converter_args.clone(),
        quality: args.quality.unwrap_or(config.convert_quality),
        timeout: Duration::from_secs(config.converter_timeout_secs),
    };
    let naming = NamingConfig {
        prefix: args.common.prefix.clone(),
        extension: "jpg".to_string(),
        create_tree: args.common.create_tree,
        offset: TimeOffset::default(),
        skip_duplicates: args.common.skip_duplicates,
    };

    let source_extension = parse_extension(&args.ext)?;
    run(
        &args.common,
        &config,
        source_extension,
        naming,
        RunMode::ConvertHeic(converter),
    )
}

fn parse_extension(raw: &str) -> Result<String> {
    match normalize_extension(raw) {
        Some(ext) => Ok(ext),
        None => bail!("invalid extension: {raw:?}"),
    }
}

fn run(
    common: &CommonArgs,
    config: &AppConfig,
    source_extension: String,
    naming: NamingConfig,
    mode: RunMode,
) -> Result<()> {
    let Some(input_dir) = common.input_dir.clone() else {
        bail!("no --input_dir specified");
    };

    let options = RunOptions {
        input_dir,
        output_dir: common.output_dir.clone(),
        source_extension,
        recursive: !common.no_recursive && config.recursive_default,
        naming,
        mode,
        dry_run: common.dry_run,
        show_progress: !common.verbose && common.output == OutputFormat::Table,
    };

    let summary = run_batch(&options)?;

    match common.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => print_table(&summary, common.verbose),
    }

    if common.dry_run {
        eprintln!("dry run: no files were written. Drop --dry_run to apply.");
    }
    info!(
        copied = summary.copied,
        skipped = summary.skipped,
        errors = summary.errors,
        "run finished"
    );

    Ok(())
}

fn print_table(summary: &RunSummary, verbose: bool) {
    for outcome in &summary.outcomes {
        let show = verbose
            || matches!(
                outcome.status,
                OutcomeStatus::Planned | OutcomeStatus::Failed
            );
        if !show {
            continue;
        }
        let destination = outcome
            .destination
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        match &outcome.error {
            Some(error) => println!(
                "{} -> {} ({:?}: {})",
                outcome.source.display(),
                destination,
                outcome.status,
                error
            ),
            None => println!(
                "{} -> {} ({:?})",
                outcome.source.display(),
                destination,
                outcome.status
            ),
        }
    }

    println!("total discovered files: {}", summary.discovered);
    if summary.planned > 0 {
        println!("total planned files: {}", summary.planned);
    }
    println!("total copied files: {}", summary.copied);
    println!("total skipped files: {}", summary.skipped);
    println!("total error files: {}", summary.errors);
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(force: bool) -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() && !force {
        bail!(
            "config file already exists: {} (use --force to overwrite)",
            paths.config_path.display()
        );
    }
    let path = save_config(&AppConfig::default())?;
    println!("config file written: {}", path.display());
    Ok(())
}
