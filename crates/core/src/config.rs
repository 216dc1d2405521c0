use crate::metadata::SourceFile;
use crate::sanitize::sanitize_base_name;
use crate::timestamp::TimeOffset;
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_RENAME_PREFIX: &str = "IMG";
pub const DEFAULT_CONVERT_QUALITY: u8 = 95;
pub const DEFAULT_CONVERTER_PROGRAM: &str = "heif-convert";
pub const DEFAULT_CONVERTER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamingConfig {
    // Falls back to the source stem when unset or blank.
    pub prefix: Option<String>,
    pub extension: String,
    pub create_tree: bool,
    pub offset: TimeOffset,
    pub skip_duplicates: bool,
}

impl NamingConfig {
    pub fn base_name_for(&self, file: &SourceFile) -> String {
        match self.prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => sanitize_base_name(prefix),
            _ => sanitize_base_name(&file.stem()),
        }
    }
}

// Command-line flags win over these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub rename_prefix: String,
    pub convert_quality: u8,
    pub converter_program: String,
    pub converter_args: Vec<String>,
    pub converter_timeout_secs: u64,
    pub recursive_default: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rename_prefix: DEFAULT_RENAME_PREFIX.to_string(),
            convert_quality: DEFAULT_CONVERT_QUALITY,
            converter_program: DEFAULT_CONVERTER_PROGRAM.to_string(),
            converter_args: Vec::new(),
            converter_timeout_secs: DEFAULT_CONVERTER_TIMEOUT_SECS,
            recursive_default: true,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.convert_quality > 100 {
            bail!(
                "convert_quality must be between 0 and 100, got {}",
                self.convert_quality
            );
        }
        if self.converter_program.trim().is_empty() {
            bail!("converter_program must not be empty");
        }
        if self.converter_timeout_secs == 0 {
            bail!("converter_timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("org", "imgstamp", "imgstamp")
        .context("could not determine the OS config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)?;
    Ok(paths.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    config.validate()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create config directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("could not serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("could not write config file: {}", path.display()))?;
    Ok(())
}
