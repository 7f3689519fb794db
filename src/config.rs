use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "finance-tracker";

#[derive(Parser, Debug)]
#[command(name = "finance-tracker", about = "Track assets, liabilities and budget items")]
pub struct CliArgs {
    /// Path to config file (defaults to <data dir>/finance-tracker/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Database file (overrides config file)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive terminal UI (default)
    Tui,
    /// Print net worth and budget totals
    Summary,
    /// Write balance sheet, budget and history CSV files into a directory
    Export { dir: PathBuf },
    /// Fold the flat asset/liability tables into the balance sheet
    MigrateLegacy,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default = "default_preferences")]
    pub preferences: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Log file used while the TUI owns the terminal
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_database() -> PathBuf {
    data_dir().join("finance.db")
}

fn default_preferences() -> PathBuf {
    data_dir().join("settings.json")
}

fn default_log_file() -> PathBuf {
    data_dir().join("finance-tracker.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database: default_database(),
            preferences: default_preferences(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
            file: default_log_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Config file (if present) with CLI overrides applied on top
    pub fn load(cli: &CliArgs) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir().join("config.toml"));

        let mut config = Self::from_file(&path)?;

        if let Some(ref database) = cli.database {
            config.storage.database = database.clone();
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        Ok(config)
    }

    /// Missing file means defaults; a malformed one is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read config file {}", path.display())),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
