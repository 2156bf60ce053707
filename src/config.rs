use std::{fs::read_to_string, path::{Path, PathBuf}, time::Duration};

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use colored::Colorize;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::time::ElapsedFormat;

/// Global configuration values
///
/// Clocky's configuration is stored in a TOML file in the current user's
/// config directory, which is `~/.config/clocky/config.toml` by default.
///
/// A config can be loaded from a file with [`Config::load`].
/// You can also use [`Config::init`] to create a default config file if one
/// does not exist at the given path.
///
/// To save a config to the filesystem, use [`Config::save`].
///
/// ## File Format
///
/// The configuration file is written as a TOML file.
/// See the documentation for each field to learn how they are serialized.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Delay between two stopwatch ticks
    ///
    /// Shorter ticks publish the elapsed time more often; the total is
    /// exact either way. Default is 10 milliseconds.
    /// Serialized as an integer count of milliseconds.
    #[serde(default = "default_tick_interval", with = "crate::time::duration::millis")]
    pub tick_interval: Duration,
    /// Delay between two steps of the progress ring
    ///
    /// Default is 30 milliseconds.
    /// Serialized as an integer count of milliseconds.
    #[serde(default = "default_sweep_interval", with = "crate::time::duration::millis")]
    pub sweep_interval: Duration,
    /// How often the terminal display is redrawn
    ///
    /// Default is 50 milliseconds.
    /// Serialized as an integer count of milliseconds.
    #[serde(default = "default_refresh_interval", with = "crate::time::duration::millis")]
    pub refresh_interval: Duration,
    /// Format of the elapsed time on screen
    ///
    /// Either `"full"` (`HH:mm:ss:SS`), `"seconds"` (`HH:mm:ss`), or a
    /// chrono strftime pattern. Default is `"full"`.
    #[serde(default = "default_display_format")]
    pub display_format: ElapsedFormat,
    /// Format of the elapsed time written to the status file
    ///
    /// Same values as `display_format`. Default is `"seconds"`.
    #[serde(default = "default_status_format")]
    pub status_format: ElapsedFormat,
    /// Offset from UTC applied when formatting, in seconds east
    ///
    /// Default is 0.
    #[serde(default)]
    pub utc_offset: i32,
    /// Directory to find hook executables
    ///
    /// Default is a directory called `hooks` inside the config directory.
    /// Serialized as an absolute path.
    #[serde(default = "default_hooks_directory")]
    pub hooks_directory: PathBuf,
    /// File mirroring the running stopwatch for status bars
    ///
    /// Default location is the user's state directory,
    /// which is usually `~/.local/state/clocky/status`.
    /// Serialized as an absolute path.
    #[serde(default = "default_status_path")]
    pub status_file_path: PathBuf,
}

impl Config {
    /// Returns the current config, creating a default config file if one does not exist
    pub fn init(config_path: &Path) -> Result<Self> {
        if let Some(conf) = Config::load(config_path)? {
            Ok(conf)
        } else {
            let conf = Config::default();

            println!(
                "Creating config file at {}",
                config_path.display().to_string().cyan()
            );

            conf.save(config_path)?;

            Ok(conf)
        }
    }

    /// Reads a TOML config file
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            let config_str = read_to_string(path)
                .with_context(|| format!("Unable to read config file {}", path.display()))?;

            toml::from_str(&config_str).with_context(|| "Failed to parse config from TOML")
        } else {
            Ok(None)
        }
    }

    /// Write this config file to the filesystem
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string(&self)
            .with_context(|| "Unable to format config as TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create config directory {}", parent.display()))?;
        }

        std::fs::write(path, toml)
            .with_context(|| format!("Unable to write config TOML to path {}", path.display()))
    }

    /// The configured UTC offset, or UTC if it is out of range
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            sweep_interval: default_sweep_interval(),
            refresh_interval: default_refresh_interval(),
            display_format: default_display_format(),
            status_format: default_status_format(),
            utc_offset: 0,
            hooks_directory: default_hooks_directory(),
            status_file_path: default_status_path(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "Clocky", "Clocky")
}

/// Get the default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    let conf_path = project_dirs()
        .with_context(|| "Unable to determine XDG directories")?
        .config_dir()
        .join("config.toml");

    Ok(conf_path)
}

fn default_hooks_directory() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("hooks"))
        .unwrap_or_else(|| PathBuf::from("hooks"))
}

fn default_status_path() -> PathBuf {
    project_dirs()
        .map(|dirs| {
            dirs.state_dir()
                .unwrap_or_else(|| dirs.cache_dir())
                .join("status")
        })
        .unwrap_or_else(|| PathBuf::from("clocky-status"))
}

fn default_tick_interval() -> Duration {
    crate::stopwatch::DEFAULT_TICK
}

fn default_sweep_interval() -> Duration {
    crate::progress::DEFAULT_INTERVAL
}

fn default_refresh_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_display_format() -> ElapsedFormat {
    ElapsedFormat::Full
}

fn default_status_format() -> ElapsedFormat {
    ElapsedFormat::Seconds
}
