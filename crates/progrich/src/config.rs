//! Configuration for the default display.
//!
//! Sources, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else `$PROGRICH_CONFIG`, else
//!    `~/.config/progrich/config.toml` when present)
//! 3. `PROGRICH_*` environment variables
//! 4. Command-line flags (applied by the caller)
//!
//! ```toml
//! completed_on_top = true
//! refresh_ms = 50
//! target = "stderr"
//! spinner = "arc"
//! ```

use crate::theme::{SpinnerStyle, Theme};
use progrich_core::{Manager, Target, TerminalDisplay, TerminalOptions};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PROGRICH_CONFIG";

/// Errors that can occur while loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field has a value outside its domain.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Config key or environment variable.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Settings for the default manager and the widgets' look.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    /// Group finished widgets before running ones.
    pub completed_on_top: bool,
    /// Repaint cadence in milliseconds.
    pub refresh_ms: u64,
    /// `stdout` or `stderr`.
    pub target: String,
    /// Draw on the alternate screen.
    pub alternate_screen: bool,
    /// Hide the cursor while drawing.
    pub hide_cursor: bool,
    /// Cells occupied by a progress bar.
    pub bar_width: usize,
    /// Spinner animation: `dots`, `line`, `arc` or `simple`.
    pub spinner: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        let options = TerminalOptions::default();
        let theme = Theme::default();
        Self {
            completed_on_top: false,
            refresh_ms: options.refresh.as_millis() as u64,
            target: options.target.to_string(),
            alternate_screen: options.alternate_screen,
            hide_cursor: options.hide_cursor,
            bar_width: theme.layout.bar_width,
            spinner: "dots".to_string(),
        }
    }
}

impl ProgressConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` for malformed TOML or unknown keys,
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`ProgressConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// The per-user config file, if a config directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("progrich").join("config.toml"))
    }

    /// Load from `explicit`, else `$PROGRICH_CONFIG`, else the per-user file
    /// if it exists. Falls back to defaults when no file is found.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly named file is missing or invalid.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading user config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Overlay `PROGRICH_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the offending variable.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay `PROGRICH_*` variables obtained from `lookup`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the offending variable.
    pub fn apply_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("PROGRICH_COMPLETED_ON_TOP") {
            self.completed_on_top = parse_flag(&v);
        }
        if let Some(v) = lookup("PROGRICH_REFRESH_MS") {
            self.refresh_ms = parse_number("PROGRICH_REFRESH_MS", &v)?;
        }
        if let Some(v) = lookup("PROGRICH_TARGET") {
            self.target = v;
        }
        if let Some(v) = lookup("PROGRICH_ALT_SCREEN") {
            self.alternate_screen = parse_flag(&v);
        }
        if let Some(v) = lookup("PROGRICH_HIDE_CURSOR") {
            self.hide_cursor = parse_flag(&v);
        }
        if let Some(v) = lookup("PROGRICH_BAR_WIDTH") {
            self.bar_width = parse_number("PROGRICH_BAR_WIDTH", &v)?;
        }
        if let Some(v) = lookup("PROGRICH_SPINNER") {
            self.spinner = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check every field that has a restricted domain.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_ms == 0 {
            return Err(invalid("refresh_ms", "must be greater than zero"));
        }
        if self.bar_width == 0 {
            return Err(invalid("bar_width", "must be greater than zero"));
        }
        self.target_stream()?;
        self.spinner_style()?;
        Ok(())
    }

    /// The output stream.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` for anything but `stdout` or `stderr`.
    pub fn target_stream(&self) -> Result<Target, ConfigError> {
        self.target.parse().map_err(|reason| invalid("target", reason))
    }

    /// The spinner animation.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` for an unknown animation name.
    pub fn spinner_style(&self) -> Result<SpinnerStyle, ConfigError> {
        self.spinner.parse().map_err(|reason| invalid("spinner", reason))
    }

    /// Display settings for a [`TerminalDisplay`].
    ///
    /// # Errors
    ///
    /// As [`ProgressConfig::target_stream`].
    pub fn terminal_options(&self) -> Result<TerminalOptions, ConfigError> {
        Ok(TerminalOptions {
            target: self.target_stream()?,
            refresh: Duration::from_millis(self.refresh_ms),
            alternate_screen: self.alternate_screen,
            hide_cursor: self.hide_cursor,
        })
    }

    /// The default theme with this config's bar width and spinner.
    ///
    /// # Errors
    ///
    /// As [`ProgressConfig::spinner_style`].
    pub fn theme(&self) -> Result<Theme, ConfigError> {
        let mut theme = Theme::default();
        theme.layout.bar_width = self.bar_width;
        theme.spinner = self.spinner_style()?;
        Ok(theme)
    }

    /// A manager drawing on a terminal display configured by `self`.
    ///
    /// # Errors
    ///
    /// As [`ProgressConfig::terminal_options`].
    pub fn build_manager(&self) -> Result<Arc<Manager>, ConfigError> {
        let display = TerminalDisplay::new(self.terminal_options()?);
        let manager = Manager::builder()
            .completed_on_top(self.completed_on_top)
            .display(display)
            .build();
        Ok(Arc::new(manager))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| invalid(name, format!("'{value}': {err}")))
}
