//! Configuration for postmerge
//!
//! Provides the immutable configuration snapshot consumed by the merge engine and
//! the batch runner. Settings are stored as JSON or TOML; every section and every
//! key falls back to its default when missing, so older files keep loading.
//!
//! Configuration is organized into logical sections:
//! - Post processor invocation (split mode, naming, retries)
//! - Fragment merging (tool-change snippet, end markers, line numbering)
//! - Rapid-move rewriting
//! - Output folder and file naming
//! - External post processor command

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Post processor invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    /// Post each tool's operations separately and merge the fragments
    pub split_setup: bool,
    /// Program names must be numeric (taken from the leading digits of the setup name)
    pub numeric_name: bool,
    /// Extension of files written by the post processor and of merged output
    pub output_extension: String,
    /// How many times to retry opening a fragment that has not appeared yet
    pub retry_count: u32,
    /// First retry delay in milliseconds; doubled after every retry
    pub retry_delay_ms: u64,
    /// Program name handed to the post processor for fragments
    pub temp_program_name: String,
    /// Program number handed to the post processor for fragments in numeric mode
    pub temp_program_number: String,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            split_setup: true,
            numeric_name: false,
            output_extension: "nc".to_string(),
            retry_count: 6,
            retry_delay_ms: 50,
            temp_program_name: "postmerge_tmp".to_string(),
            temp_program_number: "99999".to_string(),
        }
    }
}

impl PostSettings {
    /// Initial delay between fragment open attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Program name given to the post processor for a fragment
    pub fn temp_program(&self) -> &str {
        if self.numeric_name {
            &self.temp_program_number
        } else {
            &self.temp_program_name
        }
    }
}

/// Fragment merge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// G-code emitted before the first line of a new tool; lines separated by
    /// `tool_change_delimiter`. A leading `N` requests a line number on the first line.
    pub tool_change: String,
    /// Separator between lines of `tool_change`
    pub tool_change_delimiter: String,
    /// M codes that begin the program tail
    pub end_m_codes: Vec<String>,
    /// G codes that begin the program tail
    pub end_g_codes: Vec<String>,
    /// Treat move-home G codes as the start of the tail as well
    pub home_ends_body: bool,
    /// Move-home G codes honoured when `home_ends_body` is set
    pub home_g_codes: Vec<String>,
    /// First line number of the merged program
    pub line_number_start: u32,
    /// Increment between line numbers
    pub line_number_step: u32,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            tool_change: String::new(),
            tool_change_delimiter: "|".to_string(),
            end_m_codes: vec!["5".to_string(), "30".to_string()],
            end_g_codes: Vec::new(),
            home_ends_body: false,
            home_g_codes: vec!["28".to_string()],
            line_number_start: 10,
            line_number_step: 5,
        }
    }
}

/// Rapid-move rewrite settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidSettings {
    /// Rewrite non-cutting feed moves as rapid moves
    pub enabled: bool,
    /// M codes that suspend rewriting (feed override locked)
    pub lock_on_m_codes: Vec<String>,
    /// M codes that resume rewriting
    pub lock_off_m_codes: Vec<String>,
}

impl Default for RapidSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            lock_on_m_codes: vec!["49".to_string()],
            lock_off_m_codes: vec!["48".to_string()],
        }
    }
}

/// Output folder and naming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Root output folder; colon-separated setup names create subfolders below it
    pub folder: PathBuf,
    /// Prefix each file with its per-folder sequence number
    pub sequence: bool,
    /// Zero-pad sequence numbers below 10
    pub two_digits: bool,
    /// Delete existing files in each output folder the first time it is used
    pub delete_existing: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            sequence: true,
            two_digits: false,
            delete_existing: false,
        }
    }
}

/// External post processor command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineSettings {
    /// Program to run for each post processor invocation
    pub program: String,
    /// Arguments; `{setup}`, `{operations}`, `{program}`, `{folder}` and `{output}`
    /// are substituted per invocation
    pub args: Vec<String>,
}

/// Complete configuration snapshot
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Post processor invocation
    pub post: PostSettings,
    /// Fragment merging
    pub merge: MergeSettings,
    /// Rapid-move rewriting
    pub rapid: RapidSettings,
    /// Output naming
    pub output: OutputSettings,
    /// External post processor
    pub engine: EngineSettings,
}

impl Settings {
    /// Create new settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let settings: Self = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                )
                .into())
            }
        };

        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Save settings to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                )
                .into())
            }
        };

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        if self.merge.line_number_step == 0 {
            return Err(SettingsError::invalid(
                "merge.line_number_step",
                "must be > 0",
            ));
        }

        if self.merge.end_m_codes.is_empty() && self.merge.end_g_codes.is_empty() {
            return Err(SettingsError::invalid(
                "merge.end_m_codes",
                "at least one end marker code is required",
            ));
        }

        if self.merge.tool_change_delimiter.is_empty() {
            return Err(SettingsError::invalid(
                "merge.tool_change_delimiter",
                "must not be empty",
            ));
        }

        for (key, codes) in [
            ("merge.end_m_codes", &self.merge.end_m_codes),
            ("merge.end_g_codes", &self.merge.end_g_codes),
            ("merge.home_g_codes", &self.merge.home_g_codes),
            ("rapid.lock_on_m_codes", &self.rapid.lock_on_m_codes),
            ("rapid.lock_off_m_codes", &self.rapid.lock_off_m_codes),
        ] {
            if let Some(bad) = codes.iter().find(|c| !is_code_number(c)) {
                return Err(SettingsError::invalid(
                    key,
                    format!("'{}' is not a code number", bad),
                ));
            }
        }

        if self.post.output_extension.trim().is_empty() {
            return Err(SettingsError::invalid(
                "post.output_extension",
                "must not be empty",
            ));
        }

        if self.post.retry_count > 0 && self.post.retry_delay_ms == 0 {
            return Err(SettingsError::invalid(
                "post.retry_delay_ms",
                "must be > 0 when retries are enabled",
            ));
        }

        if self.post.retry_count > 30 {
            return Err(ConfigError::ValueOutOfRange {
                key: "post.retry_count".to_string(),
                value: self.post.retry_count.to_string(),
            }
            .into());
        }

        if self.post.temp_program_number.is_empty()
            || !self.post.temp_program_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(SettingsError::invalid(
                "post.temp_program_number",
                "must be all digits",
            ));
        }

        if self.post.temp_program_name.trim().is_empty() {
            return Err(SettingsError::invalid(
                "post.temp_program_name",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// `5`, `30`, `1.1` are code numbers; letters and empty strings are not
fn is_code_number(code: &str) -> bool {
    let mut parts = code.splitn(2, '.');
    let major = parts.next().unwrap_or_default();
    let minor_ok = parts
        .next()
        .map_or(true, |m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()));
    !major.is_empty() && major.chars().all(|c| c.is_ascii_digit()) && minor_ok
}
