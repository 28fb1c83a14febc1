//! postmerge Settings Crate
//!
//! Handles the configuration snapshot and its persistence as JSON or TOML.

pub mod config;
pub mod error;

pub use config::{
    EngineSettings, MergeSettings, OutputSettings, PostSettings, RapidSettings, Settings,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
