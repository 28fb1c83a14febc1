//! # postmerge
//!
//! Reassembles split post-processor output into one G-code program per CAM setup.
//!
//! When a post processor cannot be trusted with a whole setup at once, postmerge
//! posts each tool's operations separately and merges the fragments:
//!
//! 1. **postmerge-core** - Errors, setups and operations, operation grouping
//! 2. **postmerge-settings** - Configuration snapshot (TOML/JSON)
//! 3. **postmerge-gcode** - Line classification, splitting, renumbering, rapid rewriting
//! 4. **postmerge-batch** - Post processor invocation, fragment retrieval, assembly, batches
//! 5. **postmerge** - Command line binary

pub use postmerge_batch;
pub use postmerge_core;
pub use postmerge_gcode;
pub use postmerge_settings;

pub use postmerge_batch::{
    group_setup, merge_files, BatchReport, BatchRunner, CommandEngine, Job, PostEngine,
    PostRequest,
};
pub use postmerge_core::{Error, Operation, OperationGroup, Result, Setup};
pub use postmerge_gcode::{merge_fragments, FragmentMerger, MergeOptions, ProgramRename};
pub use postmerge_settings::Settings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Log output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Initialize logging
///
/// Logs go to stderr so program output and reports on stdout stay clean.
/// `RUST_LOG` overrides `default_level`.
pub fn init_logging(format: LogFormat, default_level: tracing::Level) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    match format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_line_number(true)
                .pretty();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .json();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}
