use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postmerge::{
    group_setup, init_logging, merge_files, BatchRunner, CommandEngine, Job, LogFormat,
    MergeOptions, ProgramRename, Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "postmerge",
    version,
    about = "Post each tool separately and merge the fragments into one program per setup"
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Post every setup of a job manifest with the configured post processor.
    Run {
        /// Job manifest (.toml or .json)
        #[arg(long)]
        job: PathBuf,
        /// Settings file (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output folder, overriding the settings
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge fragment files that were already posted, in order.
    Merge {
        /// Settings file (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Program name replacing the temporary name in the header
        #[arg(long)]
        name: Option<String>,
        /// Merged program to write
        #[arg(long, short)]
        output: PathBuf,
        /// Fragment files in posting order
        #[arg(required = true)]
        fragments: Vec<PathBuf>,
    },

    /// Show how each setup of a job would be split into post processor calls.
    Groups {
        /// Job manifest (.toml or .json)
        #[arg(long)]
        job: PathBuf,
        /// Settings file (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(format, level)?;
    tracing::debug!("postmerge {} (built {})", postmerge::VERSION, postmerge::BUILD_DATE);

    match cli.cmd {
        Cmd::Run {
            job,
            config,
            output,
            json,
        } => {
            let settings = load_settings(config.as_deref())?;
            let job = Job::load_from_file(&job)
                .with_context(|| format!("loading job {}", job.display()))?;
            let engine =
                CommandEngine::from_settings(&settings.engine).context("configuring post processor")?;

            let mut runner = BatchRunner::new(settings, engine);
            if let Some(folder) = output {
                runner = runner.with_output_folder(folder);
            }
            let report = runner.run(&job.setups);

            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report);
            }
            if !report.is_success() {
                process::exit(1);
            }
        }

        Cmd::Merge {
            config,
            name,
            output,
            fragments,
        } => {
            let settings = load_settings(config.as_deref())?;
            let mut options = MergeOptions::from_settings(&settings);
            if let Some(name) = name {
                options = options.with_rename(ProgramRename::new(
                    settings.post.temp_program(),
                    &name,
                    settings.post.numeric_name,
                ));
            }
            let stats = merge_files(&fragments, options, &output)
                .with_context(|| format!("merging into {}", output.display()))?;
            println!(
                "Merged {} fragments into {} ({} body lines, {} tool changes)",
                stats.fragments,
                output.display(),
                stats.body_lines,
                stats.tool_changes
            );
        }

        Cmd::Groups { job, config } => {
            let settings = load_settings(config.as_deref())?;
            let job = Job::load_from_file(&job)
                .with_context(|| format!("loading job {}", job.display()))?;
            for setup in job.active_setups() {
                println!("{}", setup.name);
                for (i, group) in group_setup(setup, &settings).iter().enumerate() {
                    let tool = group
                        .tool()
                        .map_or_else(|| "no tool".to_string(), |t| format!("T{}", t));
                    println!("  {}. {}: {}", i + 1, tool, group.names());
                }
            }
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    Settings::load_or_default(path).with_context(|| match path {
        Some(path) => format!("loading settings {}", path.display()),
        None => "loading default settings".to_string(),
    })
}
