//! Batch post-processing
//!
//! Posts every setup of a job in order. A setup that fails is recorded in the
//! report's skipped list and the batch moves on; nothing short of cancellation stops
//! it early.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use postmerge_core::{
    group_operations, single_group, Error, ErrorKind, Operation, OperationGroup, Result, Setup,
};
use postmerge_gcode::{FragmentMerger, MergeOptions, ProgramRename};
use postmerge_settings::Settings;
use serde::Serialize;

use crate::assembler::Assembler;
use crate::engine::{PostEngine, PostRequest};
use crate::fragment::{FragmentReader, RetryPolicy};
use crate::naming::{OutputName, OutputNamer};

/// A setup that could not be posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSetup {
    pub setup: String,
    pub kind: String,
    pub reason: String,
}

impl SkippedSetup {
    fn new(setup: &str, kind: ErrorKind, err: &Error) -> Self {
        Self {
            setup: setup.to_string(),
            kind: kind.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Programs written, in order
    pub written: Vec<PathBuf>,
    /// Setups that failed
    pub skipped: Vec<SkippedSetup>,
    /// The run stopped early
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && !self.cancelled
    }

    /// Report as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} files were written.", self.written.len())?;
        if !self.skipped.is_empty() {
            write!(f, " {} setups were skipped:", self.skipped.len())?;
            for skipped in &self.skipped {
                write!(f, "\n{}: {} ({})", skipped.kind, skipped.setup, skipped.reason)?;
            }
        }
        if self.cancelled {
            write!(f, "\nCancelled before all setups were posted.")?;
        }
        Ok(())
    }
}

/// Groups a setup's operations the way the runner posts them
pub fn group_setup(setup: &Setup, settings: &Settings) -> Vec<OperationGroup> {
    if settings.post.split_setup {
        group_operations(&setup.operations)
    } else {
        single_group(&setup.operations)
    }
}

/// Posts setups one after another with a [`PostEngine`]
pub struct BatchRunner<E> {
    settings: Settings,
    engine: E,
    reader: FragmentReader,
    namer: OutputNamer,
    cancel: Arc<AtomicBool>,
}

impl<E: PostEngine> BatchRunner<E> {
    pub fn new(settings: Settings, engine: E) -> Self {
        let reader = FragmentReader::new(RetryPolicy::from_settings(&settings.post));
        let namer = OutputNamer::from_settings(&settings);
        Self {
            settings,
            engine,
            reader,
            namer,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Write below `folder` instead of the configured output folder
    pub fn with_output_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.namer = self.namer.with_root(folder);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.reader = FragmentReader::new(policy);
        self
    }

    /// Flag that stops the batch before the next setup when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Post every setup in order
    pub fn run(&mut self, setups: &[Setup]) -> BatchReport {
        let mut report = BatchReport::default();

        for setup in setups {
            if self.cancel.load(Ordering::Relaxed) {
                tracing::info!("Batch cancelled before setup '{}'", setup.name);
                report.cancelled = true;
                break;
            }
            if setup.suppressed || setup.active_operations().is_empty() {
                tracing::debug!("Skipping setup '{}' with nothing to post", setup.name);
                continue;
            }

            match self.post_setup(setup) {
                Ok(Some(path)) => report.written.push(path),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Skipping setup '{}': {}", setup.name, e);
                    report
                        .skipped
                        .push(SkippedSetup::new(&setup.name, e.kind(), &e));
                }
            }
        }

        tracing::info!(
            "Batch finished: {} written, {} skipped",
            report.written.len(),
            report.skipped.len()
        );
        report
    }

    /// Post one setup. Returns `None` when the setup has no operations to post.
    pub fn post_setup(&mut self, setup: &Setup) -> Result<Option<PathBuf>> {
        let groups = group_setup(setup, &self.settings);
        if groups.is_empty() {
            return Ok(None);
        }

        let name = self.namer.resolve(&setup.name)?;
        tracing::info!(
            "Posting setup '{}' as {} in {} group(s)",
            setup.name,
            name.file_stem,
            groups.len()
        );
        fs::create_dir_all(&name.folder)?;

        let temp_program = self.settings.post.temp_program().to_string();
        let extension = self.settings.post.output_extension.clone();
        let fragment = name.folder.join(format!("{}.{}", temp_program, extension));
        let options = MergeOptions::from_settings(&self.settings).with_rename(ProgramRename::new(
            temp_program.as_str(),
            &name.program_name,
            self.settings.post.numeric_name,
        ));

        let assembler = Assembler::new(&name.folder);
        let mut spool = assembler.body_spool()?;
        let mut merger = FragmentMerger::new(options);

        for (i, group) in groups.iter().enumerate() {
            let request = self.request(setup, &name, &temp_program, &fragment, group.operations());
            let operations = request.operation_names();
            tracing::debug!("Posting group {} of '{}': {}", i + 1, setup.name, operations);

            let _guard = self.reader.prepare(&fragment)?;
            self.engine.post_process(&request)?;
            let text = self.reader.read(&fragment, &operations)?;
            merger.merge_fragment(&text, i + 1 == groups.len(), &operations, &mut spool)?;
        }

        let stats = merger.stats();
        tracing::debug!(
            "Setup '{}': {} body lines, {} tool changes, {} rapid rewrites",
            setup.name,
            stats.body_lines,
            stats.tool_changes,
            stats.rewritten_lines
        );

        let target = name.path(&extension);
        assembler.assemble(&merger.finish(), spool, &target)?;
        Ok(Some(target))
    }

    fn request(
        &self,
        setup: &Setup,
        name: &OutputName,
        program: &str,
        fragment: &Path,
        operations: &[Operation],
    ) -> PostRequest {
        PostRequest {
            setup: setup.name.clone(),
            operations: operations.iter().map(|op| op.name.clone()).collect(),
            program: program.to_string(),
            folder: name.folder.clone(),
            output: fragment.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = BatchReport {
            written: vec![PathBuf::from("a.nc")],
            skipped: vec![SkippedSetup {
                setup: "B".to_string(),
                kind: "Timeout".to_string(),
                reason: "not found".to_string(),
            }],
            cancelled: false,
        };
        assert_eq!(
            report.to_string(),
            "1 files were written. 1 setups were skipped:\nTimeout: B (not found)"
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_group_setup_follows_split_mode() {
        let setup = Setup::new("Part")
            .with_operation(Operation::cutting("Face1", 1))
            .with_operation(Operation::cutting("Drill1", 2));
        let mut settings = Settings::default();
        assert_eq!(group_setup(&setup, &settings).len(), 2);
        settings.post.split_setup = false;
        assert_eq!(group_setup(&setup, &settings).len(), 1);
    }

    #[test]
    fn test_report_json() {
        let report = BatchReport::default();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"written\": []"));
        assert!(report.is_success());
    }
}
