//! Post processor invocation
//!
//! The host CAM system is reached through [`PostEngine`]. [`CommandEngine`] runs an
//! external program per operation group; tests and embedders supply their own.

use std::path::PathBuf;
use std::process::Command;

use postmerge_core::EngineError;
use postmerge_settings::EngineSettings;

/// One post processor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    /// Name of the setup being posted
    pub setup: String,
    /// Operations in this group, in order
    pub operations: Vec<String>,
    /// Program name the post processor should write into the output
    pub program: String,
    /// Folder the post processor writes into
    pub folder: PathBuf,
    /// File the post processor is expected to produce
    pub output: PathBuf,
}

impl PostRequest {
    /// Comma-separated operation names, as used in error messages
    pub fn operation_names(&self) -> String {
        self.operations.join(", ")
    }
}

/// Produces one G-code fragment per request
pub trait PostEngine {
    /// Post the request's operations to `request.output`
    fn post_process(&mut self, request: &PostRequest) -> Result<(), EngineError>;
}

impl<E: PostEngine + ?Sized> PostEngine for Box<E> {
    fn post_process(&mut self, request: &PostRequest) -> Result<(), EngineError> {
        (**self).post_process(request)
    }
}

/// Runs an external program for every request
///
/// Arguments may contain `{setup}`, `{operations}`, `{program}`, `{folder}` and
/// `{output}`, replaced per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Engine from settings; fails when no program is configured
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, EngineError> {
        if settings.program.trim().is_empty() {
            return Err(EngineError::NotConfigured);
        }
        Ok(Self::new(settings.program.clone(), settings.args.clone()))
    }

    /// Arguments with placeholders replaced
    pub fn expand_args(&self, request: &PostRequest) -> Vec<String> {
        let operations = request.operation_names();
        let folder = request.folder.display().to_string();
        let output = request.output.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{setup}", &request.setup)
                    .replace("{operations}", &operations)
                    .replace("{program}", &request.program)
                    .replace("{folder}", &folder)
                    .replace("{output}", &output)
            })
            .collect()
    }
}

impl PostEngine for CommandEngine {
    fn post_process(&mut self, request: &PostRequest) -> Result<(), EngineError> {
        let args = self.expand_args(request);
        tracing::debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| EngineError::Launch {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => output.status.to_string(),
            message => message.to_string(),
        };
        Err(EngineError::Failed {
            operations: request.operation_names(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PostRequest {
        PostRequest {
            setup: "Bracket".to_string(),
            operations: vec!["Face1".to_string(), "Pocket2".to_string()],
            program: "postmerge_tmp".to_string(),
            folder: PathBuf::from("out"),
            output: PathBuf::from("out/postmerge_tmp.nc"),
        }
    }

    #[test]
    fn test_expand_args() {
        let engine = CommandEngine::new(
            "post",
            vec![
                "--ops={operations}".to_string(),
                "{program}".to_string(),
                "{output}".to_string(),
            ],
        );
        assert_eq!(
            engine.expand_args(&request()),
            vec![
                "--ops=Face1, Pocket2".to_string(),
                "postmerge_tmp".to_string(),
                PathBuf::from("out/postmerge_tmp.nc").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_not_configured() {
        let err = CommandEngine::from_settings(&EngineSettings::default()).unwrap_err();
        assert!(matches!(err, EngineError::NotConfigured));
    }

    #[test]
    fn test_launch_failure() {
        let mut engine = CommandEngine::new("postmerge-no-such-program", Vec::new());
        let err = engine.post_process(&request()).unwrap_err();
        assert!(matches!(err, EngineError::Launch { .. }));
    }
}
