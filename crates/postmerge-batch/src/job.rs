//! Job manifests
//!
//! A job lists the setups of a CAM document and their operations, in the order the
//! CAM browser shows them. It stands in for the host document when running from the
//! command line.
//!
//! ```toml
//! [[setups]]
//! name = "Fixtures : 1001 Bracket"
//!
//! [[setups.operations]]
//! name = "Face1"
//! tool = 1
//! ```

use std::path::Path;

use postmerge_core::Setup;
use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

/// Setups to post, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub setups: Vec<Setup>,
}

impl Job {
    pub fn new(setups: Vec<Setup>) -> Self {
        Self { setups }
    }

    /// Load a manifest (JSON or TOML, by extension)
    pub fn load_from_file(path: &Path) -> JobResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| JobError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let job = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(JobError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                ))
            }
        };
        Ok(job)
    }

    /// Setups that are not suppressed
    pub fn active_setups(&self) -> impl Iterator<Item = &Setup> {
        self.setups.iter().filter(|s| !s.suppressed)
    }
}
