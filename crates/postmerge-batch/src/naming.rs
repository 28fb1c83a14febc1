//! Output naming
//!
//! A setup called `Parts : Left : Bracket` is written to `<root>/Parts/Left` as
//! `Bracket`, optionally prefixed with a sequence number that counts setups per
//! folder.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use postmerge_core::NamingError;
use postmerge_settings::Settings;

/// Where and under which name a setup's program is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    /// Folder the program goes into
    pub folder: PathBuf,
    /// File name without extension
    pub file_stem: String,
    /// Program name written into the program header
    pub program_name: String,
}

impl OutputName {
    /// Full path with `extension`
    pub fn path(&self, extension: &str) -> PathBuf {
        self.folder.join(format!("{}.{}", self.file_stem, extension))
    }
}

/// Split a setup name into its folder components and file name.
pub fn split_setup_name(name: &str) -> (Vec<String>, String) {
    let mut parts: Vec<String> = name.split(':').map(|p| p.trim().to_string()).collect();
    let file = parts.pop().unwrap_or_default();
    (parts.into_iter().filter(|p| !p.is_empty()).collect(), file)
}

/// Leading digits of `name`, if any
pub fn program_number(name: &str) -> Option<&str> {
    let end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(name.len(), |(i, _)| i);
    (end > 0).then(|| &name[..end])
}

/// Resolves setup names to output locations, keeping one sequence per folder
#[derive(Debug, Clone)]
pub struct OutputNamer {
    root: PathBuf,
    sequence: bool,
    two_digits: bool,
    numeric: bool,
    delete_existing: bool,
    counters: HashMap<PathBuf, u32>,
}

impl OutputNamer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: false,
            two_digits: false,
            numeric: false,
            delete_existing: false,
            counters: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            root: settings.output.folder.clone(),
            sequence: settings.output.sequence,
            two_digits: settings.output.two_digits,
            numeric: settings.post.numeric_name,
            delete_existing: settings.output.delete_existing,
            counters: HashMap::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_sequence(mut self, sequence: bool, two_digits: bool) -> Self {
        self.sequence = sequence;
        self.two_digits = two_digits;
        self
    }

    pub fn with_numeric_names(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the output location for `setup_name`, consuming a sequence number.
    pub fn resolve(&mut self, setup_name: &str) -> Result<OutputName, NamingError> {
        let (folders, file) = split_setup_name(setup_name);
        if file.is_empty() {
            return Err(NamingError::EmptyName {
                setup: setup_name.to_string(),
            });
        }

        let number = if self.numeric {
            let number = program_number(&file).ok_or_else(|| NamingError::MissingProgramNumber {
                setup: setup_name.to_string(),
            })?;
            Some(number.to_string())
        } else {
            None
        };

        let folder = folders.iter().fold(self.root.clone(), |dir, part| dir.join(part));
        let first_use = !self.counters.contains_key(&folder);
        let seq = self.counters.entry(folder.clone()).or_insert(0);
        *seq += 1;
        let seq = *seq;
        if first_use && self.delete_existing {
            clear_folder(&folder);
        }

        let file_stem = if self.sequence {
            if self.two_digits {
                format!("{seq:02} {file}")
            } else {
                format!("{seq} {file}")
            }
        } else {
            file
        };
        let program_name = number.unwrap_or_else(|| file_stem.clone());

        Ok(OutputName {
            folder,
            file_stem,
            program_name,
        })
    }
}

/// Delete the files directly inside `folder`; errors are logged and ignored
fn clear_folder(folder: &Path) {
    let Ok(entries) = fs::read_dir(folder) else {
        return;
    };
    for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
        if path.is_file() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Could not delete {}: {}", path.display(), e);
            }
        }
    }
    tracing::debug!("Cleared output folder {}", folder.display());
}
