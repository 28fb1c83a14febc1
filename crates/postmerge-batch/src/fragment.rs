//! Fragment retrieval
//!
//! The post processor may report success before its output file is visible, so the
//! reader polls with a doubling delay. Every fragment is deleted once read, on
//! success or failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use postmerge_core::{Result, TimeoutError};
use postmerge_settings::PostSettings;

/// How long to wait for a fragment to appear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before the first retry; doubled each time
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, initial_delay: Duration) -> Self {
        Self {
            retries,
            initial_delay,
        }
    }

    pub fn from_settings(settings: &PostSettings) -> Self {
        Self::new(settings.retry_count, settings.retry_delay())
    }

    /// Delay before retry number `retry` (0-indexed)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PostSettings::default())
    }
}

/// Deletes the fragment when dropped, whether or not it was ever read
#[derive(Debug)]
pub struct FragmentGuard<'a>(&'a Path);

impl Drop for FragmentGuard<'_> {
    fn drop(&mut self) {
        remove_fragment(self.0);
    }
}

fn remove_fragment(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::trace!("Removed fragment {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove fragment {}: {}", path.display(), e),
    }
}

/// Opens post processor output with retry and backoff
#[derive(Debug, Clone, Default)]
pub struct FragmentReader {
    policy: RetryPolicy,
}

impl FragmentReader {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Remove a stale fragment left at `path` by an earlier run.
    ///
    /// Hold the returned guard across the engine call so the fragment is removed
    /// even when the engine writes it and then reports failure.
    pub fn prepare<'p>(&self, path: &'p Path) -> io::Result<FragmentGuard<'p>> {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed stale fragment {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(FragmentGuard(path))
    }

    /// Read and delete the fragment at `path`.
    ///
    /// `operations` names the group in the timeout error.
    pub fn read(&self, path: &Path, operations: &str) -> Result<String> {
        let _guard = FragmentGuard(path);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match fs::read(path) {
                Ok(bytes) => {
                    tracing::debug!(
                        "Read fragment {} ({} bytes, attempt {})",
                        path.display(),
                        bytes.len(),
                        attempts
                    );
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if attempts > self.policy.retries {
                        break;
                    }
                    let delay = self.policy.delay_for(attempts - 1);
                    tracing::debug!(
                        "Fragment {} not found, retrying in {:?}",
                        path.display(),
                        delay
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let operations = operations.to_string();
        let path_buf = path.to_path_buf();
        let err = match find_other_extension(path) {
            Some(found) => {
                // the misnamed output is still ours to clean up
                remove_fragment(&found);
                TimeoutError::WrongExtension {
                    path: path_buf,
                    attempts,
                    operations,
                    found,
                }
            }
            None => TimeoutError::NotFound {
                path: path_buf,
                attempts,
                operations,
            },
        };
        Err(err.into())
    }
}

/// A file next to `path` with the same stem and a different extension
fn find_other_extension(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut candidates: Vec<PathBuf> = fs::read_dir(parent)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.file_stem() == Some(stem) && p.extension() != path.extension())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
