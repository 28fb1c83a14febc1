//! Program assembly
//!
//! Body lines are spooled to a temporary file next to the output while the
//! fragments are merged. The final program is written to a second temporary file
//! and renamed into place, so a failed setup never leaves a partial program behind.

use std::fs;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use postmerge_core::Result;
use postmerge_gcode::{FragmentMerger, MergeOptions, MergeStats, MergedProgram};
use tempfile::NamedTempFile;

/// Temporary store for body lines; removed when dropped
pub struct BodySpool {
    file: BufWriter<NamedTempFile>,
}

impl BodySpool {
    pub fn path(&self) -> &Path {
        self.file.get_ref().path()
    }
}

impl Write for BodySpool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes merged programs into one folder
#[derive(Debug, Clone)]
pub struct Assembler {
    folder: PathBuf,
}

impl Assembler {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// New body spool in the output folder
    pub fn body_spool(&self) -> io::Result<BodySpool> {
        let file = tempfile::Builder::new()
            .prefix(".postmerge-body-")
            .tempfile_in(&self.folder)?;
        Ok(BodySpool {
            file: BufWriter::new(file),
        })
    }

    /// Write header, spooled body and tail to `target`, replacing it atomically
    pub fn assemble(&self, program: &MergedProgram, body: BodySpool, target: &Path) -> Result<()> {
        let mut body = body.file.into_inner().map_err(|e| e.into_error())?;
        body.seek(SeekFrom::Start(0))?;

        let output = tempfile::Builder::new()
            .prefix(".postmerge-out-")
            .tempfile_in(&self.folder)?;
        let mut out = BufWriter::new(output);
        for line in &program.header {
            writeln!(out, "{}", line)?;
        }
        io::copy(&mut body, &mut out)?;
        for line in &program.tail {
            writeln!(out, "{}", line)?;
        }

        let output = out.into_inner().map_err(|e| e.into_error())?;
        output.as_file().sync_all()?;
        output.persist(target).map_err(|e| e.error)?;
        tracing::info!("Wrote {}", target.display());
        Ok(())
    }
}

/// Merge fragment files that already exist, in order, into `target`.
///
/// The fragment files are left in place.
pub fn merge_files(fragments: &[PathBuf], options: MergeOptions, target: &Path) -> Result<MergeStats> {
    let folder = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let assembler = Assembler::new(folder);
    let mut spool = assembler.body_spool()?;
    let mut merger = FragmentMerger::new(options);

    for (i, path) in fragments.iter().enumerate() {
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let name = path.display().to_string();
        merger.merge_fragment(&text, i + 1 == fragments.len(), &name, &mut spool)?;
    }

    let stats = merger.stats();
    assembler.assemble(&merger.finish(), spool, target)?;
    Ok(stats)
}
