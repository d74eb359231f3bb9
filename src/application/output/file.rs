//! Lazily opened, append-only output files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::OutputError;

/// Files and bytes written during one export.
#[derive(Debug, Default)]
pub struct Stats {
    files: AtomicU64,
    bytes: AtomicU64,
}

impl Stats {
    pub fn increment_files(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bytes(&self, count: u64) {
        self.bytes.fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn files_count(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn bytes_count(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// One output file, opened on the first write in append mode.
///
/// `offset` is the number of bytes this file is known to hold. Opening
/// checks the on-disk length against it, so a resumed file continues
/// exactly where the previous run stopped.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    handle: Option<fs::File>,
    offset: u64,
    stats: Option<Arc<Stats>>,
}

impl OutputFile {
    #[must_use]
    pub const fn new(path: PathBuf, stats: Option<Arc<Stats>>) -> Self {
        Self::resume(path, 0, stats)
    }

    /// A file whose first `confirmed` bytes were written by an earlier run.
    #[must_use]
    pub const fn resume(path: PathBuf, confirmed: u64, stats: Option<Arc<Stats>>) -> Self {
        Self {
            path,
            handle: None,
            offset: confirmed,
            stats,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes held by the file, including those confirmed before resuming.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.offset
    }

    /// Append a block. An empty block still creates the file.
    ///
    /// # Errors
    /// `Recoverable` when the file cannot be opened, `Fatal` when the
    /// directory cannot be created, the on-disk length disagrees with the
    /// expected offset, or the write itself fails.
    pub fn write_block(&mut self, block: &[u8]) -> Result<(), OutputError> {
        if self.handle.is_none() {
            self.open()?;
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(OutputError::fatal(&self.path, std::io::Error::other("file not open")));
        };
        handle
            .write_all(block)
            .map_err(|e| OutputError::fatal(&self.path, e))?;
        let written = block.len() as u64;
        self.offset += written;
        if let Some(stats) = &self.stats {
            stats.increment_bytes(written);
        }
        Ok(())
    }

    /// Flush and release the handle; later writes reopen the file.
    ///
    /// # Errors
    /// `Fatal` if buffered data cannot be flushed.
    pub fn close(&mut self) -> Result<(), OutputError> {
        if let Some(mut handle) = self.handle.take() {
            handle.flush().map_err(|e| OutputError::fatal(&self.path, e))?;
        }
        Ok(())
    }

    fn open(&mut self) -> Result<(), OutputError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| OutputError::fatal(parent, e))?;
        }
        let existing = match fs::metadata(&self.path) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(OutputError::recoverable(&self.path, e)),
        };
        match existing {
            Some(len) if len != self.offset => {
                return Err(OutputError::fatal(
                    &self.path,
                    std::io::Error::other(format!(
                        "file holds {len} bytes, expected {}",
                        self.offset
                    )),
                ));
            }
            None if self.offset > 0 => {
                return Err(OutputError::fatal(
                    &self.path,
                    std::io::Error::other(format!(
                        "file is missing, expected {} bytes",
                        self.offset
                    )),
                ));
            }
            _ => {}
        }
        let handle = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OutputError::recoverable(&self.path, e))?;
        if existing.is_none() {
            if let Some(stats) = &self.stats {
                stats.increment_files();
            }
        }
        self.handle = Some(handle);
        Ok(())
    }
}

/// Collision-free relative path for a suggested one.
///
/// Keeps `suggested` when nothing exists at that path; otherwise inserts
/// ` (N)` before the extension with the smallest free `N >= 2`.
#[must_use]
pub fn prepare_relative_path(root: &Path, suggested: &str) -> String {
    if !root.join(suggested).exists() {
        return suggested.to_string();
    }
    let (folder, name) = suggested
        .rfind('/')
        .map_or(("", suggested), |slash| suggested.split_at(slash + 1));
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    (2..)
        .map(|index| format!("{folder}{stem} ({index}){extension}"))
        .find(|candidate| !root.join(candidate).exists())
        .unwrap_or_else(|| suggested.to_string())
}
