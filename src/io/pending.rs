//! Atomic file replacement: write into a sibling temp file, rename over the target on commit.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// An output file being written. Dropping it without `commit` discards the temp file
/// and leaves any existing target untouched.
#[derive(Debug)]
pub struct PendingWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl PendingWrite {
    /// Start writing `target`, creating its parent directory if needed.
    /// An existing target is replaced on commit.
    pub fn open(target: &Path) -> Result<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("[io::pending] create dir {}", parent.display()))?;
        let tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("[io::pending] create temp file next to {}", target.display()))?;

        Ok(Self { target: target.to_path_buf(), tmp })
    }

    #[inline] pub fn target(&self) -> &Path { &self.target }

    /// Flush and move the temp file into place.
    pub fn commit(mut self) -> Result<()> {
        self.tmp.flush().context("[io::pending] flush temp file")?;
        self.tmp.as_file().sync_all().ok(); // best-effort
        let Self { target, tmp } = self;
        tmp.persist(&target)
            .with_context(|| format!("[io::pending] rename to {}", target.display()))?;
        if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.tmp.write(buf) }

    fn flush(&mut self) -> io::Result<()> { self.tmp.flush() }
}
