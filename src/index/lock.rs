//! Single-writer lock on an index directory.
//!
//! The lock is an OS advisory lock on `write.lock`. The file records the
//! holder's pid; a file left behind by a dead process is not locked and is
//! simply taken over.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{LucaError, Result};
use crate::segment::LOCK_FILE;

/// Held for as long as a writer has the index open
#[derive(Debug)]
pub struct WriterLock {
    file: File,
    path: PathBuf,
}

impl WriterLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(err) = FileExt::try_lock_exclusive(&file) {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                || err.kind() == std::io::ErrorKind::WouldBlock
            {
                let holder = read_holder(&mut file).unwrap_or_else(|| "unknown holder".to_string());
                return Err(LucaError::LockHeld { path, holder });
            }
            return Err(err.into());
        }

        if let Some(previous) = read_holder(&mut file) {
            warn!(lock = %path.display(), previous = %previous, "Reclaiming stale writer lock");
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(
            file,
            "pid {} since {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;
        file.sync_all()?;
        debug!(lock = %path.display(), "Acquired writer lock");

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %err, "Failed to release writer lock");
        }
    }
}

fn read_holder(file: &mut File) -> Option<String> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    let contents = contents.trim();
    if contents.is_empty() {
        None
    } else {
        Some(contents.to_string())
    }
}
