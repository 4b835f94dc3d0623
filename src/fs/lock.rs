use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{Error, Fs};

/// Exclusive use of the work dir. The lock file is removed on drop.
#[derive(Debug)]
pub struct WorkdirLock {
    path: PathBuf,
}

impl Fs {
    /// Take the work dir lock, failing if another process holds it.
    pub fn lock(&self) -> Result<WorkdirLock> {
        let path = self.lock_file();
        self.check_whitelist(&path)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::Locked(path).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("creating lock file {:?}", path));
            }
        };
        writeln!(file, "{}", std::process::id())?;
        log::debug!("Locked {:?}", path);
        Ok(WorkdirLock { path })
    }
}

impl Drop for WorkdirLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Couldn't remove lock file {:?}: {}", self.path, e);
        }
    }
}
