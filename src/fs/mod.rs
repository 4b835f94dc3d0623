use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Single-instance guard on the work directory
mod lock;
/// Defines fns for creating common paths in the work directory
mod paths;
pub use lock::WorkdirLock;
pub use paths::{job_stderr, job_stdout, job_task};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Specified work directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
    #[error("Work directory is in use by another process ({0:?} exists; remove it if no other run is active)")]
    Locked(PathBuf),
}

/// All file operations on the work directory should go through this struct.
///
/// All destructive operations check that the path in question is a child of the
/// single whitelisted prefix (the work dir), otherwise they will not be performed.
#[derive(Debug)]
pub struct Fs {
    /// The directory we are allowed to modify
    workdir: PathBuf,
}

impl Fs {
    /// Create a new `Fs` with the given work directory.
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
        }
    }

    /// Check whether the work dir exists, and create it if not.
    pub fn ensure_workdir_exists(&mut self, verbose: bool) -> Result<()> {
        if !self.workdir.exists() {
            log::info!("Work directory {:?} doesn't exist. Creating.", self.workdir);
            fs::create_dir_all(&self.workdir).context("creating work directory")?;
        } else if !self.workdir.is_dir() {
            return Err(Error::NotDirectory(
                self.workdir.to_str().ok_or(PathEncodingError)?.to_string(),
            )
            .into());
        } else if verbose {
            eprintln!("Work directory {:?} already exists. Not creating.", self.workdir);
        }

        self.workdir = self.workdir.canonicalize()?;
        Ok(())
    }

    /// Check if path exists and is a directory.
    pub fn is_dir<T: AsRef<Path>>(&self, path: T) -> Result<bool> {
        let path = path.as_ref();
        if path.is_dir() || (path.is_symlink() && path.canonicalize()?.is_dir()) {
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))?;
        Ok(())
    }

    /// Recursively delete a directory.
    pub fn delete_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_dir_all(path).with_context(|| format!("deleting dir {:?}", path))?;
        Ok(())
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        path.as_ref().starts_with(&self.workdir)
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}

/// Write `text` to `path` so that readers see either the old content or all
/// of the new one: write a temporary file in the same directory, then rename.
/// Creates the parent directory if needed.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating dir {:?}", dir))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {:?}", dir))?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("writing file {:?}", path))?;
    Ok(())
}
