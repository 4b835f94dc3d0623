use std::path::{Path, PathBuf};

use super::Fs;

/// Partial recipes, relative to the work dir.
pub const RECIPES_DIR: &str = "recipes";
/// Job logs, relative to the work dir.
pub const LOGS_DIR: &str = "logs";
/// Held by the process currently using the work dir.
pub const LOCK_FILE: &str = ".lock";

/// Utility fns for making common types of paths.
impl Fs {
    /// $WORKDIR/recipes
    pub fn recipes_dir(&self) -> PathBuf {
        parts2(&self.workdir, RECIPES_DIR)
    }

    /// $WORKDIR/logs
    pub fn logs_dir(&self) -> PathBuf {
        parts2(&self.workdir, LOGS_DIR)
    }

    /// $WORKDIR/.lock
    pub fn lock_file(&self) -> PathBuf {
        parts2(&self.workdir, LOCK_FILE)
    }

    /// $WORKDIR/logs/20240131T235959
    pub fn log_folder(&self, timestamp: &str) -> PathBuf {
        parts3(&self.workdir, LOGS_DIR, timestamp)
    }
}

/// $LOG_FOLDER/3_task.json
pub fn job_task(folder: &Path, index: usize) -> PathBuf {
    parts2(folder, format!("{index}_task.json"))
}

/// $LOG_FOLDER/3_stdout.txt
pub fn job_stdout(folder: &Path, index: usize) -> PathBuf {
    parts2(folder, format!("{index}_stdout.txt"))
}

/// $LOG_FOLDER/3_stderr.txt
pub fn job_stderr(folder: &Path, index: usize) -> PathBuf {
    parts2(folder, format!("{index}_stderr.txt"))
}

fn parts2<T, U>(p1: T, p2: U) -> PathBuf
where
    T: AsRef<Path>,
    U: AsRef<Path>,
{
    let mut buf = PathBuf::with_capacity(256);
    buf.push(p1);
    buf.push(p2);
    buf
}

fn parts3<T, U, V>(p1: T, p2: U, p3: V) -> PathBuf
where
    T: AsRef<Path>,
    U: AsRef<Path>,
    V: AsRef<Path>,
{
    let mut buf = parts2(p1, p2);
    buf.push(p3);
    buf
}
