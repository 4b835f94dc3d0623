use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::fs::Fs;
use crate::ui::Ui;

/// Logic for removing partial recipes and job logs from previous runs.
pub struct Cleaner<'a> {
    fs: &'a Fs,
    ui: &'a Ui,
}

impl<'a> Cleaner<'a> {
    /// Create a new `Cleaner`.
    pub fn new(fs: &'a Fs, ui: &'a Ui) -> Self {
        Self { fs, ui }
    }
}

impl Cleaner<'_> {
    /// Delete the recipes and logs directories of the work dir.
    pub fn clean(&self) -> Result<()> {
        for dir in [self.fs.logs_dir(), self.fs.recipes_dir()] {
            self.delete_dir_if_exists(&dir)?;
        }
        self.ui.success("Work directory cleaned.");
        Ok(())
    }

    fn delete_dir_if_exists(&self, path: &Path) -> Result<()> {
        if self.fs.is_dir(path)? {
            log::warn!("Removing {:?}", path);
            self.ui
                .verbose_msg(&format!("{} {path:?}.", "Deleting".red()));
            self.fs.delete_dir(path)?;
        } else {
            log::warn!("Skipping {:?} because it doesn't exist", path);
        }
        Ok(())
    }
}
