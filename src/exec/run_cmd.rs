use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};

use super::Error;

/// Start a subprocess with stdout and stderr redirected to the given files.
pub fn spawn_logged(cmd: &mut Command, stdout: &Path, stderr: &Path) -> Result<Child> {
    let (out_file, err_file) = make_log_files(stdout, stderr)?;
    log::debug!(
        "Spawning {:?} {:?}",
        cmd.get_program(),
        cmd.get_args().collect::<Vec<_>>()
    );
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(out_file))
        .stderr(Stdio::from(err_file))
        .spawn()
        .map_err(|e| Error::Spawn {
            program: cmd.get_program().to_string_lossy().into_owned(),
            source: e,
        })?;
    Ok(child)
}

fn make_log_files(stdout: &Path, stderr: &Path) -> Result<(File, File)> {
    let out_file = File::create(stdout)
        .with_context(|| format!("creating stdout file {:?}", stdout))?;
    let err_file = File::create(stderr)
        .with_context(|| format!("creating stderr file {:?}", stderr))?;
    Ok((out_file, err_file))
}
