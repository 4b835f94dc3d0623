use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fs::{job_task, Fs};
use crate::partial::PartialRecipeTask;

/// Run a subprocess
mod run_cmd;

/// Ways of running jobs
mod submitter;
pub use submitter::{DebugSubmitter, Job, JobState, LocalSubmitter, SlurmSubmitter, Submitter};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} jobs didn't complete successfully")]
    JobsFailed(usize),
    #[error("poll_interval must be a non-negative number of seconds, got {0}")]
    InvalidPollInterval(f64),
}

/// Where jobs run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    /// In this process, one after the other.
    Debug,
    /// As child processes.
    #[default]
    Local,
    /// As slurm jobs.
    Slurm,
}

fn default_poll_interval() -> f64 {
    10.0
}

/// The `executor` section of an executor configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub cluster: Cluster,
    /// Seconds between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    /// Upper bound on jobs running at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
    /// Executable run by local and slurm jobs; defaults to this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            poll_interval: default_poll_interval(),
            max_parallel: None,
            partition: None,
            account: None,
            time: None,
            mem: None,
            extra_args: Vec::new(),
            program: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecutorFile {
    executor: ExecutorConfig,
}

impl ExecutorConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: ExecutorFile = serde_yaml::from_str(text)?;
        let config = file.executor;
        if !(config.poll_interval >= 0.0 && config.poll_interval.is_finite()) {
            return Err(Error::InvalidPollInterval(config.poll_interval).into());
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading executor config {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("while parsing executor config {:?}", path))
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().context("while locating this executable"),
        }
    }

    pub fn submitter(&self) -> Result<Box<dyn Submitter>> {
        Ok(match self.cluster {
            Cluster::Debug => Box::new(DebugSubmitter),
            Cluster::Local => Box::new(LocalSubmitter::new(self.program()?)),
            Cluster::Slurm => Box::new(SlurmSubmitter::new(self.program()?, self.clone())),
        })
    }
}

struct Submitted<'a> {
    index: usize,
    task: &'a PartialRecipeTask,
    job: Box<dyn Job>,
}

/// Run every pending task as a job and wait for all of them, writing task
/// files and job logs to `folder`. Failed jobs are logged and counted, not
/// retried. Returns the number of failures.
pub fn execute_pending_tasks(
    pending: &[PartialRecipeTask],
    config: &ExecutorConfig,
    folder: &Path,
    fs: &Fs,
) -> Result<usize> {
    fs.create_dir(folder)?;
    let mut submitter = config.submitter()?;
    let max_parallel = config.max_parallel.unwrap_or(usize::MAX).max(1);
    let interval = Duration::from_secs_f64(config.poll_interval);
    let total = pending.len();

    log::info!("Submitting {total} jobs...");
    let mut queue = pending.iter().enumerate();
    let mut running: Vec<Submitted<'_>> = Vec::with_capacity(total.min(max_parallel));
    let (mut finished, mut failures) = (0, 0);
    loop {
        while running.len() < max_parallel {
            let Some((index, task)) = queue.next() else {
                break;
            };
            let submitted = task
                .save(&job_task(folder, index))
                .and_then(|_| submitter.submit(index, task, folder));
            match submitted {
                Ok(job) => {
                    log::debug!("Submitted job id={}, name={:?}", job.id(), task.name());
                    running.push(Submitted { index, task, job });
                }
                Err(e) => {
                    finished += 1;
                    failures += 1;
                    log::error!(
                        "Could not submit job {}/{total}, name={:?}: {e:#}",
                        index + 1,
                        task.name()
                    );
                }
            }
        }
        if running.is_empty() {
            break;
        }

        let mut still_running = Vec::with_capacity(running.len());
        for mut submitted in running.drain(..) {
            let result = match submitted.job.poll() {
                JobState::Running => {
                    still_running.push(submitted);
                    continue;
                }
                JobState::Done => "DONE".to_owned(),
                JobState::Failed(reason) => {
                    failures += 1;
                    format!("FAILED [reason: {reason}]")
                }
            };
            finished += 1;
            log::info!(
                "Completed job {finished}/{total}, index={}, id={}, name={:?}: {result}",
                submitted.index,
                submitted.job.id(),
                submitted.task.name(),
            );
        }
        running = still_running;
        if !running.is_empty() {
            std::thread::sleep(interval);
        }
    }
    Ok(failures)
}
