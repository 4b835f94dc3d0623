use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use anyhow::Result;

use super::run_cmd::spawn_logged;
use super::ExecutorConfig;
use crate::fs::{job_stderr, job_stdout, job_task};
use crate::partial::PartialRecipeTask;

/// Name of the hidden subcommand jobs run.
pub const PARTIAL_CMD: &str = "partial";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Done,
    Failed(String),
}

/// A submitted job, polled until it finishes.
pub trait Job {
    fn id(&self) -> String;
    fn poll(&mut self) -> JobState;
}

/// Turns pending tasks into jobs. The task file for job `index` is already
/// written to the log `folder` when `submit` is called.
pub trait Submitter {
    fn submit(&mut self, index: usize, task: &PartialRecipeTask, folder: &Path) -> Result<Box<dyn Job>>;
}

// DEBUG /////////////////////

/// Runs each task in this process, the first time its job is polled.
pub struct DebugSubmitter;

struct DebugJob {
    index: usize,
    task: Option<PartialRecipeTask>,
}

impl Submitter for DebugSubmitter {
    fn submit(&mut self, index: usize, task: &PartialRecipeTask, _folder: &Path) -> Result<Box<dyn Job>> {
        Ok(Box::new(DebugJob {
            index,
            task: Some(task.clone()),
        }))
    }
}

impl Job for DebugJob {
    fn id(&self) -> String {
        format!("debug_{}", self.index)
    }

    fn poll(&mut self) -> JobState {
        match self.task.take() {
            Some(task) => match task.run() {
                Ok(()) => JobState::Done,
                Err(e) => JobState::Failed(format!("{e:#}")),
            },
            None => JobState::Done,
        }
    }
}

// SUBPROCESSES //////////////

/// A job backed by a child process; its exit status is the job's outcome.
struct ChildJob {
    id: String,
    child: Child,
    stderr: PathBuf,
}

impl ChildJob {
    fn new(child: Child, stderr: PathBuf) -> Self {
        Self {
            id: child.id().to_string(),
            child,
            stderr,
        }
    }
}

impl Job for ChildJob {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn poll(&mut self) -> JobState {
        match self.child.try_wait() {
            Ok(None) => JobState::Running,
            Ok(Some(status)) if status.success() => JobState::Done,
            Ok(Some(status)) => JobState::Failed(format!("{status}, see {:?}", self.stderr)),
            Err(e) => JobState::Failed(e.to_string()),
        }
    }
}

/// Runs each task as a child process of this machine.
pub struct LocalSubmitter {
    program: PathBuf,
}

impl LocalSubmitter {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Submitter for LocalSubmitter {
    fn submit(&mut self, index: usize, _task: &PartialRecipeTask, folder: &Path) -> Result<Box<dyn Job>> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(PARTIAL_CMD).arg("--task").arg(job_task(folder, index));
        let stderr = job_stderr(folder, index);
        let child = spawn_logged(&mut cmd, &job_stdout(folder, index), &stderr)?;
        Ok(Box::new(ChildJob::new(child, stderr)))
    }
}

/// Submits each task to slurm with a blocking `sbatch --wait`.
pub struct SlurmSubmitter {
    program: PathBuf,
    config: ExecutorConfig,
}

impl SlurmSubmitter {
    pub fn new(program: PathBuf, config: ExecutorConfig) -> Self {
        Self { program, config }
    }

    fn sbatch(&self, index: usize, folder: &Path) -> Command {
        let mut cmd = Command::new("sbatch");
        cmd.arg("--wait").arg("--parsable");
        cmd.arg(format!("--job-name=s2f_recipe_{index}"));
        cmd.arg(format!("--output={}", folder.join(format!("{index}_%j.out")).display()));
        cmd.arg(format!("--error={}", folder.join(format!("{index}_%j.err")).display()));
        let options = [
            ("partition", &self.config.partition),
            ("account", &self.config.account),
            ("time", &self.config.time),
            ("mem", &self.config.mem),
        ];
        for (name, value) in options {
            if let Some(value) = value {
                cmd.arg(format!("--{name}={value}"));
            }
        }
        cmd.args(&self.config.extra_args);

        let wrapped = [
            self.program.to_string_lossy().into_owned(),
            PARTIAL_CMD.to_owned(),
            "--task".to_owned(),
            job_task(folder, index).to_string_lossy().into_owned(),
        ];
        cmd.arg(format!("--wrap={}", shell_words::join(wrapped)));

        for key in scrubbed_env(std::env::vars_os().filter_map(|(k, _)| k.into_string().ok())) {
            cmd.env_remove(key);
        }
        cmd
    }
}

impl Submitter for SlurmSubmitter {
    fn submit(&mut self, index: usize, _task: &PartialRecipeTask, folder: &Path) -> Result<Box<dyn Job>> {
        let mut cmd = self.sbatch(index, folder);
        let stderr = job_stderr(folder, index);
        let child = spawn_logged(&mut cmd, &job_stdout(folder, index), &stderr)?;
        Ok(Box::new(ChildJob::new(child, stderr)))
    }
}

/// Variables of the coordinating process that would leak an allocation
/// into submitted jobs. Account and partition are kept.
fn scrubbed_env<I: Iterator<Item = String>>(keys: I) -> Vec<String> {
    keys.filter(|key| key.starts_with("SLURM_") || key.starts_with("PMI_"))
        .filter(|key| !key.ends_with("_ACCOUNT") && !key.ends_with("_PARTITION"))
        .collect()
}
