use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use recipe::LogSetup;

use crate::args::{Args, Command};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Input file {0:?} does not exist")]
    MissingInput(PathBuf),
    #[error("--jobs must not be 0")]
    ZeroJobs,
}

/// Options for generating a recipe, whether in-process or as a job.
#[derive(Debug, Clone)]
pub struct Generate {
    pub dataset: PathBuf,
    pub strategies: PathBuf,
    pub output: PathBuf,
    pub seed: u64,
    pub jobs: i32,
    pub skip_validation: bool,
}

/// Options for a split run, coordinated through the job executor.
#[derive(Debug, Clone)]
pub struct Run {
    pub dataset: PathBuf,
    pub config: PathBuf,
    pub executor: PathBuf,
    pub output: PathBuf,
    pub workdir: PathBuf,
    pub seed: u64,
    pub jobs: i32,
    pub skip_validation: bool,
}

#[derive(Debug, Clone)]
pub enum Action {
    Generate(Generate),
    Run(Run),
    Clean { workdir: PathBuf },
    Partial { task: PathBuf },
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. input paths are canonical.
#[derive(Debug, Clone)]
pub struct Settings {
    pub verbose: u8,
    pub action: Action,
}

impl Settings {
    /// Logging setup for this process and any jobs it starts.
    pub fn log(&self) -> LogSetup {
        LogSetup::new(self.verbose)
    }
}

/// Canonical path of an input file, which must exist.
fn input(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(Error::MissingInput(path).into());
    }
    path.canonicalize()
        .with_context(|| format!("while resolving input path {:?}", path))
}

/// Absolute path of an output location, which may not exist yet.
fn output(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn jobs(jobs: i32) -> Result<i32, Error> {
    if jobs == 0 {
        Err(Error::ZeroJobs)
    } else {
        Ok(jobs)
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let action = match args.command {
            Command::Generate(g) => Action::Generate(Generate {
                dataset: input(&g.dataset)?,
                strategies: input(&g.strategies)?,
                output: output(&g.output)?,
                seed: g.seed,
                jobs: jobs(g.jobs)?,
                skip_validation: g.skip_validation,
            }),
            Command::Run(r) => Action::Run(Run {
                dataset: input(&r.dataset)?,
                config: input(&r.config)?,
                executor: input(&r.executor)?,
                output: output(&r.output)?,
                workdir: output(&r.workdir)?,
                seed: r.seed,
                jobs: jobs(r.jobs)?,
                skip_validation: r.skip_validation,
            }),
            Command::Clean { workdir } => Action::Clean {
                workdir: output(&workdir)?,
            },
            Command::Partial { task } => Action::Partial {
                task: input(&task)?,
            },
        };
        Ok(Self {
            verbose: args.verbose,
            action,
        })
    }
}
