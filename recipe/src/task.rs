use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use util::Timer;

/// Logging configuration handed to each task explicitly,
/// so workers configure themselves the same way as the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSetup {
    /// Number of `-v` flags.
    pub verbose: u8,
}

impl LogSetup {
    pub fn new(verbose: u8) -> Self {
        Self { verbose }
    }

    pub fn level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Log to stderr at our level. Calling this more than once is harmless.
    pub fn apply(&self) {
        simple_logging::log_to_stderr(self.level());
    }
}

type TaskFn<T> = Box<dyn FnOnce(&mut StdRng) -> Result<T> + Send>;

/// A deferred unit of work, consumed by exactly one call to [`Task::run`].
pub struct Task<T> {
    func: TaskFn<T>,
    group: Option<String>,
}

/// Outcome of running a single [`Task`].
#[derive(Debug)]
pub struct TaskResult<T> {
    pub id: usize,
    pub group: String,
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Task<T> {
    /// Create a task that calls `func` with its private random source.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce(&mut StdRng) -> Result<T> + Send + 'static,
    {
        Self {
            func: Box::new(func),
            group: None,
        }
    }

    /// Label this task as part of `group` (usually the strategy name).
    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_owned());
        self
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Execute the task. The random source is seeded from `seed` when given,
    /// otherwise from OS entropy.
    pub fn run(
        self,
        task_id: usize,
        seed: Option<u64>,
        log: Option<&LogSetup>,
    ) -> Result<TaskResult<T>> {
        if let Some(log) = log {
            log.apply();
        }
        let group = self.group.unwrap_or_default();
        let msg = format!("Executed task {task_id} for {group}");
        let func = self.func;
        util::timed(&msg, || {
            let timer = Timer::now();
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let value = func(&mut rng)?;
            Ok(TaskResult {
                id: task_id,
                group,
                value,
                elapsed: timer.elapsed(),
            })
        })
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("group", &self.group).finish()
    }
}
