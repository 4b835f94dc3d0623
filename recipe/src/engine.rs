use anyhow::{Context, Result};
use crossbeam::channel;

use crate::task::{LogSetup, Task, TaskResult};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Number of jobs can't be 0")]
    ZeroJobs,
    #[error("A worker thread panicked")]
    WorkerPanicked,
    #[error("No result received for task {0}")]
    MissingResult(usize),
}

/// Translate a `jobs` setting into a number of workers:
/// `-1` means all cpus, and in general a negative value means `cpus + 1 + jobs`.
pub fn resolve_jobs(jobs: i32) -> Result<usize, Error> {
    match jobs {
        0 => Err(Error::ZeroJobs),
        j if j > 0 => Ok(j as usize),
        j => {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1) as i64;
            Ok((cpus + 1 + j as i64).max(1) as usize)
        }
    }
}

/// Run `tasks` one after the other in the current thread, unseeded.
/// Stops at the first failure.
pub fn run_sequential<T>(tasks: Vec<Task<T>>) -> Result<Vec<TaskResult<T>>> {
    let mut results = Vec::with_capacity(tasks.len());
    for (i, task) in tasks.into_iter().enumerate() {
        results.push(task.run(i, None, None).with_context(|| format!("while running task {i}"))?);
    }
    Ok(results)
}

/// Run `tasks` on a pool of `jobs` worker threads.
///
/// Task `i` is seeded with `base_seed + i`, so results don't depend on the
/// number of workers. Every task runs to completion before this returns;
/// results are in submission order. If any task fails, the failure of the
/// lowest-indexed one is returned.
pub fn run_parallel<T: Send>(
    tasks: Vec<Task<T>>,
    jobs: i32,
    base_seed: Option<u64>,
    log: Option<&LogSetup>,
) -> Result<Vec<TaskResult<T>>> {
    let num_tasks = tasks.len();
    let workers = resolve_jobs(jobs)?.min(num_tasks).max(1);
    log::debug!("Running {num_tasks} tasks on {workers} workers");

    let (task_tx, task_rx) = channel::bounded::<(usize, Task<T>)>(workers);
    let (result_tx, result_rx) = channel::unbounded();

    crossbeam::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move |_| {
                for (i, task) in task_rx.iter() {
                    let seed = base_seed.map(|seed| seed.wrapping_add(i as u64));
                    let res = task.run(i, seed, log);
                    if result_tx.send((i, res)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);
        for (i, task) in tasks.into_iter().enumerate() {
            // only fails if every worker is gone:
            if task_tx.send((i, task)).is_err() {
                break;
            }
        }
        drop(task_tx);
    })
    .map_err(|_| Error::WorkerPanicked)?;

    let mut slots: Vec<Option<Result<TaskResult<T>>>> = (0..num_tasks).map(|_| None).collect();
    for (i, res) in result_rx.iter() {
        slots[i] = Some(res);
    }

    let mut results = Vec::with_capacity(num_tasks);
    for (i, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(res)) => results.push(res),
            Some(Err(e)) => return Err(e.context(format!("while running task {i}"))),
            None => return Err(Error::MissingResult(i).into()),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;

    fn draws(n: usize) -> Vec<Task<u64>> {
        (0..n)
            .map(|_| Task::new(|rng| Ok(rng.random::<u64>())).with_group("draws"))
            .collect()
    }

    #[test]
    fn test_resolve_jobs() {
        assert!(matches!(resolve_jobs(0), Err(Error::ZeroJobs)));
        assert_eq!(3, resolve_jobs(3).unwrap());
        let cpus = std::thread::available_parallelism().unwrap().get();
        assert_eq!(cpus, resolve_jobs(-1).unwrap());
        assert_eq!(1, resolve_jobs(-10_000).unwrap());
    }

    #[test]
    fn test_results_in_submission_order() -> Result<()> {
        let tasks: Vec<Task<usize>> = (0..20)
            .map(|i| {
                Task::new(move |_| {
                    // later tasks finish first:
                    std::thread::sleep(std::time::Duration::from_millis(20 - i as u64));
                    Ok(i * 10)
                })
            })
            .collect();
        let results = run_parallel(tasks, 4, None, None)?;
        for (i, res) in results.iter().enumerate() {
            assert_eq!(i, res.id);
            assert_eq!(i * 10, res.value);
        }
        Ok(())
    }

    #[test]
    fn test_seeds_independent_of_workers() -> Result<()> {
        let one: Vec<u64> = run_parallel(draws(12), 1, Some(5), None)?
            .into_iter()
            .map(|r| r.value)
            .collect();
        let four: Vec<u64> = run_parallel(draws(12), 4, Some(5), None)?
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(one, four);
        // task i is seeded with base_seed + i:
        let shifted: Vec<u64> = run_parallel(draws(12), 3, Some(6), None)?
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(one[1..], shifted[..11]);
        Ok(())
    }

    #[test]
    fn test_lowest_failure_reported() {
        let tasks: Vec<Task<usize>> = (0..8)
            .map(|i| {
                Task::new(move |_| {
                    if i == 2 || i == 5 {
                        anyhow::bail!("task {i} failed");
                    }
                    Ok(i)
                })
            })
            .collect();
        let err = run_parallel(tasks, 3, Some(0), None).unwrap_err();
        assert_eq!("task 2 failed", err.root_cause().to_string());
    }

    #[test]
    fn test_sequential() -> Result<()> {
        let results = run_sequential(draws(3))?;
        assert_eq!(3, results.len());
        assert_eq!("draws", results[2].group);

        let failing: Vec<Task<()>> = vec![Task::new(|_| Err(anyhow::anyhow!("boom")))];
        assert!(run_sequential(failing).is_err());
        Ok(())
    }

    #[test]
    fn test_zero_jobs_is_an_error() {
        assert!(run_parallel(draws(2), 0, None, None).is_err());
    }

    #[test]
    fn test_empty() -> Result<()> {
        assert!(run_parallel(draws(0), -1, Some(0), None)?.is_empty());
        Ok(())
    }
}
