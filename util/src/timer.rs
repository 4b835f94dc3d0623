use std::time::{Duration, Instant};

/// Utility for keeping track of the time it took to perform some operation.
pub struct Timer {
    start_time: Instant,
}

impl Timer {
    /// Create a new `Timer`.
    pub fn now() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Reset internal timer to now.
    pub fn reset(&mut self) {
        self.start_time = Instant::now();
    }

    /// Time elapsed since the timer was last reset.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Print a message with the elapsed time since the timer was last reset.
    pub fn print_elapsed(&self, task: &str) {
        eprintln!("{} took {:?}", task, self.elapsed());
    }
}

/// Run `f`, then log how long it took at info level along with
/// whether it returned `Ok` ("DONE") or `Err` ("FAILED").
pub fn timed<T, E, F>(msg: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let timer = Timer::now();
    let res = f();
    let status = if res.is_ok() { "DONE" } else { "FAILED" };
    log::info!(
        "{msg}: {:.2} seconds [{status}]",
        timer.elapsed().as_secs_f64()
    );
    res
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_timed_passes_result_through() {
        let ok: Result<u8, &str> = timed("ok", || Ok(3));
        assert_eq!(ok, Ok(3));
        let err: Result<u8, &str> = timed("err", || Err("nope"));
        assert_eq!(err, Err("nope"));
    }
}
