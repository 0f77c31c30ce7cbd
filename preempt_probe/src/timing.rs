// src/timing.rs
use probe_types::{Outcome, TaskRole, TimedResult, WallTime};
use tracing::debug;

/// A running critical section. The start stamp is taken (and printed) on
/// construction; `finish` takes the stop stamp and closes the section.
pub struct TimedSection {
    role: TaskRole,
    start: WallTime,
}

impl TimedSection {
    pub fn start(role: TaskRole) -> Self {
        let start = WallTime::now();
        println!("{}", start_line(role, start));
        debug!(task = role.label(), start = %start, "critical section entered");
        Self { role, start }
    }

    /// Stop the clock. Only a successful section prints its stop line; failures
    /// have already printed their diagnostic at the point of failure.
    pub fn finish(self, outcome: Outcome) -> TimedResult {
        let stop = WallTime::now();
        let result = TimedResult::new(self.role, self.start, stop, outcome);
        if result.is_success() {
            println!("{}", stop_line(self.role, stop, result.elapsed_secs));
        }
        result
    }
}

fn start_line(role: TaskRole, start: WallTime) -> String {
    format!("{} start at {}", role.label(), start)
}

fn stop_line(role: TaskRole, stop: WallTime, elapsed_secs: f64) -> String {
    format!("{} stop at {}. elapse: {:.9} seconds.", role.label(), stop, elapsed_secs)
}

/// Run `op` between a start and a stop stamp.
pub fn timed<F>(role: TaskRole, op: F) -> TimedResult
where
    F: FnOnce() -> Outcome,
{
    let section = TimedSection::start(role);
    let outcome = op();
    section.finish(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn section_covers_the_wrapped_operation() {
        let r = timed(TaskRole::High, || {
            thread::sleep(Duration::from_millis(20));
            Outcome::Success
        });
        assert_eq!(r.role, TaskRole::High);
        assert!(r.is_success());
        assert!(r.stop >= r.start);
        assert!(r.elapsed_secs >= 0.02, "elapsed {}", r.elapsed_secs);
    }

    #[test]
    fn console_lines_are_nanosecond_formatted() {
        let start = WallTime::new(1_700_000_000, 250_000);
        let stop = WallTime::new(1_700_000_003, 250_042);
        assert_eq!(start_line(TaskRole::High, start), "T1 start at 1700000000.250000000");
        assert_eq!(
            stop_line(TaskRole::High, stop, stop.elapsed_secs_since(start)),
            "T1 stop at 1700000003.250042000. elapse: 3.000042000 seconds."
        );
        assert_eq!(
            stop_line(TaskRole::Low, WallTime::new(12, 5), 0.5),
            "T2 stop at 12.000005000. elapse: 0.500000000 seconds."
        );
    }

    #[test]
    fn failure_still_records_both_stamps() {
        let r = timed(TaskRole::Low, || {
            Outcome::OpenFailed("No such file or directory".into())
        });
        assert!(!r.is_success());
        assert!(r.elapsed_secs >= 0.0);
        assert!(r.stop >= r.start);
        assert_eq!(r.bytes_read, None);
    }
}
