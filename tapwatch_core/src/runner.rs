use crate::error::{Result as CoreResult, SessionError};
use crate::report::CycleReport;
use crate::session::{SessionController, SessionState};
use std::time::{Duration, Instant};

/// Why [`run`] returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// A stop was requested through the session's control handle.
    Stopped,
    /// The requested number of cycles completed.
    CycleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub end: RunEnd,
}

/// Length of the next sleep slice while waiting for the next cycle.
///
/// `None` once the interval has elapsed. Slices never exceed `poll` so a
/// control request is observed promptly.
#[inline]
fn next_slice(interval: Duration, elapsed: Duration, poll: Duration) -> Option<Duration> {
    let left = interval.checked_sub(elapsed).filter(|d| !d.is_zero())?;
    Some(left.min(poll.max(Duration::from_millis(1))))
}

/// Drive `session` at its configured cadence, calling `publish` with the
/// report of every completed cycle.
///
/// Pause and resume requests on the control handle move the session
/// between `Sampling` and `Paused`; paused time does not count toward
/// `max_cycles`. Returns an error when the session enters `Error`; the
/// session is left there until the caller stops or restarts it.
pub fn run<F>(
    session: &mut SessionController,
    max_cycles: Option<u64>,
    mut publish: F,
) -> CoreResult<RunSummary>
where
    F: FnMut(&CycleReport),
{
    session.start()?;
    let control = session.control();
    let clock = session.clock().clone();
    let interval = session.cfg().interval;
    let poll = session.cfg().control_poll;
    tracing::info!(
        fields = session.fields().len(),
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        "session start"
    );

    let mut cycles = 0u64;
    loop {
        if control.stop_requested() {
            session.stop();
            tracing::info!(cycles, "session stopped on request");
            return Ok(RunSummary {
                cycles,
                end: RunEnd::Stopped,
            });
        }
        if control.pause_requested() {
            session.pause()?;
            clock.sleep(poll);
            continue;
        }
        if session.state() == SessionState::Paused {
            session.resume()?;
        }

        let started: Instant = clock.now();
        let report = session.run_cycle()?;
        publish(&report);
        if session.state() == SessionState::Error {
            let fault = session
                .fault()
                .cloned()
                .unwrap_or(SessionError::CollaboratorFailures {
                    cycles: report.failed_cycles,
                });
            return Err(crate::error::Report::new(fault));
        }
        cycles += 1;
        if max_cycles.is_some_and(|max| cycles >= max) {
            session.stop();
            tracing::info!(cycles, "cycle limit reached");
            return Ok(RunSummary {
                cycles,
                end: RunEnd::CycleLimit,
            });
        }

        while let Some(slice) =
            next_slice(interval, clock.now().saturating_duration_since(started), poll)
        {
            if control.stop_requested() || control.pause_requested() {
                break;
            }
            clock.sleep(slice);
        }
    }
}
