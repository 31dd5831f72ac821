//! Close automation state.
//!
//! At most one close run exists at a time. Each start bumps a generation
//! counter so a run that was stopped and superseded before it noticed can
//! tell it no longer owns the wait LED and exit choreography.
//!
//! The run loop itself lives on [`DoorController`](crate::DoorController);
//! this module holds the shared flag, the beam-clear timer, and the pure
//! decision taken on every poll.

use garagedoor_core::{ArmedStatus, BeamStatus, RollupStatus};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    generation: u64,
}

/// Outcome of an atomic toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Started(u64),
    Stopped,
}

/// What the close loop does on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep polling.
    Wait,
    /// Press again and restart the beam-clear timer.
    Retry,
    /// The door is neither open nor closed after the timeout.
    Abort(RollupStatus),
    /// The door is closed.
    Done,
}

/// Decide the next step of the close loop.
///
/// `since_clear` is the time since the beam was last seen clear, or `None`
/// if no clear time is recorded.
///
/// ```
/// use garagedoor_control::automation::{decide, Step};
/// use garagedoor_core::{BeamStatus, RollupStatus};
/// use std::time::Duration;
///
/// let close_time = Duration::from_secs(13);
/// let step = decide(Some(Duration::from_secs(14)), close_time, BeamStatus::Clear, RollupStatus::Open);
/// assert_eq!(step, Step::Retry);
///
/// let step = decide(Some(Duration::from_secs(14)), close_time, BeamStatus::Blocked, RollupStatus::Open);
/// assert_eq!(step, Step::Wait);
/// ```
#[must_use]
pub fn decide(
    since_clear: Option<Duration>,
    close_time: Duration,
    beam: BeamStatus,
    rollup: RollupStatus,
) -> Step {
    let timed_out = since_clear.is_some_and(|elapsed| elapsed > close_time);
    if timed_out && beam == BeamStatus::Clear {
        return match rollup {
            RollupStatus::Open => Step::Retry,
            other => Step::Abort(other),
        };
    }
    if rollup == RollupStatus::Closed {
        Step::Done
    } else {
        Step::Wait
    }
}

/// Shared run flag and beam-clear timer.
#[derive(Debug, Default)]
pub struct CloseAutomation {
    state: Mutex<RunState>,
    last_beam_clear: Mutex<Option<Instant>>,
}

impl CloseAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn armed_status(&self) -> ArmedStatus {
        ArmedStatus::from_running(self.is_running())
    }

    /// Mark running and return the new generation, or `None` if a run is
    /// already active.
    pub fn try_begin(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.running {
            return None;
        }
        state.running = true;
        state.generation += 1;
        Some(state.generation)
    }

    /// Clear the run flag. The loop notices within one poll.
    ///
    /// Returns `true` if a run was active.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        std::mem::replace(&mut state.running, false)
    }

    pub fn toggle(&self) -> Toggled {
        let mut state = self.state.lock();
        if state.running {
            state.running = false;
            Toggled::Stopped
        } else {
            state.running = true;
            state.generation += 1;
            Toggled::Started(state.generation)
        }
    }

    /// Whether the run with this generation should keep looping.
    pub fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock();
        state.running && state.generation == generation
    }

    /// End a run. Returns `true` if the caller still owns the exit
    /// choreography, i.e. no newer run has started.
    ///
    /// `on_exit` runs under the run-state lock, so no new run can begin
    /// until it returns.
    pub fn finish(&self, generation: u64, on_exit: impl FnOnce()) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.running = false;
        on_exit();
        true
    }

    pub fn mark_beam_clear(&self, at: Instant) {
        *self.last_beam_clear.lock() = Some(at);
    }

    pub fn clear_beam_timer(&self) {
        *self.last_beam_clear.lock() = None;
    }

    pub fn last_beam_clear(&self) -> Option<Instant> {
        *self.last_beam_clear.lock()
    }

    /// Time since the last recorded beam clear, restarting the timer at
    /// `now` when the beam is clear but nothing is recorded.
    pub fn since_beam_clear(&self, beam: BeamStatus, now: Instant) -> Option<Duration> {
        let mut last = self.last_beam_clear.lock();
        if last.is_none() && beam == BeamStatus::Clear {
            *last = Some(now);
        }
        last.map(|at| now.saturating_duration_since(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CLOSE: Duration = Duration::from_secs(13);

    #[rstest]
    #[case(None, BeamStatus::Clear, RollupStatus::Open, Step::Wait)]
    #[case(Some(5), BeamStatus::Clear, RollupStatus::Open, Step::Wait)]
    #[case(Some(13), BeamStatus::Clear, RollupStatus::Open, Step::Wait)]
    #[case(Some(14), BeamStatus::Clear, RollupStatus::Open, Step::Retry)]
    #[case(Some(14), BeamStatus::Blocked, RollupStatus::Open, Step::Wait)]
    #[case(Some(14), BeamStatus::Clear, RollupStatus::Transit, Step::Abort(RollupStatus::Transit))]
    #[case(Some(14), BeamStatus::Clear, RollupStatus::Unknown, Step::Abort(RollupStatus::Unknown))]
    #[case(Some(14), BeamStatus::Clear, RollupStatus::Closed, Step::Abort(RollupStatus::Closed))]
    #[case(Some(2), BeamStatus::Clear, RollupStatus::Closed, Step::Done)]
    #[case(None, BeamStatus::Blocked, RollupStatus::Closed, Step::Done)]
    #[case(None, BeamStatus::Blocked, RollupStatus::Unknown, Step::Wait)]
    fn test_decide(
        #[case] since_secs: Option<u64>,
        #[case] beam: BeamStatus,
        #[case] rollup: RollupStatus,
        #[case] expected: Step,
    ) {
        let since = since_secs.map(Duration::from_secs);
        assert_eq!(decide(since, CLOSE, beam, rollup), expected);
    }

    #[test]
    fn test_singleton_begin() {
        let automation = CloseAutomation::new();
        let first = automation.try_begin();
        assert_eq!(first, Some(1));
        assert_eq!(automation.try_begin(), None);
        assert!(automation.is_current(1));
    }

    #[test]
    fn test_double_toggle_nets_to_idle() {
        let automation = CloseAutomation::new();
        assert_eq!(automation.toggle(), Toggled::Started(1));
        assert_eq!(automation.toggle(), Toggled::Stopped);
        assert!(!automation.is_running());
        assert_eq!(automation.armed_status(), ArmedStatus::Disarmed);
    }

    #[test]
    fn test_superseded_run_skips_finish() {
        let automation = CloseAutomation::new();
        let old = automation.try_begin().unwrap();
        automation.stop();
        let new = automation.try_begin().unwrap();

        let mut exits = 0;
        assert!(!automation.is_current(old));
        assert!(!automation.finish(old, || exits += 1));
        assert!(automation.is_running());
        assert_eq!(exits, 0);

        assert!(automation.finish(new, || exits += 1));
        assert!(!automation.is_running());
        assert_eq!(exits, 1);
    }

    #[test]
    fn test_begin_waits_for_exit_actions() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let automation = Arc::new(CloseAutomation::new());
        let exited = Arc::new(AtomicBool::new(false));
        let generation = automation.try_begin().unwrap();

        let mut starter = None;
        assert!(automation.finish(generation, || {
            let automation = Arc::clone(&automation);
            let exited_seen = Arc::clone(&exited);
            starter = Some(std::thread::spawn(move || {
                let begun = automation.try_begin();
                (begun, exited_seen.load(Ordering::SeqCst))
            }));
            std::thread::sleep(std::time::Duration::from_millis(50));
            exited.store(true, Ordering::SeqCst);
        }));

        let (begun, saw_exit) = starter.unwrap().join().unwrap();
        assert_eq!(begun, Some(generation + 1));
        assert!(saw_exit, "a new run began before the exit actions finished");
    }

    #[test]
    fn test_stop_reports_previous_state() {
        let automation = CloseAutomation::new();
        assert!(!automation.stop());
        automation.try_begin();
        assert!(automation.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_beam_timer_repair_and_block() {
        let automation = CloseAutomation::new();
        let start = Instant::now();

        assert_eq!(automation.since_beam_clear(BeamStatus::Blocked, start), None);
        assert_eq!(
            automation.since_beam_clear(BeamStatus::Clear, start),
            Some(Duration::ZERO)
        );

        let later = start + Duration::from_secs(3);
        assert_eq!(
            automation.since_beam_clear(BeamStatus::Clear, later),
            Some(Duration::from_secs(3))
        );

        automation.clear_beam_timer();
        assert_eq!(automation.last_beam_clear(), None);
        automation.mark_beam_clear(later);
        assert_eq!(automation.last_beam_clear(), Some(later));
    }
}
