//! Visible countdowns (pre-roll and recording)
//!
//! A countdown shows whole seconds remaining once per second, holds zero for
//! a second and then clears itself.

use std::time::{Duration, Instant};

use crate::COUNTDOWN_LINGER;

/// What a countdown is counting towards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownKind {
    /// Waiting before a recording starts (dimmed)
    PreRoll,
    /// A recording is running (bright)
    Recording,
}

impl CountdownKind {
    pub fn is_recording(self) -> bool {
        matches!(self, CountdownKind::Recording)
    }
}

/// What the countdown sink should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownDisplay {
    Show { remaining: u64, kind: CountdownKind },
    Clear,
}

/// One running countdown
#[derive(Debug, Clone)]
pub struct Countdown {
    kind: CountdownKind,
    started: Instant,
    seconds: u64,
    shown: Option<u64>,
    finished: bool,
}

impl Countdown {
    /// Start counting `duration` (rounded up to whole seconds)
    pub fn start(kind: CountdownKind, duration: Duration, now: Instant) -> Self {
        Self {
            kind,
            started: now,
            seconds: duration.as_secs_f64().ceil() as u64,
            shown: None,
            finished: false,
        }
    }

    pub fn kind(&self) -> CountdownKind {
        self.kind
    }

    /// Has the display been cleared?
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whole seconds remaining at `now`
    pub fn remaining(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs();
        self.seconds.saturating_sub(elapsed)
    }

    /// Display change at `now`, if any
    pub fn poll(&mut self, now: Instant) -> Option<CountdownDisplay> {
        if self.finished {
            return None;
        }

        let clear_at = self.started + Duration::from_secs(self.seconds) + COUNTDOWN_LINGER;
        if now >= clear_at {
            self.finished = true;
            return Some(CountdownDisplay::Clear);
        }

        let remaining = self.remaining(now);
        if self.shown == Some(remaining) {
            return None;
        }
        self.shown = Some(remaining);
        Some(CountdownDisplay::Show {
            remaining,
            kind: self.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    fn show(remaining: u64) -> Option<CountdownDisplay> {
        Some(CountdownDisplay::Show {
            remaining,
            kind: CountdownKind::Recording,
        })
    }

    #[test]
    fn test_counts_down_each_second() {
        let start = Instant::now();
        let mut countdown = Countdown::start(CountdownKind::Recording, Duration::from_secs(3), start);

        assert_eq!(countdown.poll(start), show(3));
        assert_eq!(countdown.poll(at(start, 500)), None);
        assert_eq!(countdown.poll(at(start, 1000)), show(2));
        assert_eq!(countdown.poll(at(start, 2100)), show(1));
        assert_eq!(countdown.poll(at(start, 3000)), show(0));
        assert_eq!(countdown.poll(at(start, 3500)), None);
        assert_eq!(countdown.poll(at(start, 4000)), Some(CountdownDisplay::Clear));
        assert!(countdown.is_finished());
        assert_eq!(countdown.poll(at(start, 9000)), None);
    }

    #[test]
    fn test_late_poll_skips_to_current_value() {
        let start = Instant::now();
        let mut countdown = Countdown::start(CountdownKind::PreRoll, Duration::from_secs(10), start);
        assert_eq!(
            countdown.poll(at(start, 7200)),
            Some(CountdownDisplay::Show {
                remaining: 3,
                kind: CountdownKind::PreRoll
            })
        );
    }

    #[test]
    fn test_fractional_duration_rounds_up() {
        let start = Instant::now();
        let countdown = Countdown::start(CountdownKind::PreRoll, Duration::from_millis(1500), start);
        assert_eq!(countdown.remaining(start), 2);
    }
}
