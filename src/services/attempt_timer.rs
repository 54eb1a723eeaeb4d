//! Countdown for a timed attempt.
//!
//! The timer is a plain state machine fed with instants; it never submits by
//! itself. Expiry raises `auto_submitted` once and the owner reacts to it.

use std::time::Duration;

use tokio::time::Instant;

use crate::core::time::format_clock;

/// Share of the limit after which the low-time warning shows.
const LOW_TIME_PROGRESS_PERCENT: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Expired,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// Returned by exactly one tick, the one that crossed the limit.
    Expired,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub elapsed_seconds: u64,
    pub remaining_seconds: Option<u64>,
    pub progress_percent: Option<u8>,
    pub low_time: bool,
    pub auto_submitted: bool,
}

impl TimerSnapshot {
    /// Remaining time as `m:ss`, or `None` for untimed attempts.
    pub fn remaining_display(&self) -> Option<String> {
        self.remaining_seconds.map(format_clock)
    }
}

#[derive(Debug, Clone)]
pub struct AttemptTimer {
    limit: Option<Duration>,
    state: TimerState,
    started_at: Option<Instant>,
    frozen_elapsed: Option<Duration>,
    auto_submitted: bool,
}

impl AttemptTimer {
    pub fn new(limit_seconds: Option<u64>) -> Self {
        Self {
            limit: limit_seconds.map(Duration::from_secs),
            state: TimerState::Idle,
            started_at: None,
            frozen_elapsed: None,
            auto_submitted: false,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn limit_seconds(&self) -> Option<u64> {
        self.limit.map(|limit| limit.as_secs())
    }

    pub fn auto_submitted(&self) -> bool {
        self.auto_submitted
    }

    /// Starts measuring. Only timed attempts enter `Running`; untimed ones stay
    /// `Idle` but still track elapsed time for the result.
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_some() || self.state != TimerState::Idle {
            return;
        }
        self.started_at = Some(now);
        if self.limit.is_some() {
            self.state = TimerState::Running;
        }
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state != TimerState::Running {
            return TickOutcome::Ignored;
        }
        let (Some(limit), Some(_)) = (self.limit, self.started_at) else {
            return TickOutcome::Ignored;
        };

        let elapsed = self.live_elapsed(now);
        if elapsed >= limit {
            self.state = TimerState::Expired;
            self.frozen_elapsed = Some(limit);
            self.auto_submitted = true;
            return TickOutcome::Expired;
        }
        TickOutcome::Running
    }

    /// Freezes elapsed time. Later ticks are ignored.
    pub fn stop(&mut self, now: Instant) -> u64 {
        if self.state != TimerState::Stopped {
            if self.frozen_elapsed.is_none() {
                self.frozen_elapsed = Some(self.capped(self.live_elapsed(now)));
            }
            self.state = TimerState::Stopped;
        }
        self.elapsed_seconds(now)
    }

    pub fn elapsed_seconds(&self, now: Instant) -> u64 {
        let elapsed = match self.frozen_elapsed {
            Some(frozen) => frozen,
            None => self.capped(self.live_elapsed(now)),
        };
        elapsed.as_secs()
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        let elapsed_seconds = self.elapsed_seconds(now);
        let limit_seconds = self.limit_seconds();
        let remaining_seconds = limit_seconds.map(|limit| limit.saturating_sub(elapsed_seconds));
        let progress_percent = limit_seconds.map(|limit| {
            if limit == 0 {
                100
            } else {
                (elapsed_seconds.saturating_mul(100) / limit).min(100) as u8
            }
        });
        let low_time = progress_percent.is_some_and(|progress| progress > LOW_TIME_PROGRESS_PERCENT);

        TimerSnapshot {
            state: self.state,
            elapsed_seconds,
            remaining_seconds,
            progress_percent,
            low_time,
            auto_submitted: self.auto_submitted,
        }
    }

    fn live_elapsed(&self, now: Instant) -> Duration {
        self.started_at.map(|started| now.saturating_duration_since(started)).unwrap_or_default()
    }

    fn capped(&self, elapsed: Duration) -> Duration {
        match self.limit {
            Some(limit) => elapsed.min(limit),
            None => elapsed,
        }
    }
}
