//! Inter-cycle delay computation
//!
//! The delay is `base + jitter`, where `base` depends on whether the current
//! hour is inside the active window and `jitter` is drawn uniformly from
//! `JITTER_MIN_SECS..=JITTER_MAX_SECS`. Jitter is always applied, including
//! while waiting out a connectivity outage.

use crate::window::ActiveWindow;
use rand::Rng;
use std::time::Duration;

/// Lower bound of the random jitter added to every delay
pub const JITTER_MIN_SECS: u64 = 20;

/// Upper bound (inclusive) of the random jitter added to every delay
pub const JITTER_MAX_SECS: u64 = 120;

/// Activity classification that produced a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    /// Inside the active window
    Active,

    /// Outside the window, still running at the reduced cadence
    Inactive,

    /// Outside the window and `inactive_still_active` is off; only jitter applies
    Dormant,
}

impl ActivityState {
    pub fn is_active(&self) -> bool {
        matches!(self, ActivityState::Active)
    }
}

/// Resolved delay for one cycle. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub delay: Duration,
    pub state: ActivityState,
}

/// Delay parameters taken from the `bot` section of the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepPolicy {
    pub window: ActiveWindow,
    pub active_delay_secs: u64,
    pub inactive_delay_secs: u64,
    pub inactive_still_active: bool,
}

impl SleepPolicy {
    pub fn is_active_hours(&self, hour: u32) -> bool {
        self.window.contains(hour)
    }

    /// Classify `hour` against the window and the inactive setting
    pub fn classify(&self, hour: u32) -> ActivityState {
        self.state_for(self.is_active_hours(hour))
    }

    /// State for an already-known activity flag
    pub fn state_for(&self, active: bool) -> ActivityState {
        if active {
            ActivityState::Active
        } else if self.inactive_still_active {
            ActivityState::Inactive
        } else {
            ActivityState::Dormant
        }
    }

    /// Base delay in seconds for a state, before jitter
    pub fn base_delay_secs(&self, state: ActivityState) -> u64 {
        match state {
            ActivityState::Active => self.active_delay_secs,
            ActivityState::Inactive => self.inactive_delay_secs,
            ActivityState::Dormant => 0,
        }
    }

    /// Base delay for `active` plus jitter
    pub fn compute_delay<R: Rng + ?Sized>(&self, active: bool, rng: &mut R) -> Duration {
        self.delay_for(self.state_for(active), rng)
    }

    /// Full decision for the given local hour
    pub fn decide<R: Rng + ?Sized>(&self, hour: u32, rng: &mut R) -> ScheduleDecision {
        let state = self.classify(hour);
        ScheduleDecision {
            delay: self.delay_for(state, rng),
            state,
        }
    }

    fn delay_for<R: Rng + ?Sized>(&self, state: ActivityState, rng: &mut R) -> Duration {
        Duration::from_secs(self.base_delay_secs(state) + jitter_secs(rng))
    }
}

fn jitter_secs<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.random_range(JITTER_MIN_SECS..=JITTER_MAX_SECS)
}
