//! Per-NPC countdowns that gate repeated movement commands.
//!
//! The executor restarts path following whenever it receives a command, so
//! re-sending an identical command every tick would stall the agent. Follow
//! moves are rate limited by a countdown; location moves are sent once and
//! only re-sent after a tick-count timeout marks them stale.

use serde::{Deserialize, Serialize};

/// Follow throttle and location timeout bookkeeping for one NPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveThrottle {
    /// Seconds left before the next follow move may be issued
    follow_remaining: f32,
    /// Countdown reset value
    follow_duration: f32,
    /// Ticks spent waiting on the current location command
    location_ticks: u32,
    /// Ticks after which a location command is stale
    location_timeout: u32,
}

impl MoveThrottle {
    /// Creates a throttle. The follow countdown starts expired.
    #[must_use]
    pub fn new(follow_duration: f32, location_timeout: u32) -> Self {
        Self {
            follow_remaining: 0.0,
            follow_duration: follow_duration.max(0.0),
            location_ticks: 0,
            location_timeout,
        }
    }

    /// Advances the countdown by one update, clamped at zero.
    pub fn tick(&mut self, delta_time: f32) {
        self.follow_remaining = (self.follow_remaining - delta_time.max(0.0)).max(0.0);
    }

    /// True exactly when the follow countdown has run out.
    #[must_use]
    pub fn can_issue_follow_move(&self) -> bool {
        self.follow_remaining <= 0.0
    }

    /// Restarts the follow countdown after a follow move was issued.
    pub fn reset_follow(&mut self) {
        self.follow_remaining = self.follow_duration;
    }

    /// Seconds left on the follow countdown.
    #[must_use]
    pub fn follow_remaining(&self) -> f32 {
        self.follow_remaining
    }

    /// Counts one more tick without arrival and returns the new count.
    pub fn increment_location_timeout(&mut self) -> u32 {
        self.location_ticks = self.location_ticks.saturating_add(1);
        self.location_ticks
    }

    /// Starts a fresh timeout window.
    pub fn reset_location_timeout(&mut self) {
        self.location_ticks = 0;
    }

    /// Whether the current location command has gone stale.
    #[must_use]
    pub fn location_timed_out(&self) -> bool {
        self.location_ticks > self.location_timeout
    }
}
