//! Fixed-step clock.
//!
//! Frames arrive with whatever delta the host produces; the movement core is
//! only ever ticked with the fixed step.

/// Accumulates frame time into whole fixed updates.
#[derive(Debug, Clone)]
pub struct FixedStep {
    /// Accumulator for fixed timestep
    accumulator: f32,
    /// Fixed timestep delta
    fixed_dt: f32,
    /// Cap on updates per frame
    max_updates: u32,
}

impl FixedStep {
    /// Creates a clock running `tick_rate` updates per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        Self {
            accumulator: 0.0,
            fixed_dt: 1.0 / tick_rate.max(1) as f32,
            max_updates: 10,
        }
    }

    /// Get the fixed timestep value.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Accumulate time for fixed timestep updates.
    /// Returns the number of fixed updates that should be performed.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.max(0.0);
        let mut count = 0;

        while self.accumulator >= self.fixed_dt && count < self.max_updates {
            self.accumulator -= self.fixed_dt;
            count += 1;
        }

        // Still behind after the cap: drop the backlog
        if self.accumulator > self.fixed_dt * 2.0 {
            self.accumulator = 0.0;
        }

        count
    }

    /// Clears accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
