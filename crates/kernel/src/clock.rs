//! Fixed-timestep accumulator.
//!
//! Render frames arrive at whatever rate the platform manages; logic runs
//! at exactly [`TICK_RATE_HZ`]. The clock converts one into the other and
//! reports how far between two ticks the current frame sits.

use tracing::warn;

pub const TICK_RATE_HZ: u32 = 60;

/// Length of one logic tick in seconds. Not configurable: physics is only
/// reproducible across frame rates when every step uses this value.
pub const TICK_DURATION: f64 = 1.0 / TICK_RATE_HZ as f64;

/// [`TICK_DURATION`] as handed to the physics step.
pub const TICK_DURATION_F32: f32 = TICK_DURATION as f32;

pub const DEFAULT_MAX_FRAME_DELTA: f64 = 0.25;

// Absorbs rounding when frame deltas sum to a whole number of ticks.
const STEP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct FixedClock {
    accumulator: f64,
    last_frame_delta: f64,
    max_frame_delta: f64,
    max_ticks_per_frame: u32,
    tick: u64,
    ticks_this_frame: u32,
    frames: u64,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DELTA)
    }
}

impl FixedClock {
    /// `max_frame_delta` is the longest frame the clock will catch up on.
    /// Non-positive or non-finite values fall back to one tick.
    pub fn new(max_frame_delta: f64) -> Self {
        let max_frame_delta = if max_frame_delta.is_finite() && max_frame_delta > 0.0 {
            max_frame_delta
        } else {
            TICK_DURATION
        };
        let max_ticks_per_frame = ((max_frame_delta * f64::from(TICK_RATE_HZ)).ceil() as u32).max(1);
        Self {
            accumulator: 0.0,
            last_frame_delta: 0.0,
            max_frame_delta,
            max_ticks_per_frame,
            tick: 0,
            ticks_this_frame: 0,
            frames: 0,
        }
    }

    pub fn tick_duration(&self) -> f64 {
        TICK_DURATION
    }

    pub fn max_frame_delta(&self) -> f64 {
        self.max_frame_delta
    }

    pub fn max_ticks_per_frame(&self) -> u32 {
        self.max_ticks_per_frame
    }

    /// Total ticks executed since creation.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn ticks_this_frame(&self) -> u32 {
        self.ticks_this_frame
    }

    /// Clamped duration of the most recent frame.
    pub fn frame_time(&self) -> f64 {
        self.last_frame_delta
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Start a render frame with the wall-clock delta since the last one.
    pub fn begin_frame(&mut self, raw_delta: f64) {
        let mut delta = if raw_delta.is_finite() && raw_delta > 0.0 {
            raw_delta
        } else {
            0.0
        };
        if delta > self.max_frame_delta {
            warn!(raw_delta, ceiling = self.max_frame_delta, "frame delta clamped");
            delta = self.max_frame_delta;
        }
        self.accumulator += delta;
        self.last_frame_delta = delta;
        self.ticks_this_frame = 0;
        self.frames += 1;
    }

    /// Consume one tick from the accumulator if one is due. Call in a loop.
    pub fn should_step_logic(&mut self) -> bool {
        if self.accumulator + STEP_EPSILON < TICK_DURATION {
            return false;
        }
        if self.ticks_this_frame >= self.max_ticks_per_frame {
            let surplus = (self.accumulator / TICK_DURATION).floor();
            warn!(
                frame = self.frames,
                ticks = self.ticks_this_frame,
                discarded_ticks = surplus,
                "tick budget exhausted, discarding backlog"
            );
            self.accumulator = self.accumulator.rem_euclid(TICK_DURATION);
            return false;
        }
        self.accumulator = (self.accumulator - TICK_DURATION).max(0.0);
        self.tick += 1;
        self.ticks_this_frame += 1;
        true
    }

    /// Fraction of a tick left in the accumulator, in `[0, 1)`. For
    /// presentation blending only.
    pub fn interpolation_alpha(&self) -> f32 {
        let alpha = (self.accumulator / TICK_DURATION).clamp(0.0, 1.0) as f32;
        alpha.min(1.0 - f32::EPSILON)
    }
}
