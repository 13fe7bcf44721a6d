//! Shader globals and the clocks that feed them.
//!
//! The display loop owns the authoritative time and mouse state and copies
//! them into the shared [`ShaderGlobals`] snapshot at handshake boundaries;
//! the render worker reads that snapshot once per frame and never sees a
//! partially updated set of values.

use std::time::{Duration, Instant};

/// Read-only per-frame snapshot handed to the shading function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaderGlobals {
    /// Simulated time in seconds, advancing by `wall_delta * time_scale`.
    pub time: f32,
    /// Mouse position normalized to `[0,1]²`, Y measured from the bottom.
    pub mouse: [f32; 2],
    /// Framebuffer dimensions as floating values.
    pub resolution: [f32; 2],
}

impl ShaderGlobals {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            time: 0.0,
            mouse: [0.0, 0.0],
            resolution: [width, height],
        }
    }
}

/// Wall-clock driven simulated time with a user-adjustable scale.
#[derive(Debug)]
pub struct SimClock {
    time: f32,
    scale: f32,
    last_tick: Instant,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            scale: 1.0,
            last_tick: Instant::now(),
        }
    }

    /// Simulated seconds accumulated so far.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Consumes the wall-clock delta since the previous tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.advance(delta);
    }

    /// Advances simulated time by `delta * scale`.
    pub fn advance(&mut self, delta: Duration) {
        self.time += delta.as_secs_f32() * self.scale;
    }

    pub fn double_scale(&mut self) {
        self.scale *= 2.0;
    }

    pub fn halve_scale(&mut self) {
        self.scale /= 2.0;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-rate estimate over completed (non-forced) consumptions.
#[derive(Debug, Default)]
pub struct FpsCounter {
    last_completed: Option<Instant>,
    fps: f32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed frame consumption at `now`.
    pub fn mark_completed(&mut self, now: Instant) {
        if let Some(previous) = self.last_completed {
            let elapsed = now.duration_since(previous).as_secs_f32();
            if elapsed > 0.0 {
                self.fps = 1.0 / elapsed;
            }
        }
        self.last_completed = Some(now);
    }

    /// Most recent estimate; zero until two completed frames were seen.
    pub fn fps(&self) -> f32 {
        self.fps
    }
}
