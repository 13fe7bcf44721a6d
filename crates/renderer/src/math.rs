//! Lane-batched float math for the software rasterizer.
//!
//! The scan loop evaluates shading in fixed-width groups of horizontally
//! adjacent pixels. A [`FloatLanes`] value holds one float per lane in an
//! alignment-declared buffer so gather/scatter code can rely on the layout,
//! and the elementwise helpers mirror the small GLSL vocabulary the samplers
//! and built-in shaders need (`clamp`, `mix`, `step`, `fract`, `abs`).

use std::ops::{Add, Div, Mul, Sub};

/// Number of pixels evaluated together as one vector operation.
pub const LANE_WIDTH: usize = 8;

/// One float per lane, aligned for vector loads and stores.
#[repr(C, align(32))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatLanes(pub [f32; LANE_WIDTH]);

impl FloatLanes {
    pub const ZERO: Self = Self([0.0; LANE_WIDTH]);

    /// Broadcasts a single value into every lane.
    pub fn splat(value: f32) -> Self {
        Self([value; LANE_WIDTH])
    }

    /// The per-lane offsets `0, 1, .., LANE_WIDTH-1`.
    ///
    /// Added to a batch base x coordinate this yields the fragment x for
    /// every lane of the batch.
    pub fn offsets() -> Self {
        let mut lanes = [0.0; LANE_WIDTH];
        for (index, lane) in lanes.iter_mut().enumerate() {
            *lane = index as f32;
        }
        Self(lanes)
    }

    pub fn lane(&self, index: usize) -> f32 {
        self.0[index]
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let mut lanes = self.0;
        for lane in lanes.iter_mut() {
            *lane = f(*lane);
        }
        Self(lanes)
    }

    fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let mut lanes = self.0;
        for (lane, rhs) in lanes.iter_mut().zip(other.0) {
            *lane = f(*lane, rhs);
        }
        Self(lanes)
    }

    /// Clamps every lane to `[lo, hi]`.
    pub fn clamp(self, lo: f32, hi: f32) -> Self {
        self.map(|v| v.clamp(lo, hi))
    }

    pub fn abs(self) -> Self {
        self.map(f32::abs)
    }

    /// Fractional part, always non-negative with period 1.
    pub fn fract(self) -> Self {
        self.map(|v| v - v.floor())
    }

    /// Euclidean remainder with a non-negative result.
    pub fn rem_euclid(self, period: f32) -> Self {
        self.map(|v| v.rem_euclid(period))
    }

    /// GLSL `step`: 0 where the lane is below `edge`, 1 otherwise.
    pub fn step(edge: f32, value: Self) -> Self {
        value.map(|v| if v < edge { 0.0 } else { 1.0 })
    }

    /// Linear blend of `a` and `b` by a per-lane factor.
    pub fn mix(a: Self, b: Self, t: Self) -> Self {
        let mut lanes = a.0;
        for (lane, (bv, tv)) in lanes.iter_mut().zip(b.0.into_iter().zip(t.0)) {
            *lane += (bv - *lane) * tv;
        }
        Self(lanes)
    }

    pub fn sin(self) -> Self {
        self.map(f32::sin)
    }

    pub fn cos(self) -> Self {
        self.map(f32::cos)
    }

    /// Converts a color channel in `[0,1]` to display bytes.
    ///
    /// Matches the store path of the scan loop: clamp, scale by 255, add 0.5
    /// and truncate, which rounds to the nearest byte for in-range input.
    pub fn quantize(self) -> [u8; LANE_WIDTH] {
        let mut bytes = [0u8; LANE_WIDTH];
        for (byte, lane) in bytes.iter_mut().zip(self.0) {
            *byte = (lane.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        }
        bytes
    }
}

impl Add for FloatLanes {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }
}

impl Sub for FloatLanes {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }
}

impl Mul for FloatLanes {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a * b)
    }
}

impl Div for FloatLanes {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a / b)
    }
}

impl Add<f32> for FloatLanes {
    type Output = Self;
    fn add(self, rhs: f32) -> Self {
        self.map(|v| v + rhs)
    }
}

impl Sub<f32> for FloatLanes {
    type Output = Self;
    fn sub(self, rhs: f32) -> Self {
        self.map(|v| v - rhs)
    }
}

impl Mul<f32> for FloatLanes {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        self.map(|v| v * rhs)
    }
}

impl Div<f32> for FloatLanes {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        self.map(|v| v / rhs)
    }
}

/// A batch of 2D coordinates, one per lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec2Lanes {
    pub x: FloatLanes,
    pub y: FloatLanes,
}

impl Vec2Lanes {
    pub fn new(x: FloatLanes, y: FloatLanes) -> Self {
        Self { x, y }
    }

    /// Broadcasts a single coordinate into every lane.
    pub fn splat(x: f32, y: f32) -> Self {
        Self {
            x: FloatLanes::splat(x),
            y: FloatLanes::splat(y),
        }
    }
}

/// A batch of RGBA colors, one per lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec4Lanes {
    pub x: FloatLanes,
    pub y: FloatLanes,
    pub z: FloatLanes,
    pub w: FloatLanes,
}

impl Vec4Lanes {
    pub fn new(x: FloatLanes, y: FloatLanes, z: FloatLanes, w: FloatLanes) -> Self {
        Self { x, y, z, w }
    }

    pub fn splat(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self {
            x: FloatLanes::splat(x),
            y: FloatLanes::splat(y),
            z: FloatLanes::splat(z),
            w: FloatLanes::splat(w),
        }
    }

    /// Clamps every channel of every lane to `[lo, hi]`.
    pub fn clamp(self, lo: f32, hi: f32) -> Self {
        Self {
            x: self.x.clamp(lo, hi),
            y: self.y.clamp(lo, hi),
            z: self.z.clamp(lo, hi),
            w: self.w.clamp(lo, hi),
        }
    }

    /// Componentwise blend of `a` and `b` by a per-lane factor.
    pub fn mix(a: Self, b: Self, t: FloatLanes) -> Self {
        Self {
            x: FloatLanes::mix(a.x, b.x, t),
            y: FloatLanes::mix(a.y, b.y, t),
            z: FloatLanes::mix(a.z, b.z, t),
            w: FloatLanes::mix(a.w, b.w, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_count_up_from_zero() {
        let offsets = FloatLanes::offsets();
        for lane in 0..LANE_WIDTH {
            assert_eq!(offsets.lane(lane), lane as f32);
        }
    }

    #[test]
    fn fract_is_non_negative_for_negative_input() {
        let values = FloatLanes::splat(-0.25).fract();
        for lane in 0..LANE_WIDTH {
            assert!((values.lane(lane) - 0.75).abs() < 1e-6);
        }
    }

    #[test]
    fn step_splits_at_edge() {
        let mut input = [0.0; LANE_WIDTH];
        input[0] = 0.49;
        input[1] = 0.5;
        input[2] = 0.51;
        let stepped = FloatLanes::step(0.5, FloatLanes(input));
        assert_eq!(stepped.lane(0), 0.0);
        assert_eq!(stepped.lane(1), 1.0);
        assert_eq!(stepped.lane(2), 1.0);
    }

    #[test]
    fn mix_interpolates_endpoints() {
        let a = FloatLanes::splat(1.0);
        let b = FloatLanes::splat(3.0);
        assert_eq!(FloatLanes::mix(a, b, FloatLanes::ZERO), a);
        assert_eq!(FloatLanes::mix(a, b, FloatLanes::splat(1.0)), b);
        assert_eq!(
            FloatLanes::mix(a, b, FloatLanes::splat(0.5)),
            FloatLanes::splat(2.0)
        );
    }

    #[test]
    fn quantize_round_trips_within_one_step() {
        for step in 0..=255u32 {
            let value = step as f32 / 255.0;
            let bytes = FloatLanes::splat(value).quantize();
            assert_eq!(bytes[0] as u32, step);
        }

        for value in [0.0f32, 0.123, 0.5, 0.75, 0.999, 1.0] {
            let bytes = FloatLanes::splat(value).quantize();
            let reconstructed = bytes[0] as f32 / 255.0;
            assert!((reconstructed - value).abs() <= 1.0 / 255.0 + f32::EPSILON);
        }
    }

    #[test]
    fn quantize_clamps_out_of_range_channels() {
        assert_eq!(FloatLanes::splat(-2.0).quantize()[0], 0);
        assert_eq!(FloatLanes::splat(7.5).quantize()[0], 255);
    }

    #[test]
    fn rem_euclid_wraps_negative_values() {
        let wrapped = FloatLanes::splat(-0.5).rem_euclid(2.0);
        assert!((wrapped.lane(0) - 1.5).abs() < 1e-6);
    }
}
