//! Lane-batched texture sampling with procedural fallback.
//!
//! A [`Sampler2d`] wraps an optional decoded image. Sampling applies the
//! wrap policy per lane, flips the vertical axis (sampling space has a
//! bottom-left origin), then gathers nearest-neighbor texels and extracts
//! channels through the format's mask/shift table. Without an image the
//! sampler produces a deterministic 2x2 red/green checkerboard, which is
//! also the non-fatal fallback when a texture fails to decode.

use std::path::{Path, PathBuf};

use crate::math::{FloatLanes, Vec2Lanes, Vec4Lanes, LANE_WIDTH};

/// Number of optional sampler channels a shader can bind.
pub const CHANNEL_COUNT: usize = 4;

/// Policy mapping out-of-range texture coordinates back into `[0,1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Clamp,
    Repeat,
    MirrorRepeat,
}

/// Per-channel bit layout of a packed texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    pub bytes_per_pixel: u32,
    pub r_mask: u32,
    pub r_shift: u32,
    pub g_mask: u32,
    pub g_shift: u32,
    pub b_mask: u32,
    pub b_shift: u32,
    /// Zero mask means the format has no alpha; it then defaults to opaque.
    pub a_mask: u32,
    pub a_shift: u32,
}

impl PixelFormat {
    /// Tightly packed 3-byte RGB as the `image` crate decodes it.
    pub fn rgb8() -> Self {
        Self {
            bytes_per_pixel: 3,
            r_mask: 0x0000_00ff,
            r_shift: 0,
            g_mask: 0x0000_ff00,
            g_shift: 8,
            b_mask: 0x00ff_0000,
            b_shift: 16,
            a_mask: 0,
            a_shift: 0,
        }
    }

    /// Tightly packed 4-byte RGBA.
    pub fn rgba8() -> Self {
        Self {
            a_mask: 0xff00_0000,
            a_shift: 24,
            bytes_per_pixel: 4,
            ..Self::rgb8()
        }
    }
}

/// Raised when a texture cannot be used; always absorbed with a fallback.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode texture at {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture at {path} has zero extent")]
    ZeroExtent { path: PathBuf },
}

/// A decoded image ready for packed-texel gathers.
pub struct SamplerImage {
    width: u32,
    height: u32,
    pitch: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl SamplerImage {
    /// Wraps an already decoded pixel buffer.
    pub fn from_parts(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Self {
        let pitch = width * format.bytes_per_pixel;
        debug_assert_eq!(pixels.len(), (pitch * height) as usize);
        Self {
            width,
            height,
            pitch,
            format,
            pixels,
        }
    }

    /// Decodes an image file, keeping 3-byte RGB data packed and expanding
    /// every other layout to RGBA.
    pub fn decode(path: &Path) -> Result<Self, TextureError> {
        let decoded = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroExtent {
                path: path.to_path_buf(),
            });
        }

        Ok(match decoded {
            image::DynamicImage::ImageRgb8(buffer) => {
                Self::from_parts(width, height, PixelFormat::rgb8(), buffer.into_raw())
            }
            other => Self::from_parts(
                width,
                height,
                PixelFormat::rgba8(),
                other.to_rgba8().into_raw(),
            ),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Assembles the packed little-endian texel at `(x, y)`.
    fn fetch_packed(&self, x: u32, y: u32) -> u32 {
        let offset = (y * self.pitch + x * self.format.bytes_per_pixel) as usize;
        let mut packed = 0u32;
        for byte in 0..self.format.bytes_per_pixel as usize {
            packed |= (self.pixels[offset + byte] as u32) << (byte * 8);
        }
        packed
    }
}

/// Samples an image (or the procedural fallback) for a batch of coordinates.
pub struct Sampler2d {
    image: Option<SamplerImage>,
    wrap: WrapMode,
}

impl Sampler2d {
    pub fn new(image: Option<SamplerImage>, wrap: WrapMode) -> Self {
        Self { image, wrap }
    }

    /// A sampler with no backing image; every lookup hits the checkerboard.
    pub fn procedural(wrap: WrapMode) -> Self {
        Self { image: None, wrap }
    }

    /// Loads a texture from disk. Decode failures are logged and absorbed;
    /// the sampler then falls back to the procedural checkerboard.
    pub fn from_path(path: &Path, wrap: WrapMode) -> Self {
        match SamplerImage::decode(path) {
            Ok(image) => {
                tracing::info!(
                    path = %path.display(),
                    width = image.width(),
                    height = image.height(),
                    "loaded sampler texture"
                );
                Self::new(Some(image), wrap)
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load texture; using procedural checkerboard"
                );
                Self::procedural(wrap)
            }
        }
    }

    /// Samples one batch of coordinates, returning RGBA in `[0,1]`.
    pub fn sample(&self, coord: &Vec2Lanes) -> Vec4Lanes {
        let u = wrap_lanes(coord.x, self.wrap);
        let v = wrap_lanes(coord.y, self.wrap);
        // Sampling space has a bottom-left origin; flip before the lookup.
        let v = FloatLanes::splat(1.0) - v;

        match &self.image {
            None => checkerboard(u, v),
            Some(image) => gather(image, u, v),
        }
    }
}

fn gather(image: &SamplerImage, u: FloatLanes, v: FloatLanes) -> Vec4Lanes {
    let format = image.format;
    let max_x = (image.width - 1) as f32;
    let max_y = (image.height - 1) as f32;

    let mut r = [0.0f32; LANE_WIDTH];
    let mut g = [0.0f32; LANE_WIDTH];
    let mut b = [0.0f32; LANE_WIDTH];
    let mut a = [0.0f32; LANE_WIDTH];
    for lane in 0..LANE_WIDTH {
        // Nearest texel: round(uv * (dim - 1)) per axis.
        let x = (u.lane(lane) * max_x + 0.5) as u32;
        let y = (v.lane(lane) * max_y + 0.5) as u32;
        let packed = image.fetch_packed(x, y);

        r[lane] = ((packed & format.r_mask) >> format.r_shift) as f32;
        g[lane] = ((packed & format.g_mask) >> format.g_shift) as f32;
        b[lane] = ((packed & format.b_mask) >> format.b_shift) as f32;
        a[lane] = if format.a_mask != 0 {
            ((packed & format.a_mask) >> format.a_shift) as f32
        } else {
            255.0
        };
    }

    Vec4Lanes::new(
        FloatLanes(r) / 255.0,
        FloatLanes(g) / 255.0,
        FloatLanes(b) / 255.0,
        FloatLanes(a) / 255.0,
    )
    .clamp(0.0, 1.0)
}

fn wrap_lanes(value: FloatLanes, wrap: WrapMode) -> FloatLanes {
    match wrap {
        WrapMode::Clamp => value.clamp(0.0, 1.0),
        WrapMode::Repeat => value.fract(),
        // Triangle wave with period 2, reflective at both ends.
        WrapMode::MirrorRepeat => ((value - 1.0).rem_euclid(2.0) - 1.0).abs(),
    }
}

/// Deterministic red/green 2x2 checkerboard used when no image is bound.
fn checkerboard(u: FloatLanes, v: FloatLanes) -> Vec4Lanes {
    let su = FloatLanes::step(0.5, u);
    let sv = FloatLanes::step(0.5, v);
    let blend = (su - sv).abs();
    Vec4Lanes::mix(
        Vec4Lanes::splat(1.0, 0.0, 0.0, 1.0),
        Vec4Lanes::splat(0.0, 1.0, 0.0, 1.0),
        blend,
    )
}

/// Texture paths requested for the sampler channels.
#[derive(Clone, Debug, Default)]
pub struct ChannelBindings {
    sources: [Option<PathBuf>; CHANNEL_COUNT],
}

impl ChannelBindings {
    /// Creates an empty bindings table with all channels unassigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a texture path with the given channel.
    pub fn set_texture(&mut self, channel: usize, path: PathBuf) -> anyhow::Result<()> {
        if channel >= CHANNEL_COUNT {
            anyhow::bail!(
                "channel {} exceeds supported sampler channel count ({})",
                channel,
                CHANNEL_COUNT
            );
        }
        self.sources[channel] = Some(path);
        Ok(())
    }

    fn slots(&self) -> &[Option<PathBuf>; CHANNEL_COUNT] {
        &self.sources
    }
}

/// The resolved sampler channels handed to the shading function.
pub struct SamplerSet {
    channels: [Sampler2d; CHANNEL_COUNT],
}

impl SamplerSet {
    /// Loads every bound texture; unbound channels stay procedural.
    pub fn from_bindings(bindings: &ChannelBindings, wrap: WrapMode) -> Self {
        let channels = std::array::from_fn(|index| match &bindings.slots()[index] {
            Some(path) => Sampler2d::from_path(path, wrap),
            None => Sampler2d::procedural(wrap),
        });
        Self { channels }
    }

    pub fn channel(&self, index: usize) -> &Sampler2d {
        &self.channels[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane0(color: &Vec4Lanes) -> [f32; 4] {
        [
            color.x.lane(0),
            color.y.lane(0),
            color.z.lane(0),
            color.w.lane(0),
        ]
    }

    fn assert_rgba_eq(actual: [f32; 4], expected: [f32; 4]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn repeat_wrap_is_periodic_in_whole_steps() {
        let sampler = Sampler2d::procedural(WrapMode::Repeat);
        for k in [-3.0f32, -1.0, 1.0, 4.0] {
            let base = sampler.sample(&Vec2Lanes::splat(0.3, 0.65));
            let shifted = sampler.sample(&Vec2Lanes::splat(0.3 + k, 0.65 + k));
            assert_rgba_eq(lane0(&shifted), lane0(&base));
        }
    }

    #[test]
    fn clamp_wrap_pins_to_the_nearest_boundary() {
        let sampler = Sampler2d::procedural(WrapMode::Clamp);
        let below = sampler.sample(&Vec2Lanes::splat(-0.4, 0.3));
        let edge = sampler.sample(&Vec2Lanes::splat(0.0, 0.3));
        assert_rgba_eq(lane0(&below), lane0(&edge));

        let above = sampler.sample(&Vec2Lanes::splat(1.7, 0.3));
        let far_edge = sampler.sample(&Vec2Lanes::splat(1.0, 0.3));
        assert_rgba_eq(lane0(&above), lane0(&far_edge));
    }

    #[test]
    fn mirror_wrap_is_symmetric_around_one() {
        let sampler = Sampler2d::procedural(WrapMode::MirrorRepeat);
        for coord in [0.1f32, 0.35, 0.8] {
            let forward = sampler.sample(&Vec2Lanes::splat(coord, coord));
            let reflected = sampler.sample(&Vec2Lanes::splat(2.0 - coord, 2.0 - coord));
            assert_rgba_eq(lane0(&forward), lane0(&reflected));
        }
    }

    #[test]
    fn checkerboard_quadrants_after_vertical_flip() {
        let sampler = Sampler2d::procedural(WrapMode::Clamp);
        let red = [1.0, 0.0, 0.0, 1.0];
        let green = [0.0, 1.0, 0.0, 1.0];

        // Input (0.25, 0.75) lands at (0.25, 0.25) after the flip: red.
        assert_rgba_eq(lane0(&sampler.sample(&Vec2Lanes::splat(0.25, 0.75))), red);
        assert_rgba_eq(lane0(&sampler.sample(&Vec2Lanes::splat(0.75, 0.25))), red);
        assert_rgba_eq(lane0(&sampler.sample(&Vec2Lanes::splat(0.25, 0.25))), green);
        assert_rgba_eq(lane0(&sampler.sample(&Vec2Lanes::splat(0.75, 0.75))), green);
    }

    #[test]
    fn nearest_fetch_extracts_rgb_channels_with_opaque_alpha() {
        // 2x2 RGB8 image: red, green / blue, white.
        let pixels = vec![
            255, 0, 0, 0, 255, 0, //
            0, 0, 255, 255, 255, 255,
        ];
        let image = SamplerImage::from_parts(2, 2, PixelFormat::rgb8(), pixels);
        let sampler = Sampler2d::new(Some(image), WrapMode::Clamp);

        // (0, 1) flips to the top row, left texel: red.
        assert_rgba_eq(
            lane0(&sampler.sample(&Vec2Lanes::splat(0.0, 1.0))),
            [1.0, 0.0, 0.0, 1.0],
        );
        assert_rgba_eq(
            lane0(&sampler.sample(&Vec2Lanes::splat(1.0, 1.0))),
            [0.0, 1.0, 0.0, 1.0],
        );
        assert_rgba_eq(
            lane0(&sampler.sample(&Vec2Lanes::splat(0.0, 0.0))),
            [0.0, 0.0, 1.0, 1.0],
        );
        assert_rgba_eq(
            lane0(&sampler.sample(&Vec2Lanes::splat(1.0, 0.0))),
            [1.0, 1.0, 1.0, 1.0],
        );
    }

    #[test]
    fn rgba_format_extracts_the_alpha_channel() {
        let image = SamplerImage::from_parts(
            1,
            1,
            PixelFormat::rgba8(),
            vec![255, 0, 0, 102],
        );
        let sampler = Sampler2d::new(Some(image), WrapMode::Clamp);
        let color = lane0(&sampler.sample(&Vec2Lanes::splat(0.5, 0.5)));
        assert_rgba_eq(color, [1.0, 0.0, 0.0, 0.4]);
    }

    #[test]
    fn missing_file_falls_back_to_checkerboard() {
        let sampler = Sampler2d::from_path(
            Path::new("/definitely/not/here.png"),
            WrapMode::Clamp,
        );
        let color = lane0(&sampler.sample(&Vec2Lanes::splat(0.25, 0.75)));
        assert_rgba_eq(color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn bindings_reject_out_of_range_channels() {
        let mut bindings = ChannelBindings::new();
        assert!(bindings.set_texture(0, PathBuf::from("a.png")).is_ok());
        assert!(bindings
            .set_texture(CHANNEL_COUNT, PathBuf::from("b.png"))
            .is_err());
    }
}
