//! The pluggable shading interface and the built-in shader implementations.

use crate::math::{FloatLanes, Vec2Lanes, Vec4Lanes};
use crate::sampler::SamplerSet;
use crate::uniforms::ShaderGlobals;

/// A pixel-coloring function evaluated one lane batch at a time.
///
/// Implementations must be pure: no side effects, and the same inputs always
/// produce the same output. The globals are a read-only snapshot for the
/// duration of one frame, so the worker calls `evaluate` from its scan loop
/// (and any helper lanes) without further synchronization. The returned
/// channels are unclamped; the scan loop clamps and quantizes them.
pub trait Shader: Send + Sync {
    fn evaluate(
        &self,
        frag_coord: &Vec2Lanes,
        globals: &ShaderGlobals,
        channels: &SamplerSet,
    ) -> Vec4Lanes;
}

/// Texture preview: pans channel 0 over time and blends toward channel 1
/// under horizontal mouse control.
#[derive(Clone, Copy, Debug, Default)]
pub struct TexturePreview;

impl Shader for TexturePreview {
    fn evaluate(
        &self,
        frag_coord: &Vec2Lanes,
        globals: &ShaderGlobals,
        channels: &SamplerSet,
    ) -> Vec4Lanes {
        let width = globals.resolution[0].max(1.0);
        let height = globals.resolution[1].max(1.0);
        let u = frag_coord.x / width;
        let v = frag_coord.y / height;

        let drift = globals.time * 0.05;
        let base = channels.channel(0).sample(&Vec2Lanes::new(u + drift, v));
        let overlay = channels.channel(1).sample(&Vec2Lanes::new(u, v - drift));

        let blend = FloatLanes::splat(globals.mouse[0].clamp(0.0, 1.0));
        Vec4Lanes::mix(base, overlay, blend)
    }
}

/// Procedural sine-field plasma; exercises the engine with no textures.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plasma;

impl Shader for Plasma {
    fn evaluate(
        &self,
        frag_coord: &Vec2Lanes,
        globals: &ShaderGlobals,
        _channels: &SamplerSet,
    ) -> Vec4Lanes {
        let width = globals.resolution[0].max(1.0);
        let height = globals.resolution[1].max(1.0);
        let u = frag_coord.x / width;
        let v = frag_coord.y / height;
        let t = globals.time;

        let ripple_x = (u * 6.2831 + t).sin();
        let ripple_y = (v * 6.2831 - t * 0.7).sin();
        let swirl = ((u + v) * 4.0 + (globals.mouse[0] + globals.mouse[1]) * 3.0 + t * 1.3).sin();

        Vec4Lanes::new(
            (ripple_x + swirl) * 0.25 + 0.5,
            (ripple_y - swirl) * 0.25 + 0.5,
            (ripple_x * ripple_y) * 0.5 + 0.5,
            FloatLanes::splat(1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{ChannelBindings, WrapMode};

    fn fixture() -> (ShaderGlobals, SamplerSet) {
        let globals = ShaderGlobals {
            time: 2.0,
            mouse: [0.0, 0.5],
            resolution: [64.0, 32.0],
        };
        let channels = SamplerSet::from_bindings(&ChannelBindings::new(), WrapMode::Repeat);
        (globals, channels)
    }

    #[test]
    fn evaluation_is_deterministic_for_equal_inputs() {
        let (globals, channels) = fixture();
        let coords = Vec2Lanes::new(
            FloatLanes::offsets() + 8.0,
            FloatLanes::splat(5.0),
        );
        for shader in [&TexturePreview as &dyn Shader, &Plasma] {
            let first = shader.evaluate(&coords, &globals, &channels);
            let second = shader.evaluate(&coords, &globals, &channels);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn texture_preview_shows_channel_zero_with_mouse_at_origin() {
        let (globals, channels) = fixture();
        let coords = Vec2Lanes::splat(10.0, 10.0);
        let color = TexturePreview.evaluate(&coords, &globals, &channels);

        let u = (10.0 / 64.0) + globals.time * 0.05;
        let v = 10.0 / 32.0;
        let expected = channels.channel(0).sample(&Vec2Lanes::splat(u, v));
        assert_eq!(color, expected);
    }
}
