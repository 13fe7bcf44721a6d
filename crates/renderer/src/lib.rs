//! Software shader preview engine.
//!
//! A dedicated worker thread evaluates a pluggable [`Shader`] over an RGB24
//! framebuffer in fixed-width lane batches while the main thread owns the
//! window, pumps input and blits finished frames. The two sides meet in a
//! single-slot handshake that also carries cancellation (resize), quit and
//! the shared globals snapshot:
//!
//! ```text
//!   shadepad CLI
//!        │ PreviewConfig + Arc<dyn Shader>
//!        ▼
//!   run ──▶ spawn render worker ──▶ scan lane batches ──▶ FrameBuffer
//!    │                ▲                                      │
//!    │           frame_consumed                         frame_ready
//!    │                │                                      ▼
//!    └──▶ display loop (winit) ──▶ acquire ──▶ wgpu blit ──▶ surface
//! ```
//!
//! Mutual exclusion on the framebuffer is structural: the worker writes only
//! between a consumed signal and the next ready signal, the display loop
//! reads only while it holds the acquisition lease. The space bar forces a
//! preview of an in-flight frame, which may show a torn image by design.

mod framebuffer;
mod handshake;
pub mod math;
mod present;
mod sampler;
mod shader;
mod uniforms;
mod window;
mod worker;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

pub use framebuffer::FrameBuffer;
pub use handshake::{Acquire, FrameHandshake, FrameJob, FrameLease, ProducerState};
pub use sampler::{
    ChannelBindings, PixelFormat, Sampler2d, SamplerImage, SamplerSet, TextureError, WrapMode,
    CHANNEL_COUNT,
};
pub use shader::{Plasma, Shader, TexturePreview};
pub use uniforms::{FpsCounter, ShaderGlobals, SimClock};
pub use worker::RenderPipeline;

/// Immutable configuration assembled by the caller at start-up.
#[derive(Clone, Debug)]
pub struct PreviewConfig {
    /// Initial framebuffer and window size in pixels.
    pub surface_size: (u32, u32),
    /// Texture paths for the sampler channels.
    pub channel_bindings: ChannelBindings,
    /// Wrap policy applied by every sampler channel.
    pub wrap_mode: WrapMode,
    /// Scanline helper threads; 0 sizes the pool to the machine, 1 disables
    /// the fan-out.
    pub threads: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            surface_size: (128, 128),
            channel_bindings: ChannelBindings::new(),
            wrap_mode: WrapMode::Repeat,
            threads: 0,
        }
    }
}

/// Runs the preview until the user quits.
///
/// Spawns the render worker, drives the display loop on the calling thread
/// and guarantees the worker is joined on every exit path, including display
/// failures.
pub fn run(config: PreviewConfig, shader: Arc<dyn Shader>) -> Result<()> {
    let channels = SamplerSet::from_bindings(&config.channel_bindings, config.wrap_mode);
    let pipeline = RenderPipeline::new(shader, channels, config.threads)?;

    let (width, height) = config.surface_size;
    let framebuffer = Arc::new(FrameBuffer::new(width, height));
    let globals = ShaderGlobals::new(width as f32, height as f32);
    let handshake = Arc::new(FrameHandshake::new(framebuffer, globals));

    let worker = worker::spawn(handshake.clone(), pipeline)?;

    let display_result =
        window::run_display(&config, handshake.clone()).context("display loop failed");

    // Quit may already be requested (escape/close); make sure the worker
    // observes it even when the display loop failed early.
    handshake.request_quit();
    tracing::info!("waiting for the render worker to finish");
    worker
        .join()
        .map_err(|err| anyhow!("render worker panicked: {err:?}"))?;

    display_result
}
