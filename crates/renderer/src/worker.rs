//! The render worker: scans the framebuffer in lane batches.
//!
//! Each frame starts from a globals snapshot taken at the handshake
//! boundary, walks every scanline (optionally fanned out over a fixed rayon
//! pool, scanlines are independent), and hands the finished or aborted
//! frame back through the producer side of the handshake. Cancellation is
//! polled once per scanline, so a resize or quit aborts the scan at row
//! granularity rather than instantly.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;

use crate::framebuffer::FrameBuffer;
use crate::handshake::{FrameHandshake, FrameJob, ProducerState};
use crate::math::{FloatLanes, Vec2Lanes, LANE_WIDTH};
use crate::sampler::SamplerSet;
use crate::shader::Shader;
use crate::uniforms::ShaderGlobals;

/// Immutable per-session inputs of the scan loop.
pub struct RenderPipeline {
    shader: Arc<dyn Shader>,
    channels: SamplerSet,
    pool: Option<rayon::ThreadPool>,
}

impl RenderPipeline {
    /// Builds the pipeline; `threads == 0` sizes the helper pool to the
    /// machine, `1` keeps the scan on the worker thread alone.
    pub fn new(shader: Arc<dyn Shader>, channels: SamplerSet, threads: usize) -> Result<Self> {
        let threads = if threads == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            threads
        };

        let pool = if threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("render-lane-{index}"))
                    .build()
                    .context("failed to build scanline helper pool")?,
            )
        } else {
            None
        };

        Ok(Self {
            shader,
            channels,
            pool,
        })
    }
}

/// Spawns the dedicated render worker thread.
pub fn spawn(
    handshake: Arc<FrameHandshake>,
    pipeline: RenderPipeline,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("render-worker".into())
        .spawn(move || render_loop(&handshake, &pipeline))
        .map_err(|err| anyhow!("failed to spawn render worker: {err}"))
}

fn render_loop(handshake: &FrameHandshake, pipeline: &RenderPipeline) {
    loop {
        let job = handshake.begin_frame();
        scan_frame(&job, pipeline, handshake);
        if handshake.finish_frame() == ProducerState::Quit {
            break;
        }
    }
    tracing::debug!("render worker exiting");
}

/// Scans one frame, aborting between scanlines once cancellation is seen.
pub(crate) fn scan_frame(job: &FrameJob, pipeline: &RenderPipeline, handshake: &FrameHandshake) {
    let framebuffer = job.framebuffer.as_ref();
    match &pipeline.pool {
        Some(pool) => pool.install(|| {
            (0..framebuffer.height()).into_par_iter().for_each(|y| {
                if !handshake.cancel_requested() {
                    scan_row(framebuffer, y, &job.globals, pipeline);
                }
            });
        }),
        None => {
            for y in 0..framebuffer.height() {
                if handshake.cancel_requested() {
                    break;
                }
                scan_row(framebuffer, y, &job.globals, pipeline);
            }
        }
    }
}

fn scan_row(
    framebuffer: &FrameBuffer,
    y: u32,
    globals: &ShaderGlobals,
    pipeline: &RenderPipeline,
) {
    let width = framebuffer.width() as usize;
    if width == 0 {
        return;
    }

    // Fragment space has a bottom-left origin; buffer row 0 is the top.
    let frag_y = FloatLanes::splat((framebuffer.height() - 1 - y) as f32);
    let row = framebuffer.row_ptr(y);
    let shift_limit = width.saturating_sub(LANE_WIDTH);

    let mut x = 0usize;
    while x < width {
        // The final batch is shifted left to stay in bounds when the width
        // is not a multiple of the lane count; up to LANE_WIDTH-1 pixels
        // get recomputed with identical values.
        let base = x.min(shift_limit);
        let lanes = LANE_WIDTH.min(width - base);
        let frag_x = FloatLanes::offsets() + base as f32;

        let color = pipeline.shader.evaluate(
            &Vec2Lanes::new(frag_x, frag_y),
            globals,
            &pipeline.channels,
        );

        let r = color.x.quantize();
        let g = color.y.quantize();
        let b = color.z.quantize();
        for lane in 0..lanes {
            unsafe {
                let pixel = row.add((base + lane) * 3);
                *pixel = r[lane];
                *pixel.add(1) = g[lane];
                *pixel.add(2) = b[lane];
            }
        }

        x = base + LANE_WIDTH;
    }
}
