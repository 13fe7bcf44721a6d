//! The display loop: owns the preview window, pumps input, paces frame
//! consumption and drives the consumer side of the handshake.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::framebuffer::FrameBuffer;
use crate::handshake::{Acquire, FrameHandshake};
use crate::present::Presenter;
use crate::uniforms::{FpsCounter, SimClock};
use crate::PreviewConfig;

/// Upper bound on one consumer wait for a finished frame; doubles as the
/// pacing cap when the worker is slower than the display.
const FRAME_WAIT: Duration = Duration::from_millis(33);

/// Throttle for the status log line.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) fn run_display(config: &PreviewConfig, handshake: Arc<FrameHandshake>) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(
        config.surface_size.0.max(1),
        config.surface_size.1.max(1),
    );
    let window = WindowBuilder::new()
        .with_title("Shadepad Preview")
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create preview window")?;
    let window = Arc::new(window);

    let mut presenter = Presenter::new(window.as_ref(), window.inner_size(), config.surface_size)
        .context("failed to initialise presentation surface")?;

    let mut mouse = MouseState::default();
    let mut sim_clock = SimClock::new();
    let mut fps = FpsCounter::new();
    let mut force_blit = false;
    let mut frame_count: u64 = 0;
    let mut last_status = Instant::now();

    window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            handshake.request_quit();
                            elwt.exit();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed {
                                match &event.logical_key {
                                    Key::Named(NamedKey::Escape) => {
                                        handshake.request_quit();
                                        elwt.exit();
                                    }
                                    Key::Named(NamedKey::Space) => {
                                        force_blit = true;
                                    }
                                    Key::Character(value) => match value.as_str() {
                                        "+" | "=" => sim_clock.double_scale(),
                                        "-" => sim_clock.halve_scale(),
                                        _ => {}
                                    },
                                    _ => {}
                                }
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            mouse.handle_cursor_moved(position, presenter.size().height);
                        }
                        WindowEvent::MouseInput {
                            state: button_state,
                            button,
                            ..
                        } => {
                            if button == MouseButton::Left {
                                mouse.handle_button(button_state, presenter.size().height);
                            }
                        }
                        WindowEvent::Resized(new_size) => {
                            if new_size != presenter.size() {
                                presenter.resize_surface(new_size);
                                handshake
                                    .request_cancel_and_resize((new_size.width, new_size.height));
                            }
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            // Keep the current physical size when the scale factor changes.
                            let _ = inner_size_writer.request_inner_size(presenter.size());
                        }
                        WindowEvent::RedrawRequested => {
                            let force = std::mem::take(&mut force_blit);
                            sim_clock.tick();

                            match handshake.acquire_frame(FRAME_WAIT, force) {
                                Acquire::Quit => elwt.exit(),
                                Acquire::Idle => {}
                                Acquire::Frame(mut lease) => {
                                    let completed = lease.frame_completed();
                                    let framebuffer = lease.framebuffer();
                                    match presenter.present(&framebuffer) {
                                        Ok(()) => {}
                                        Err(
                                            wgpu::SurfaceError::Lost
                                            | wgpu::SurfaceError::Outdated,
                                        ) => {
                                            presenter.reconfigure();
                                        }
                                        Err(wgpu::SurfaceError::OutOfMemory) => {
                                            tracing::error!(
                                                "surface out of memory; shutting down"
                                            );
                                            handshake.request_quit();
                                            elwt.exit();
                                        }
                                        Err(other) => {
                                            tracing::warn!(
                                                error = ?other,
                                                "surface error; retrying next frame"
                                            );
                                        }
                                    }

                                    if let Some(size) = lease.take_pending_resize() {
                                        lease.install_framebuffer(Arc::new(FrameBuffer::new(
                                            size.0, size.1,
                                        )));
                                        presenter.set_source_size(size);
                                    }

                                    if completed {
                                        fps.mark_completed(Instant::now());
                                    }
                                    frame_count += 1;

                                    // A forced preview of an unfinished frame
                                    // publishes nothing; dropping the lease
                                    // leaves the worker scanning.
                                    if !force || completed {
                                        let mouse_norm = mouse.normalized(presenter.size());
                                        lease.publish_and_release(sim_clock.time(), mouse_norm);
                                    }
                                }
                            }

                            if last_status.elapsed() >= STATUS_INTERVAL {
                                tracing::info!(
                                    frame = frame_count,
                                    time = sim_clock.time(),
                                    time_scale = sim_clock.scale(),
                                    fps = fps.fps(),
                                    "preview status"
                                );
                                last_status = Instant::now();
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    // Schedule the next consumption attempt; the condvar wait
                    // inside acquire_frame paces the loop.
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

/// Tracks the left-button drag position in pixels, Y measured from the
/// bottom; normalized against the surface size when globals are published.
#[derive(Default)]
struct MouseState {
    cursor: Option<PhysicalPosition<f64>>,
    pressed: bool,
    drag: Option<(f32, f32)>,
}

impl MouseState {
    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>, surface_height: u32) {
        self.cursor = Some(position);
        if self.pressed {
            self.record(surface_height);
        }
    }

    fn handle_button(&mut self, state: ElementState, surface_height: u32) {
        match state {
            ElementState::Pressed => {
                self.pressed = true;
                self.record(surface_height);
            }
            ElementState::Released => {
                self.pressed = false;
            }
        }
    }

    fn record(&mut self, surface_height: u32) {
        if let Some(position) = self.cursor {
            let flipped = surface_height as f32 - 1.0 - position.y as f32;
            self.drag = Some((position.x as f32, flipped));
        }
    }

    fn normalized(&self, surface: PhysicalSize<u32>) -> [f32; 2] {
        match self.drag {
            Some((x, y)) => [
                x / (surface.width.max(1) as f32),
                y / (surface.height.max(1) as f32),
            ],
            None => [0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_positions_flip_y_and_normalize_by_surface_size() {
        let mut mouse = MouseState::default();
        // Motion without a press leaves the drag position untouched.
        mouse.handle_cursor_moved(PhysicalPosition::new(10.0, 10.0), 100);
        assert_eq!(mouse.normalized(PhysicalSize::new(200, 100)), [0.0, 0.0]);

        mouse.handle_button(ElementState::Pressed, 100);
        assert_eq!(
            mouse.normalized(PhysicalSize::new(200, 100)),
            [0.05, 0.89]
        );

        // Dragging while pressed keeps tracking the cursor.
        mouse.handle_cursor_moved(PhysicalPosition::new(100.0, 0.0), 100);
        assert_eq!(
            mouse.normalized(PhysicalSize::new(200, 100)),
            [0.5, 0.99]
        );

        // After release the last drag position is retained.
        mouse.handle_button(ElementState::Released, 100);
        mouse.handle_cursor_moved(PhysicalPosition::new(0.0, 0.0), 100);
        assert_eq!(
            mouse.normalized(PhysicalSize::new(200, 100)),
            [0.5, 0.99]
        );
    }
}
