//! Single-slot frame handshake between the render worker and display loop.
//!
//! One mutex guards the whole shared state (protocol flags, the published
//! globals snapshot and the current framebuffer handle); two condition
//! variables provide the blocking edges:
//!
//! ```text
//!   worker ──▶ finish_frame ── frame_ready ──▶ acquire_frame ──▶ blit
//!      ▲                                                          │
//!      └────────── frame_consumed ◀── publish_and_release ◀───────┘
//! ```
//!
//! The worker only writes pixels between a consumed signal and its next
//! ready signal; the consumer only reads while it holds a [`FrameLease`].
//! Cancellation is cooperative: `request_cancel_and_resize` raises a flag
//! the worker polls between scanlines, and the aborted frame still flows
//! through the regular ready/consumed cycle.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::framebuffer::FrameBuffer;
use crate::uniforms::ShaderGlobals;

/// What the worker should do after handing over a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerState {
    Continue,
    Quit,
}

/// Inputs for one worker frame: a globals snapshot and the target buffer.
pub struct FrameJob {
    pub globals: ShaderGlobals,
    pub framebuffer: Arc<FrameBuffer>,
}

struct HandshakeState {
    frame_ready: bool,
    cancel_draw: bool,
    quit: bool,
    pending_resize: Option<(u32, u32)>,
    globals: ShaderGlobals,
    framebuffer: Arc<FrameBuffer>,
}

/// The synchronized mailbox both threads drive.
pub struct FrameHandshake {
    state: Mutex<HandshakeState>,
    frame_ready: Condvar,
    frame_consumed: Condvar,
}

/// Outcome of a consumer acquisition attempt.
pub enum Acquire<'a> {
    /// Quit was requested; any parked worker has been released.
    Quit,
    /// The timed wait elapsed with no frame ready and no force request.
    Idle,
    /// The consumption window is open while the lease is held.
    Frame(FrameLease<'a>),
}

impl FrameHandshake {
    pub fn new(framebuffer: Arc<FrameBuffer>, globals: ShaderGlobals) -> Self {
        Self {
            state: Mutex::new(HandshakeState {
                frame_ready: false,
                cancel_draw: false,
                quit: false,
                pending_resize: None,
                globals,
                framebuffer,
            }),
            frame_ready: Condvar::new(),
            frame_consumed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandshakeState> {
        self.state.lock().expect("handshake mutex poisoned")
    }

    /// Snapshots the globals and buffer handle for the next worker frame.
    pub fn begin_frame(&self) -> FrameJob {
        let state = self.lock();
        FrameJob {
            globals: state.globals,
            framebuffer: state.framebuffer.clone(),
        }
    }

    /// Whether the current scan should abort at the next scanline boundary.
    pub fn cancel_requested(&self) -> bool {
        self.lock().cancel_draw
    }

    /// Producer side of the handshake, called once per (possibly aborted)
    /// scan: publish the frame, then block until it has been consumed.
    pub fn finish_frame(&self) -> ProducerState {
        let mut state = self.lock();
        if state.quit {
            return ProducerState::Quit;
        }

        state.frame_ready = true;
        self.frame_ready.notify_one();

        let state = self
            .frame_consumed
            .wait_while(state, |state| state.frame_ready && !state.quit)
            .expect("handshake mutex poisoned");
        if state.quit {
            ProducerState::Quit
        } else {
            ProducerState::Continue
        }
    }

    /// Consumer side: waits up to `timeout` for a ready frame, or opens the
    /// window immediately when `force` is set (previewing a frame that may
    /// still be in flight).
    pub fn acquire_frame(&self, timeout: Duration, force: bool) -> Acquire<'_> {
        let mut state = self.lock();
        if state.quit {
            if state.frame_ready {
                self.frame_consumed.notify_one();
            }
            return Acquire::Quit;
        }

        if !force && !state.frame_ready {
            let (guard, wait) = self
                .frame_ready
                .wait_timeout_while(state, timeout, |state| {
                    !state.frame_ready && !state.quit
                })
                .expect("handshake mutex poisoned");
            state = guard;
            if state.quit {
                if state.frame_ready {
                    self.frame_consumed.notify_one();
                }
                return Acquire::Quit;
            }
            if wait.timed_out() && !state.frame_ready {
                return Acquire::Idle;
            }
        }

        let completed = state.frame_ready;
        Acquire::Frame(FrameLease {
            handshake: self,
            guard: state,
            completed,
        })
    }

    /// Flags the in-flight scan for abort and records the new target size.
    ///
    /// The resolution global is updated immediately (not at release) so the
    /// first frame after the resize already sees the new dimensions. No
    /// signal is sent; the worker discovers the flag at its next scanline.
    pub fn request_cancel_and_resize(&self, size: (u32, u32)) {
        let mut state = self.lock();
        state.cancel_draw = true;
        state.pending_resize = Some(size);
        state.globals.resolution = [size.0 as f32, size.1 as f32];
    }

    /// Requests cooperative shutdown of both sides.
    pub fn request_quit(&self) {
        let mut state = self.lock();
        state.quit = true;
        state.cancel_draw = true;
        if state.frame_ready {
            // The worker is parked waiting for consumption; let it observe
            // the quit flag and exit.
            self.frame_consumed.notify_one();
        }
    }
}

/// Scope-bound consumption window. Holding the lease holds the handshake
/// mutex, so the worker cannot resume scanning until the lease is released
/// or dropped.
pub struct FrameLease<'a> {
    handshake: &'a FrameHandshake,
    guard: MutexGuard<'a, HandshakeState>,
    completed: bool,
}

impl FrameLease<'_> {
    /// True when a finished frame was ready at acquisition; false for a
    /// forced preview of an in-flight frame.
    pub fn frame_completed(&self) -> bool {
        self.completed
    }

    pub fn framebuffer(&self) -> Arc<FrameBuffer> {
        self.guard.framebuffer.clone()
    }

    /// Takes the resize recorded by `request_cancel_and_resize`, if any.
    pub fn take_pending_resize(&mut self) -> Option<(u32, u32)> {
        self.guard.pending_resize.take()
    }

    /// Swaps in a freshly allocated framebuffer after a resize.
    pub fn install_framebuffer(&mut self, framebuffer: Arc<FrameBuffer>) {
        self.guard.framebuffer = framebuffer;
    }

    /// Publishes the new time and mouse globals, clears the cycle flags and
    /// signals the worker. Dropping the lease instead (forced preview of an
    /// unfinished frame) publishes nothing and leaves every flag in place.
    pub fn publish_and_release(mut self, time: f32, mouse: [f32; 2]) {
        self.guard.globals.time = time;
        self.guard.globals.mouse = mouse;
        self.guard.cancel_draw = false;
        self.guard.frame_ready = false;
        self.handshake.frame_consumed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Instant;

    fn handshake(width: u32, height: u32) -> Arc<FrameHandshake> {
        let framebuffer = Arc::new(FrameBuffer::new(width, height));
        let globals = ShaderGlobals::new(width as f32, height as f32);
        Arc::new(FrameHandshake::new(framebuffer, globals))
    }

    #[test]
    fn acquire_times_out_when_no_frame_is_ready() {
        let shake = handshake(4, 4);
        let start = Instant::now();
        match shake.acquire_frame(Duration::from_millis(20), false) {
            Acquire::Idle => {}
            _ => panic!("expected an idle acquisition"),
        }
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn completed_frame_flows_through_one_cycle() {
        let shake = handshake(4, 4);
        let producer = {
            let shake = shake.clone();
            thread::spawn(move || {
                let job = shake.begin_frame();
                assert_eq!(job.globals.resolution, [4.0, 4.0]);
                assert_eq!(shake.finish_frame(), ProducerState::Continue);
                // Second frame: the consumer quits instead of consuming.
                assert_eq!(shake.finish_frame(), ProducerState::Quit);
            })
        };

        match shake.acquire_frame(Duration::from_secs(2), false) {
            Acquire::Frame(lease) => {
                assert!(lease.frame_completed());
                lease.publish_and_release(1.5, [0.25, 0.75]);
            }
            _ => panic!("expected a completed frame"),
        }

        // The worker publishes its second frame and parks; quitting must
        // unblock it.
        while !matches!(
            shake.acquire_frame(Duration::from_millis(50), false),
            Acquire::Frame(_)
        ) {}
        shake.request_quit();
        producer.join().expect("producer thread panicked");

        // Published globals are visible to the next frame snapshot.
        let job = shake.begin_frame();
        assert_eq!(job.globals.time, 1.5);
        assert_eq!(job.globals.mouse, [0.25, 0.75]);
    }

    #[test]
    fn worker_stays_parked_while_lease_is_held() {
        let shake = handshake(4, 4);
        let resumed = Arc::new(AtomicBool::new(false));
        let producer = {
            let shake = shake.clone();
            let resumed = resumed.clone();
            thread::spawn(move || {
                assert_eq!(shake.finish_frame(), ProducerState::Continue);
                resumed.store(true, Ordering::SeqCst);
                assert_eq!(shake.finish_frame(), ProducerState::Quit);
            })
        };

        let lease = match shake.acquire_frame(Duration::from_secs(2), false) {
            Acquire::Frame(lease) => lease,
            _ => panic!("expected a completed frame"),
        };
        thread::sleep(Duration::from_millis(40));
        assert!(
            !resumed.load(Ordering::SeqCst),
            "worker resumed inside the consumption window"
        );
        lease.publish_and_release(0.0, [0.0, 0.0]);

        while !resumed.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        shake.request_quit();
        producer.join().expect("producer thread panicked");
    }

    #[test]
    fn forced_acquire_of_unready_frame_leaves_state_untouched() {
        let shake = handshake(4, 4);
        match shake.acquire_frame(Duration::from_millis(1), true) {
            Acquire::Frame(lease) => {
                assert!(!lease.frame_completed());
                // Dropped without release: nothing published, nothing
                // cleared, nothing signalled.
            }
            _ => panic!("forced acquisition must open the window"),
        }
        assert!(!shake.cancel_requested());
        assert!(matches!(
            shake.acquire_frame(Duration::from_millis(5), false),
            Acquire::Idle
        ));
    }

    #[test]
    fn cancel_flag_clears_exactly_once_per_cycle() {
        let shake = handshake(8, 8);
        shake.request_cancel_and_resize((2, 2));
        assert!(shake.cancel_requested());
        // Resolution is special-cased and visible before the release.
        assert_eq!(shake.begin_frame().globals.resolution, [2.0, 2.0]);

        let producer = {
            let shake = shake.clone();
            thread::spawn(move || shake.finish_frame())
        };

        let mut lease = match shake.acquire_frame(Duration::from_secs(2), false) {
            Acquire::Frame(lease) => lease,
            _ => panic!("expected the aborted frame to be published"),
        };
        assert_eq!(lease.take_pending_resize(), Some((2, 2)));
        assert_eq!(lease.take_pending_resize(), None);
        lease.install_framebuffer(Arc::new(FrameBuffer::new(2, 2)));
        lease.publish_and_release(0.0, [0.0, 0.0]);

        assert_eq!(producer.join().unwrap(), ProducerState::Continue);
        assert!(!shake.cancel_requested());
        assert_eq!(shake.begin_frame().framebuffer.width(), 2);
    }

    #[test]
    fn quit_unblocks_a_parked_producer() {
        let shake = handshake(4, 4);
        let producer = {
            let shake = shake.clone();
            thread::spawn(move || shake.finish_frame())
        };
        // Wait until the frame is published and the producer is parked.
        while !matches!(
            shake.acquire_frame(Duration::from_millis(20), false),
            Acquire::Frame(_)
        ) {}
        shake.request_quit();
        assert_eq!(producer.join().unwrap(), ProducerState::Quit);
        assert!(matches!(
            shake.acquire_frame(Duration::from_millis(1), false),
            Acquire::Quit
        ));
    }
}
