//! Session controller: the detect-and-render loop and its lifecycle.
//!
//! One session drives one frame source through
//! source → detector → filter → annotator → sink, cooperatively: every
//! iteration first yields to the host's event pump, then polls the cancel
//! token, then processes one frame. The pump-before-poll ordering matters:
//! in a single-threaded interactive host the event pump is the only place a
//! stop request can be delivered, so skipping the yield would freeze the
//! host for the whole stream.
//!
//! Cancellation is coarse-grained: the token is polled once per iteration,
//! never mid-inference. The source's capture handle is released on every
//! exit path (natural exhaustion, user stop, fatal error), exactly once.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::annotate::annotate;
use crate::detect::backend::DetectorBackend;
use crate::detect::filter::filter;
use crate::detect::result::RenderPolicy;
use crate::error::{ControllerError, SessionError};
use crate::sink::FrameSink;
use crate::source::FrameSource;

/// Lifecycle of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Running,
            2 => SessionState::Stopping,
            3 => SessionState::Stopped,
            _ => SessionState::Idle,
        }
    }
}

/// Cooperative cancellation flag.
///
/// Single writer (the host binding), single reader (the session loop); the
/// loop polls it at the iteration boundary, right after the host pump has
/// run. `request_stop` is idempotent.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Host-facing view of a controller: stop control plus state for status
/// display. Cheap to clone and hand to UI bindings.
#[derive(Clone)]
pub struct SessionHandle {
    cancel: CancelToken,
    state: Arc<AtomicU8>,
}

impl SessionHandle {
    pub fn request_stop(&self) {
        self.cancel.request_stop();
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// The host's event pump. Called first in every loop iteration so pending
/// UI events (including a stop click) get serviced while a stream runs.
pub trait HostPump {
    fn pump_events(&mut self);
}

/// Pump for hosts without an event loop (plain CLI runs; Ctrl-C arrives
/// through the cancel token instead).
#[derive(Default)]
pub struct NoopPump;

impl HostPump for NoopPump {
    fn pump_events(&mut self) {}
}

/// Shares one host object between the sink and pump slots of `start`.
///
/// Interactive hosts (a display window) are both the frame sink and the
/// event pump; the loop calls the two roles strictly in turn, so a
/// `RefCell` is enough to hand the same object to both parameters.
pub struct SharedHost<T>(Rc<RefCell<T>>);

impl<T> SharedHost<T> {
    pub fn new(host: T) -> Self {
        Self(Rc::new(RefCell::new(host)))
    }
}

impl<T> Clone for SharedHost<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: crate::sink::FrameSink> crate::sink::FrameSink for SharedHost<T> {
    fn emit(&mut self, frame: &crate::frame::Frame) -> anyhow::Result<()> {
        self.0.borrow_mut().emit(frame)
    }

    fn close(&mut self) {
        self.0.borrow_mut().close()
    }
}

impl<T: HostPump> HostPump for SharedHost<T> {
    fn pump_events(&mut self) {
        self.0.borrow_mut().pump_events()
    }
}

/// Outcome of a finished session.
#[derive(Clone, Debug, Default)]
pub struct SessionSummary {
    /// Frames pulled from the source.
    pub frames_processed: u64,
    /// Annotated frames delivered to the sink.
    pub frames_emitted: u64,
    /// Frames skipped because inference failed on them.
    pub detect_failures: u64,
    /// Whether the session ended on a stop request rather than exhaustion.
    pub stopped_by_user: bool,
}

/// Drives one session at a time over a frame source.
pub struct SessionController {
    state: Arc<AtomicU8>,
    cancel: CancelToken,
    /// Optional fixed presentation size for annotated output.
    display_size: Option<(u32, u32)>,
}

impl SessionController {
    pub fn new(display_size: Option<(u32, u32)>) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(SessionState::Idle as u8)),
            cancel: CancelToken::new(),
            display_size,
        }
    }

    /// Handle for the host: stop control and state display.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, state: SessionState) {
        self.set_state(state);
    }

    /// Run a session to completion.
    ///
    /// Fails with `ControllerError::AlreadyRunning` (no state change) when a
    /// session is in flight, and with `SourceError` when the source cannot
    /// be opened; in that case `Running` is never entered, the state is back
    /// to `Idle`, and no handle is held. Otherwise the session ends
    /// `Stopped` with the source released,
    /// whether it ran out of frames, was stopped, or failed mid-stream.
    pub fn start(
        &mut self,
        source: &mut dyn FrameSource,
        backend: &mut dyn DetectorBackend,
        policy: &RenderPolicy,
        sink: &mut dyn FrameSink,
        pump: &mut dyn HostPump,
    ) -> Result<SessionSummary, SessionError> {
        match self.state() {
            SessionState::Running | SessionState::Stopping => {
                return Err(ControllerError::AlreadyRunning.into());
            }
            SessionState::Idle | SessionState::Stopped => {}
        }

        self.cancel.reset();

        // Connect before entering Running: a session whose source cannot be
        // opened is never observable as RUNNING through a handle.
        if let Err(e) = source.connect() {
            self.set_state(SessionState::Idle);
            return Err(e.into());
        }
        self.set_state(SessionState::Running);

        let result = self.run_loop(source, backend, policy, sink, pump);

        // Release on every exit path; close() is idempotent.
        source.close();
        sink.close();
        self.set_state(SessionState::Stopped);

        if let Ok(summary) = &result {
            log::info!(
                "session stopped: {} processed, {} emitted, {} detect failures{}",
                summary.frames_processed,
                summary.frames_emitted,
                summary.detect_failures,
                if summary.stopped_by_user {
                    " (stopped by user)"
                } else {
                    ""
                }
            );
        }
        result
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        backend: &mut dyn DetectorBackend,
        policy: &RenderPolicy,
        sink: &mut dyn FrameSink,
        pump: &mut dyn HostPump,
    ) -> Result<SessionSummary, SessionError> {
        let mut summary = SessionSummary::default();

        loop {
            // 1. Yield to the host before polling: the pump is where a stop
            //    request gets delivered.
            pump.pump_events();

            // 2. Poll cancellation at the loop boundary.
            if self.cancel.is_requested() {
                self.set_state(SessionState::Stopping);
                summary.stopped_by_user = true;
                break;
            }

            // 3. Pull the next frame; exhaustion is a normal stop.
            let frame = match source.next_frame()? {
                Some(frame) => frame,
                None => {
                    self.set_state(SessionState::Stopping);
                    break;
                }
            };
            summary.frames_processed += 1;

            // 4. Detect, filter, annotate. A failed inference skips the
            //    frame, never the session.
            let raw = match backend.detect(frame.pixels(), frame.width(), frame.height()) {
                Ok(raw) => raw,
                Err(e) => {
                    summary.detect_failures += 1;
                    log::warn!(
                        "frame {} skipped: {}",
                        summary.frames_processed,
                        e
                    );
                    continue;
                }
            };
            let detections = filter(&raw, policy);
            let annotated = annotate(&frame, &detections, policy, self.display_size);

            // 5. Emit downstream.
            sink.emit(&annotated)
                .map_err(|e| SessionError::Sink(format!("{e:#}")))?;
            summary.frames_emitted += 1;
        }

        Ok(summary)
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(None)
    }
}
