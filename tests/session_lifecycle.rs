//! End-to-end session scenarios over stub sources and backends.

use std::cell::Cell;
use std::rc::Rc;

use helmwatch::detect::backends::StubBackend;
use helmwatch::{
    annotate, CameraConfig, CameraSource, Category, CollectSink, ControllerError, Detection,
    Frame, FrameSink, FrameSource, HostPump, NoopPump, RawDetection, RenderPolicy,
    SessionController, SessionError, SessionState, SingleImageSource, SourceError, SourceStats,
    VideoConfig, VideoSource,
};

fn raw(class_id: u32, confidence: f32) -> RawDetection {
    RawDetection {
        x1: 10.0,
        y1: 20.0,
        x2: 60.0,
        y2: 80.0,
        class_id,
        confidence,
    }
}

/// Scenario A: single image, one class-0 detection at 0.9, threshold 0.4.
/// One NoHelmet-styled box, session STOPPED after one iteration.
#[test]
fn single_image_detects_no_helmet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.png");
    image::RgbImage::from_pixel(120, 120, image::Rgb([200, 200, 200]))
        .save(&path)
        .unwrap();

    let mut controller = SessionController::new(None);
    let mut source = SingleImageSource::new(&path);
    let mut backend = StubBackend::scripted(vec![Ok(vec![raw(0, 0.9)])]);
    let mut sink = CollectSink::new();

    let summary = controller
        .start(
            &mut source,
            &mut backend,
            &RenderPolicy::default().with_threshold(0.4),
            &mut sink,
            &mut NoopPump,
        )
        .unwrap();

    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.frames_emitted, 1);
    assert!(!summary.stopped_by_user);

    // The emitted frame carries the red NoHelmet outline.
    let img = sink.frames[0].to_image();
    assert_eq!(*img.get_pixel(30, 20), image::Rgb([255, 0, 0]));
}

/// Counts `close()` calls on the wrapped source.
struct CountingSource<S> {
    inner: S,
    closes: Rc<Cell<u32>>,
}

impl<S: FrameSource> FrameSource for CountingSource<S> {
    fn connect(&mut self) -> Result<(), SourceError> {
        self.inner.connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.inner.next_frame()
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
        self.inner.close();
    }

    fn stats(&self) -> SourceStats {
        self.inner.stats()
    }
}

/// Requests a stop once the given number of frames has been emitted.
struct StopAfterSink {
    inner: CollectSink,
    stop_after: usize,
    handle: helmwatch::SessionHandle,
}

impl FrameSink for StopAfterSink {
    fn emit(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.inner.emit(frame)?;
        if self.inner.frames.len() == self.stop_after {
            self.handle.request_stop();
        }
        Ok(())
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Scenario B: 5-frame clip, stop requested after frame 2 is emitted.
/// Somewhere between 2 and 5 frames make it out; the capture handle is
/// released exactly once.
#[test]
fn video_stop_request_takes_effect_within_one_iteration() {
    let closes = Rc::new(Cell::new(0));
    let mut controller = SessionController::new(None);
    let mut source = CountingSource {
        inner: VideoSource::new(VideoConfig {
            path: "stub://clip?frames=5".to_string(),
        }),
        closes: closes.clone(),
    };
    let mut backend = StubBackend::new();
    let mut sink = StopAfterSink {
        inner: CollectSink::new(),
        stop_after: 2,
        handle: controller.handle(),
    };

    let summary = controller
        .start(
            &mut source,
            &mut backend,
            &RenderPolicy::default(),
            &mut sink,
            &mut NoopPump,
        )
        .unwrap();

    assert!(summary.stopped_by_user);
    assert!(summary.frames_emitted >= 2 && summary.frames_emitted <= 5);
    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(closes.get(), 1);

    // A second stop request after the fact is a no-op.
    controller.handle().request_stop();
    assert_eq!(controller.state(), SessionState::Stopped);
}

/// Scenario C: camera that cannot be opened. `start` fails with
/// `Unavailable`, the state stays IDLE, and nothing was acquired.
#[cfg(not(feature = "ingest-v4l2"))]
#[test]
fn unopenable_camera_fails_start_and_stays_idle() {
    let mut controller = SessionController::new(None);
    let mut source = CameraSource::new(CameraConfig {
        device: "/dev/video99".to_string(),
    });
    let mut sink = CollectSink::new();

    let err = controller
        .start(
            &mut source,
            &mut StubBackend::new(),
            &RenderPolicy::default(),
            &mut sink,
            &mut NoopPump,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Source(SourceError::Unavailable(_))
    ));
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(sink.frames.is_empty());
}

/// A failing source open never lets a handle observe RUNNING: the state is
/// still IDLE while `connect` runs, and IDLE again after `start` fails.
#[test]
fn failed_source_open_never_enters_running() {
    struct FailingOpenSource {
        handle: helmwatch::SessionHandle,
        state_during_connect: Rc<Cell<Option<SessionState>>>,
    }

    impl FrameSource for FailingOpenSource {
        fn connect(&mut self) -> Result<(), SourceError> {
            self.state_during_connect.set(Some(self.handle.state()));
            Err(SourceError::Unavailable("capture device busy".to_string()))
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            Ok(None)
        }

        fn close(&mut self) {}

        fn stats(&self) -> SourceStats {
            SourceStats {
                frames_produced: 0,
                origin: "failing-open".to_string(),
            }
        }
    }

    let mut controller = SessionController::new(None);
    let observed = Rc::new(Cell::new(None));
    let mut source = FailingOpenSource {
        handle: controller.handle(),
        state_during_connect: observed.clone(),
    };

    let err = controller
        .start(
            &mut source,
            &mut StubBackend::new(),
            &RenderPolicy::default(),
            &mut CollectSink::new(),
            &mut NoopPump,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Source(SourceError::Unavailable(_))
    ));
    assert_eq!(observed.get(), Some(SessionState::Idle));
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn missing_image_fails_start_with_not_found() {
    let mut controller = SessionController::new(None);
    let mut source = SingleImageSource::new("/nonexistent/worker.png");

    let err = controller
        .start(
            &mut source,
            &mut StubBackend::new(),
            &RenderPolicy::default(),
            &mut CollectSink::new(),
            &mut NoopPump,
        )
        .unwrap_err();

    assert!(matches!(err, SessionError::Source(SourceError::NotFound(_))));
    assert_eq!(controller.state(), SessionState::Idle);
}

/// A stop request delivered through the host pump stops an endless camera
/// stream within one further iteration.
#[test]
fn camera_stream_stops_on_pump_delivered_request() {
    struct StopAfterPumps {
        remaining: u32,
        handle: helmwatch::SessionHandle,
    }
    impl HostPump for StopAfterPumps {
        fn pump_events(&mut self) {
            if self.remaining == 0 {
                self.handle.request_stop();
            } else {
                self.remaining -= 1;
            }
        }
    }

    let mut controller = SessionController::new(None);
    let mut pump = StopAfterPumps {
        remaining: 3,
        handle: controller.handle(),
    };
    let mut source = CameraSource::new(CameraConfig {
        device: "stub://cam".to_string(),
    });

    let summary = controller
        .start(
            &mut source,
            &mut StubBackend::new(),
            &RenderPolicy::default(),
            &mut CollectSink::new(),
            &mut pump,
        )
        .unwrap();

    assert!(summary.stopped_by_user);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(controller.state(), SessionState::Stopped);
}

#[test]
fn controller_reaches_stopped_after_completion() {
    let mut controller = SessionController::new(None);
    let mut source = VideoSource::new(VideoConfig {
        path: "stub://clip?frames=1".to_string(),
    });

    controller
        .start(
            &mut source,
            &mut StubBackend::new(),
            &RenderPolicy::default(),
            &mut CollectSink::new(),
            &mut NoopPump,
        )
        .unwrap();
    assert_eq!(controller.state(), SessionState::Stopped);
}

/// Annotated output respects the configured display size.
#[test]
fn session_applies_display_size() {
    let mut controller = SessionController::new(Some((320, 180)));
    let mut source = VideoSource::new(VideoConfig {
        path: "stub://clip?frames=2".to_string(),
    });
    let mut sink = CollectSink::new();

    controller
        .start(
            &mut source,
            &mut StubBackend::new(),
            &RenderPolicy::default(),
            &mut sink,
            &mut NoopPump,
        )
        .unwrap();

    assert_eq!(sink.frames.len(), 2);
    for frame in &sink.frames {
        assert_eq!((frame.width(), frame.height()), (320, 180));
    }
}

/// The annotate contract standalone: drawing never mutates the input frame.
#[test]
fn annotate_leaves_input_frame_untouched() {
    let frame = Frame::from_rgb24(vec![0u8; 100 * 100 * 3], 100, 100).unwrap();
    let before = frame.pixels().to_vec();
    let det = Detection {
        raw: raw(0, 0.9),
        category: Category::NoHelmet,
        label: "No Helmet 0.90".to_string(),
    };

    let _ = annotate(&frame, &[det], &RenderPolicy::default(), None);
    assert_eq!(frame.pixels(), &before[..]);
}

#[test]
fn already_running_error_formats() {
    let err: SessionError = ControllerError::AlreadyRunning.into();
    assert!(err.to_string().contains("already running"));
}
