//! helmwatch - safety-helmet detection pipeline
//!
//! Unifies four frame inputs (single image, video file, image directory,
//! live camera) behind one detect → filter → annotate → emit loop with
//! cooperative cancellation:
//!
//! - [`source`]: the `FrameSource` trait and its four variants
//! - [`detect`]: detector backends, detection values, the confidence filter
//! - [`annotate`]: box/label rendering onto frame copies
//! - [`session`]: the controller state machine and cancel token
//! - [`sink`]: destinations for annotated frames
//!
//! The trained model is an external capability behind `DetectorBackend`;
//! `stub://` sources and the stub backend keep the whole pipeline runnable
//! without native capture stacks or a model file.

pub mod annotate;
pub mod config;
pub mod detect;
#[cfg(feature = "display-minifb")]
pub mod display;
pub mod error;
pub mod frame;
pub mod session;
pub mod sink;
pub mod source;
pub mod ui;

pub use annotate::annotate;
pub use config::{camera_device, HelmwatchConfig, SourceKind};
pub use detect::{Category, Detection, DetectorBackend, RawDetection, RenderPolicy};
pub use error::{ControllerError, DetectError, SessionError, SourceError};
pub use frame::Frame;
pub use session::{
    CancelToken, HostPump, NoopPump, SessionController, SessionHandle, SessionState,
    SessionSummary, SharedHost,
};
pub use sink::{CollectSink, FrameSink, PngDirSink};
pub use source::{
    CameraConfig, CameraSource, DirectorySource, FrameSource, SingleImageSource, SourceStats,
    VideoConfig, VideoSource,
};
