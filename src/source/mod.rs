//! Frame sources.
//!
//! One polymorphic interface over four kinds of input:
//! - a single still image (`SingleImageSource`)
//! - a video file (`VideoSource`, feature `ingest-ffmpeg` for real files)
//! - a live camera (`CameraSource`, feature `ingest-v4l2` for real devices)
//! - a directory of images (`DirectorySource`)
//!
//! Sources are lazy sequences: at most one frame is materialized at a time,
//! there is no read-ahead and no rewind. Replaying an input means building a
//! new source. `stub://` origins select synthetic backends that are always
//! available, for tests and demo runs without native capture stacks.

pub mod image;
pub mod video;

pub use self::image::{DirectorySource, SingleImageSource};
pub use video::{CameraConfig, CameraSource, VideoConfig, VideoSource};

use crate::error::SourceError;
use crate::frame::Frame;

/// A lazy sequence of frames behind a capture handle.
///
/// Lifecycle: `connect()` opens the underlying handle (file decode, capture
/// device); it is the only place fatal `SourceError`s originate. After a
/// successful connect, `next_frame()` yields frames in source order until it
/// returns `Ok(None)` (exhausted). `close()` releases the handle and is
/// idempotent; sources also release on drop.
pub trait FrameSource {
    /// Open the underlying handle. Called once, before the first frame.
    fn connect(&mut self) -> Result<(), SourceError>;

    /// Pull the next frame. `Ok(None)` means the sequence is exhausted,
    /// which is not an error.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Release the capture handle. Safe to call more than once.
    fn close(&mut self);

    /// Source statistics for health logging.
    fn stats(&self) -> SourceStats;
}

/// Statistics shared by all source kinds.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_produced: u64,
    /// Human-readable origin (path, device, directory).
    pub origin: String,
}
