//! Streaming sources: video files and live cameras.
//!
//! Real decoding is feature-gated (`ingest-ffmpeg` for files, `ingest-v4l2`
//! for cameras). `stub://` origins select synthetic backends that are always
//! compiled in: `stub://clip?frames=N` is a finite N-frame clip and
//! `stub://cam` is an endless synthetic camera. Without the matching
//! feature, a non-stub origin fails `SourceError::Unavailable` at connect.

use crate::error::SourceError;
use crate::frame::Frame;
use crate::source::{FrameSource, SourceStats};

const DEFAULT_STUB_CLIP_FRAMES: u64 = 25;
const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a video-file source.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    /// Local file path, or `stub://clip?frames=N` for the synthetic clip.
    pub path: String,
}

/// Configuration for a live camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g. "/dev/video0"), or `stub://cam` for the synthetic
    /// camera.
    pub device: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Video file source
// ----------------------------------------------------------------------------

/// Frame source backed by a video file. Ends when the file is exhausted.
pub struct VideoSource {
    config: VideoConfig,
    backend: Option<VideoBackend>,
    produced: u64,
}

enum VideoBackend {
    Synthetic(SyntheticStream),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(ffmpeg_clip::FfmpegClip),
}

impl VideoSource {
    pub fn new(config: VideoConfig) -> Self {
        Self {
            config,
            backend: None,
            produced: 0,
        }
    }
}

impl FrameSource for VideoSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        if let Some(rest) = self.config.path.strip_prefix("stub://") {
            let frames = parse_stub_frames(rest).unwrap_or(DEFAULT_STUB_CLIP_FRAMES);
            log::info!(
                "VideoSource: connected to {} (synthetic, {} frames)",
                self.config.path,
                frames
            );
            self.backend = Some(VideoBackend::Synthetic(SyntheticStream::finite(frames)));
            return Ok(());
        }

        #[cfg(feature = "ingest-ffmpeg")]
        {
            let clip = ffmpeg_clip::FfmpegClip::open(&self.config.path)?;
            log::info!("VideoSource: connected to {} (ffmpeg)", self.config.path);
            self.backend = Some(VideoBackend::Ffmpeg(clip));
            Ok(())
        }
        #[cfg(not(feature = "ingest-ffmpeg"))]
        {
            Err(SourceError::Unavailable(format!(
                "opening {} requires the ingest-ffmpeg feature",
                self.config.path
            )))
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(None);
        };
        let frame = match backend {
            VideoBackend::Synthetic(stream) => stream.next_frame()?,
            #[cfg(feature = "ingest-ffmpeg")]
            VideoBackend::Ffmpeg(clip) => clip.next_frame()?,
        };
        if frame.is_some() {
            self.produced += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            log::debug!("VideoSource: released {}", self.config.path);
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_produced: self.produced,
            origin: self.config.path.clone(),
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Live camera source
// ----------------------------------------------------------------------------

/// Frame source backed by a capture device. Never ends naturally; the
/// sequence runs until the session cancels it.
pub struct CameraSource {
    config: CameraConfig,
    backend: Option<CameraBackend>,
    produced: u64,
}

enum CameraBackend {
    Synthetic(SyntheticStream),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(v4l2_device::V4l2Camera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            backend: None,
            produced: 0,
        }
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        if self.config.device.starts_with("stub://") {
            log::info!(
                "CameraSource: connected to {} (synthetic)",
                self.config.device
            );
            self.backend = Some(CameraBackend::Synthetic(SyntheticStream::endless()));
            return Ok(());
        }

        #[cfg(feature = "ingest-v4l2")]
        {
            let camera = v4l2_device::V4l2Camera::open(&self.config.device)?;
            log::info!("CameraSource: connected to {}", self.config.device);
            self.backend = Some(CameraBackend::V4l2(camera));
            Ok(())
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(SourceError::Unavailable(format!(
                "opening {} requires the ingest-v4l2 feature",
                self.config.device
            )))
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(None);
        };
        let frame = match backend {
            CameraBackend::Synthetic(stream) => stream.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(camera) => camera.next_frame()?,
        };
        if frame.is_some() {
            self.produced += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            log::debug!("CameraSource: released {}", self.config.device);
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_produced: self.produced,
            origin: self.config.device.clone(),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parse the `frames=N` query of a `stub://clip?frames=N` origin.
fn parse_stub_frames(rest: &str) -> Option<u64> {
    let (_, query) = rest.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "frames" {
            value.parse().ok()
        } else {
            None
        }
    })
}

// ----------------------------------------------------------------------------
// Synthetic stream (stub://) for tests and demo runs
// ----------------------------------------------------------------------------

struct SyntheticStream {
    frame_count: u64,
    /// Remaining frames for finite clips, `None` for the endless camera.
    remaining: Option<u64>,
    scene_state: u8,
}

impl SyntheticStream {
    fn finite(frames: u64) -> Self {
        Self {
            frame_count: 0,
            remaining: Some(frames),
            scene_state: 0,
        }
    }

    fn endless() -> Self {
        Self {
            frame_count: 0,
            remaining: None,
            scene_state: 0,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        self.frame_count += 1;

        let pixels = self.generate_synthetic_pixels();
        Frame::from_rgb24(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT).map(Some)
    }

    /// Pattern fill varying with frame count, with an occasional scene
    /// change so downstream stages see different content over time.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

// ----------------------------------------------------------------------------
// FFmpeg-backed video file decoding
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg_clip {
    use ffmpeg_next as ffmpeg;

    use crate::error::SourceError;
    use crate::frame::Frame;

    pub(super) struct FfmpegClip {
        input: ffmpeg::format::context::Input,
        stream_index: usize,
        decoder: ffmpeg::codec::decoder::Video,
        scaler: ffmpeg::software::scaling::Context,
        draining: bool,
    }

    impl FfmpegClip {
        pub(super) fn open(path: &str) -> Result<Self, SourceError> {
            ffmpeg::init()
                .map_err(|e| SourceError::Unavailable(format!("initialize ffmpeg: {e}")))?;
            let input = ffmpeg::format::input(&path).map_err(|e| {
                SourceError::Unavailable(format!("failed to open video '{path}': {e}"))
            })?;
            let input_stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| {
                    SourceError::Unavailable(format!("'{path}' has no video track"))
                })?;
            let stream_index = input_stream.index();
            let context =
                ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
                    .map_err(|e| {
                        SourceError::Unavailable(format!("load video decoder parameters: {e}"))
                    })?;
            let decoder = context.decoder().video().map_err(|e| {
                SourceError::Unavailable(format!("open ffmpeg video decoder: {e}"))
            })?;

            let scaler = ffmpeg::software::scaling::context::Context::get(
                decoder.format(),
                decoder.width(),
                decoder.height(),
                ffmpeg::util::format::pixel::Pixel::RGB24,
                decoder.width(),
                decoder.height(),
                ffmpeg::software::scaling::flag::Flags::BILINEAR,
            )
            .map_err(|e| SourceError::Unavailable(format!("create ffmpeg scaler: {e}")))?;

            Ok(Self {
                input,
                stream_index,
                decoder,
                scaler,
                draining: false,
            })
        }

        pub(super) fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            let mut decoded = ffmpeg::frame::Video::empty();

            loop {
                if self.decoder.receive_frame(&mut decoded).is_ok() {
                    return self.scale_out(&decoded).map(Some);
                }
                if self.draining {
                    return Ok(None);
                }

                // Feed the decoder the next packet of our stream, or start
                // the drain once the container is exhausted.
                let mut fed = false;
                for (stream, packet) in self.input.packets() {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder.send_packet(&packet).map_err(|e| {
                        SourceError::Unavailable(format!("send packet to decoder: {e}"))
                    })?;
                    fed = true;
                    break;
                }
                if !fed {
                    let _ = self.decoder.send_eof();
                    self.draining = true;
                }
            }
        }

        fn scale_out(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame, SourceError> {
            let mut rgb = ffmpeg::frame::Video::empty();
            self.scaler
                .run(decoded, &mut rgb)
                .map_err(|e| SourceError::Unavailable(format!("scale frame to RGB: {e}")))?;

            let width = rgb.width();
            let height = rgb.height();
            let row_bytes = (width as usize) * 3;
            let stride = rgb.stride(0);
            let data = rgb.data(0);

            let pixels = if stride == row_bytes {
                data.to_vec()
            } else {
                let mut pixels = Vec::with_capacity(row_bytes * height as usize);
                for row in 0..height as usize {
                    let start = row * stride;
                    pixels.extend_from_slice(&data[start..start + row_bytes]);
                }
                pixels
            };

            Frame::from_rgb24(pixels, width, height)
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2-backed camera capture
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod v4l2_device {
    use ouroboros::self_referencing;

    use crate::error::SourceError;
    use crate::frame::Frame;

    pub(super) struct V4l2Camera {
        state: V4l2State,
        width: u32,
        height: u32,
    }

    #[self_referencing]
    struct V4l2State {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl V4l2Camera {
        pub(super) fn open(device_path: &str) -> Result<Self, SourceError> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(device_path).map_err(|e| {
                SourceError::Unavailable(format!("open v4l2 device {device_path}: {e}"))
            })?;
            let mut format = device
                .format()
                .map_err(|e| SourceError::Unavailable(format!("read v4l2 format: {e}")))?;
            format.fourcc = v4l::FourCC::new(b"RGB3");
            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!("V4l2Camera: failed to set format on {device_path}: {err}");
                    device.format().map_err(|e| {
                        SourceError::Unavailable(format!("read v4l2 format after set failure: {e}"))
                    })?
                }
            };
            let width = format.width;
            let height = format.height;

            let state = V4l2StateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4).map_err(
                        |e| SourceError::Unavailable(format!("create v4l2 buffer stream: {e}")),
                    )
                },
            }
            .try_build()?;

            Ok(Self {
                state,
                width,
                height,
            })
        }

        pub(super) fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            use v4l::io::traits::CaptureStream;

            let width = self.width;
            let height = self.height;
            let pixels = self
                .state
                .with_mut(|fields| {
                    fields
                        .stream
                        .next()
                        .map(|(buf, _meta)| buf.to_vec())
                })
                .map_err(|e| SourceError::Unavailable(format!("capture v4l2 frame: {e}")))?;

            Frame::from_rgb24(pixels, width, height).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_clip_ends_after_configured_frames() {
        let mut source = VideoSource::new(VideoConfig {
            path: "stub://clip?frames=3".to_string(),
        });
        source.connect().unwrap();

        let mut frames = 0;
        while source.next_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 3);
        // Exhausted sources stay exhausted.
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_produced, 3);
    }

    #[test]
    fn stub_camera_keeps_producing() {
        let mut source = CameraSource::new(CameraConfig {
            device: "stub://cam".to_string(),
        });
        source.connect().unwrap();

        for _ in 0..100 {
            assert!(source.next_frame().unwrap().is_some());
        }
    }

    #[test]
    fn closed_source_yields_nothing() {
        let mut source = CameraSource::new(CameraConfig {
            device: "stub://cam".to_string(),
        });
        source.connect().unwrap();
        assert!(source.next_frame().unwrap().is_some());

        source.close();
        source.close(); // idempotent
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_device_requires_feature() {
        let mut source = CameraSource::new(CameraConfig {
            device: "/dev/video99".to_string(),
        });
        assert!(matches!(
            source.connect(),
            Err(crate::error::SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn stub_frames_query_parses() {
        assert_eq!(parse_stub_frames("clip?frames=5"), Some(5));
        assert_eq!(parse_stub_frames("clip"), None);
        assert_eq!(parse_stub_frames("clip?speed=2&frames=12"), Some(12));
    }
}
