//! Frame sinks: where annotated frames go.
//!
//! The controller emits one annotated frame at a time and does not know
//! whether the other end is a window redraw, a file write, or a test
//! collector.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::frame::Frame;

/// Destination for annotated frames. Synchronous, one frame per call.
pub trait FrameSink {
    fn emit(&mut self, frame: &Frame) -> Result<()>;

    /// Close the display surface / flush the destination. Called once per
    /// session on every exit path.
    fn close(&mut self) {}
}

/// Writes numbered PNG files into a directory. The CLI default sink.
pub struct PngDirSink {
    dir: PathBuf,
    next_index: u64,
}

impl PngDirSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("could not create output directory {}", dir.display()))?;
        Ok(Self { dir, next_index: 0 })
    }

    pub fn frames_written(&self) -> u64 {
        self.next_index
    }
}

impl FrameSink for PngDirSink {
    fn emit(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.next_index));
        frame
            .to_image()
            .save(&path)
            .with_context(|| format!("could not write {}", path.display()))?;
        self.next_index += 1;
        Ok(())
    }

    fn close(&mut self) {
        log::info!(
            "PngDirSink: {} frames written to {}",
            self.next_index,
            self.dir.display()
        );
    }
}

/// Keeps emitted frames in memory. Test instrumentation.
#[derive(Default)]
pub struct CollectSink {
    pub frames: Vec<Frame>,
    pub close_calls: u32,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for CollectSink {
    fn emit(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.close_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_sink_writes_numbered_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngDirSink::new(dir.path()).unwrap();
        let frame = Frame::from_rgb24(vec![9u8; 4 * 4 * 3], 4, 4).unwrap();

        sink.emit(&frame).unwrap();
        sink.emit(&frame).unwrap();

        assert!(dir.path().join("frame_000000.png").is_file());
        assert!(dir.path().join("frame_000001.png").is_file());
        assert_eq!(sink.frames_written(), 2);
    }
}
