//! Still-image sources: single file and directory batch.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::frame::Frame;
use crate::source::{FrameSource, SourceStats};

/// Source yielding exactly one frame decoded from an image file.
///
/// The file is decoded at `connect()` time so an unreadable image surfaces
/// as `SourceError::NotFound` before a session enters RUNNING.
pub struct SingleImageSource {
    path: PathBuf,
    pending: Option<Frame>,
    produced: u64,
}

impl SingleImageSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pending: None,
            produced: 0,
        }
    }
}

impl FrameSource for SingleImageSource {
    fn connect(&mut self) -> Result<(), SourceError> {
        let img = image::open(&self.path).map_err(|e| {
            SourceError::NotFound(format!("could not decode image {}: {}", self.path.display(), e))
        })?;
        self.pending = Some(Frame::from_image(img.into_rgb8()));
        log::info!("SingleImageSource: decoded {}", self.path.display());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let frame = self.pending.take();
        if frame.is_some() {
            self.produced += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.pending = None;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_produced: self.produced,
            origin: self.path.display().to_string(),
        }
    }
}

/// Source yielding one frame per decodable image in a directory.
///
/// Files are enumerated once at `connect()` and visited in file-name order
/// so runs are reproducible across filesystems. Files that fail to decode
/// are skipped, not errors.
pub struct DirectorySource {
    dir: PathBuf,
    files: VecDeque<PathBuf>,
    produced: u64,
    skipped: u64,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: VecDeque::new(),
            produced: 0,
            skipped: 0,
        }
    }

    /// Files skipped because they failed to decode.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl FrameSource for DirectorySource {
    fn connect(&mut self) -> Result<(), SourceError> {
        if !self.dir.is_dir() {
            return Err(SourceError::NotFound(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            SourceError::NotFound(format!("could not list {}: {}", self.dir.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        log::info!(
            "DirectorySource: {} files queued from {}",
            files.len(),
            self.dir.display()
        );
        self.files = files.into();
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        while let Some(path) = self.files.pop_front() {
            match image::open(&path) {
                Ok(img) => {
                    self.produced += 1;
                    return Ok(Some(Frame::from_image(img.into_rgb8())));
                }
                Err(e) => {
                    // Not every file in the directory has to be an image.
                    log::debug!("DirectorySource: skipping {}: {}", path.display(), e);
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.files.clear();
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_produced: self.produced,
            origin: self.dir.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_is_not_found() {
        let mut source = SingleImageSource::new("/nonexistent/helmet.jpg");
        assert!(matches!(
            source.connect(),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn single_image_yields_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.png");
        image::RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut source = SingleImageSource::new(&path);
        source.connect().unwrap();

        let frame = source.next_frame().unwrap().expect("one frame");
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_produced, 1);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let mut source = DirectorySource::new("/nonexistent/images");
        assert!(matches!(source.connect(), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn directory_skips_undecodable_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "c.png"] {
            image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("b.txt"), b"not an image").unwrap();

        let mut source = DirectorySource::new(dir.path());
        source.connect().unwrap();

        let mut frames = 0;
        while source.next_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 2);
        assert_eq!(source.skipped(), 1);
    }
}
