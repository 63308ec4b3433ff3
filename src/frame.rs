//! Pixel frames flowing through the pipeline.
//!
//! A `Frame` is a tightly packed RGB24 grid produced by a frame source,
//! handed to the detector, and consumed by the annotator. Ownership is
//! transient: sources materialize at most one frame at a time and the
//! original is discarded after each loop iteration.

use image::RgbImage;

use crate::error::SourceError;

/// One decoded RGB24 frame.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap raw RGB24 bytes. Fails when the buffer does not match the
    /// stated dimensions (3 bytes per pixel, no row padding).
    pub fn from_rgb24(data: Vec<u8>, width: u32, height: u32) -> Result<Self, SourceError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3));
        if expected != Some(data.len()) {
            return Err(SourceError::Unavailable(format!(
                "frame buffer of {} bytes does not match {}x{} RGB24",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_image(img: RgbImage) -> Self {
        let width = img.width();
        let height = img.height();
        Self {
            data: img.into_raw(),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB24 bytes, row-major, no padding.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn to_image(&self) -> RgbImage {
        // The length invariant is checked at construction, so from_raw
        // cannot fail here.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::from_rgb24(vec![0u8; 10], 4, 4).is_err());
    }

    #[test]
    fn round_trips_through_image() {
        let frame = Frame::from_rgb24(vec![7u8; 4 * 2 * 3], 4, 2).unwrap();
        let img = frame.to_image();
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 2);
        assert_eq!(Frame::from_image(img).pixels(), &[7u8; 24][..]);
    }
}
