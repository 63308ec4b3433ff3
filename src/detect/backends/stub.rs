use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::error::DetectError;

/// Stub backend for tests and `stub://` demo runs.
///
/// Two modes:
/// - Scripted: a queue of per-frame detection lists, consumed in order.
///   When the script runs out the backend reports empty frames. Entries may
///   be `Err` to exercise the soft-failure path.
/// - Derived (default): a single pseudo-detection synthesized from a SHA-256
///   digest of the pixels, so demo runs against synthetic sources still
///   produce stable, frame-dependent boxes.
pub struct StubBackend {
    script: Option<VecDeque<Result<Vec<RawDetection>, DetectError>>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { script: None }
    }

    /// Build a backend that replays the given per-frame results.
    pub fn scripted<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<RawDetection>, DetectError>>,
    {
        Self {
            script: Some(frames.into_iter().collect()),
        }
    }

    fn derive(&self, pixels: &[u8], width: u32, height: u32) -> Vec<RawDetection> {
        if width < 4 || height < 4 {
            return Vec::new();
        }
        let digest: [u8; 32] = Sha256::digest(pixels).into();

        // Place a box in the frame interior from digest bytes. Same pixels,
        // same box.
        let w = width as f32;
        let h = height as f32;
        let x1 = (digest[0] as f32 / 255.0) * (w / 2.0);
        let y1 = (digest[1] as f32 / 255.0) * (h / 2.0);
        let bw = (digest[2] as f32 / 255.0).max(0.1) * (w / 2.0 - 1.0);
        let bh = (digest[3] as f32 / 255.0).max(0.1) * (h / 2.0 - 1.0);
        let class_id = (digest[4] & 1) as u32;
        let confidence = 0.5 + (digest[5] as f32 / 255.0) * 0.5;

        vec![RawDetection {
            x1,
            y1,
            x2: x1 + bw.max(1.0),
            y2: y1 + bh.max(1.0),
            class_id,
            confidence,
        }]
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawDetection>, DetectError> {
        match self.script.as_mut() {
            Some(script) => script.pop_front().unwrap_or_else(|| Ok(Vec::new())),
            None => Ok(self.derive(pixels, width, height)),
        }
    }
}
