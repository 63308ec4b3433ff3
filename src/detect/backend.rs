use crate::detect::result::RawDetection;
use crate::error::DetectError;

/// Detector backend trait.
///
/// Implementations receive one decoded RGB24 frame per call and return the
/// raw candidate detections for it. The pixel slice is read-only and
/// ephemeral; backends must not retain it across calls.
///
/// A failed `detect` call is a soft failure: the session logs it and moves
/// on to the next frame.
pub trait DetectorBackend: Send {
    /// Backend identifier for logs and config selection.
    fn name(&self) -> &'static str;

    /// Run detection on a frame. Returned boxes use pixel coordinates in
    /// the frame's own space; list order is unspecified.
    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawDetection>, DetectError>;

    /// Optional warm-up hook (model load sanity pass etc).
    fn warm_up(&mut self) -> Result<(), DetectError> {
        Ok(())
    }
}
