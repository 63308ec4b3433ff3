//! Confidence/class filter between the detector and the annotator.

use crate::detect::result::{Detection, RawDetection, RenderPolicy};

/// Apply the rendering policy to raw detections.
///
/// Pure function: drops detections at or below the confidence threshold
/// (strict greater-than passes), maps class ids to categories, and renders
/// the display label. Input order is preserved for the survivors, which
/// fixes the drawing order downstream.
pub fn filter(raw: &[RawDetection], policy: &RenderPolicy) -> Vec<Detection> {
    raw.iter()
        .filter(|det| det.confidence > policy.confidence_threshold)
        .map(|det| {
            let category = policy.category_for(det.class_id);
            Detection {
                raw: *det,
                category,
                label: format!("{} {:.2}", category.name(), det.confidence),
            }
        })
        .collect()
}
