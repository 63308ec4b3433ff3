//! Detection values and the rendering policy.
//!
//! `RawDetection` is what a backend reports for one frame. The filter maps
//! it to a `Detection` carrying its semantic `Category` and display label.
//! Both are plain value types: produced once, never mutated downstream.

/// One candidate detection straight from the model.
///
/// Box corners are pixel coordinates with `x1 < x2` and `y1 < y2`.
/// Backends must not assume any ordering of the list they return.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: u32,
    pub confidence: f32,
}

/// Semantic class a detection is mapped to for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    NoHelmet,
    Helmet,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::NoHelmet => "No Helmet",
            Category::Helmet => "Helmet",
        }
    }
}

/// Display style for one category.
#[derive(Clone, Copy, Debug)]
pub struct CategoryStyle {
    /// Box and label color, RGB.
    pub color: [u8; 3],
}

/// A filtered detection ready for rendering.
#[derive(Clone, Debug)]
pub struct Detection {
    pub raw: RawDetection,
    pub category: Category,
    /// Rendered label, e.g. "No Helmet 0.87".
    pub label: String,
}

/// Confidence/class rendering policy for one session.
///
/// Built once from user configuration and immutable while the session runs.
/// Threshold changes take effect on the next session, not mid-stream.
#[derive(Clone, Debug)]
pub struct RenderPolicy {
    /// Detections pass only with confidence strictly above this.
    pub confidence_threshold: f32,
    pub no_helmet_style: CategoryStyle,
    pub helmet_style: CategoryStyle,
    /// Category assigned to class ids outside the trained set {0, 1}.
    /// Conservative default: treat unknown classes as wearing a helmet.
    pub unknown_class_category: Category,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            no_helmet_style: CategoryStyle {
                color: [255, 0, 0],
            },
            helmet_style: CategoryStyle {
                color: [0, 255, 0],
            },
            unknown_class_category: Category::Helmet,
        }
    }
}

impl RenderPolicy {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Fixed class mapping: id 0 is the no-helmet class, id 1 is helmet,
    /// anything else falls back to `unknown_class_category`.
    pub fn category_for(&self, class_id: u32) -> Category {
        match class_id {
            0 => Category::NoHelmet,
            1 => Category::Helmet,
            _ => self.unknown_class_category,
        }
    }

    pub fn style_for(&self, category: Category) -> CategoryStyle {
        match category {
            Category::NoHelmet => self.no_helmet_style,
            Category::Helmet => self.helmet_style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_zero_is_always_no_helmet() {
        let policy = RenderPolicy::default();
        assert_eq!(policy.category_for(0), Category::NoHelmet);
        assert_eq!(policy.category_for(1), Category::Helmet);
    }

    #[test]
    fn unknown_class_default_is_configurable() {
        let policy = RenderPolicy::default();
        assert_eq!(policy.category_for(7), Category::Helmet);

        let policy = RenderPolicy {
            unknown_class_category: Category::NoHelmet,
            ..RenderPolicy::default()
        };
        assert_eq!(policy.category_for(7), Category::NoHelmet);
        // Known ids are unaffected by the fallback.
        assert_eq!(policy.category_for(1), Category::Helmet);
    }
}
