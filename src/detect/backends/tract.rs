#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::error::DetectError;

/// Tract-based backend running a helmet-detection ONNX export.
///
/// Frames are stretch-resized to the model input size, normalized to NCHW
/// f32, and the output rows `[x1, y1, x2, y2, confidence, class_id]` are
/// scaled back to frame coordinates. No network I/O; the model file is the
/// only disk access.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let img = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
        let resized = image::imageops::resize(
            &img,
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );

        let w = self.input_width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, w),
            |(_, channel, y, x)| resized.as_raw()[(y * w + x) * 3 + channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    /// Decode `[x1, y1, x2, y2, confidence, class_id]` rows, scaling boxes
    /// from model input space back to frame space.
    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let scale_x = frame_width as f32 / self.input_width as f32;
        let scale_y = frame_height as f32 / self.input_height as f32;

        let mut detections = Vec::new();
        for row in view.rows() {
            if row.len() < 6 {
                continue;
            }
            let (x1, y1, x2, y2) = (row[0], row[1], row[2], row[3]);
            if !(x1 < x2 && y1 < y2) {
                continue;
            }
            detections.push(RawDetection {
                x1: x1 * scale_x,
                y1: y1 * scale_y,
                x2: x2 * scale_x,
                y2: y2 * scale_y,
                class_id: row[5].max(0.0) as u32,
                confidence: row[4].clamp(0.0, 1.0),
            });
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawDetection>, DetectError> {
        let run = || -> Result<Vec<RawDetection>> {
            let input = self.build_input(pixels, width, height)?;
            let outputs = self
                .model
                .run(tvec!(input.into()))
                .context("ONNX inference failed")?;
            self.decode_output(outputs, width, height)
        };
        run().map_err(|e| DetectError::InferenceFailed(format!("{e:#}")))
    }

    /// Prime the execution plan with a blank frame so the first real frame
    /// does not pay the one-off allocation cost.
    fn warm_up(&mut self) -> Result<(), DetectError> {
        let blank = vec![0u8; (self.input_width * self.input_height * 3) as usize];
        self.detect(&blank, self.input_width, self.input_height)
            .map(|_| ())
    }
}
