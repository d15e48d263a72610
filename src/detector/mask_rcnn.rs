use std::path::{Path, PathBuf};

use image::DynamicImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::{debug, info};

use crate::detector::Detector;
use crate::error::{Error, Result};
use crate::models::{BoundingBox, Detection, ElementClass, InstanceMask};

/// Mask probability above which a pixel belongs to the instance
const MASK_THRESHOLD: f32 = 0.5;

/// Pretrained Mask R-CNN floor plan model, exported to the `.rten` format.
///
/// The graph takes one `[1, 3, H, W]` float image scaled to [0, 1] and
/// produces, in order:
/// - `rois`: `[N, 4]` boxes as `y1, x1, y2, x2` pixels
/// - `class_ids`: `[N]` class indices (0 = background, 1 = wall, 2 = window, 3 = door)
/// - `scores`: `[N]` confidences
/// - `masks`: `[N, H, W]` per-instance probabilities at input resolution
pub struct MaskRcnnDetector {
    model: Model,
    weights: PathBuf,
    min_confidence: f32,
}

impl MaskRcnnDetector {
    pub fn load(weights: &Path) -> Result<Self> {
        if !weights.is_file() {
            return Err(Error::ModelLoad {
                path: weights.to_path_buf(),
                reason: "weights file not found".to_string(),
            });
        }

        info!("Loading Mask R-CNN weights from {}", weights.display());
        let model = Model::load_file(weights).map_err(|e| Error::ModelLoad {
            path: weights.to_path_buf(),
            reason: e.to_string(),
        })?;

        if model.input_ids().len() != 1 || model.output_ids().len() != 4 {
            return Err(Error::ModelLoad {
                path: weights.to_path_buf(),
                reason: format!(
                    "expected 1 input and 4 outputs, model has {} and {}",
                    model.input_ids().len(),
                    model.output_ids().len()
                ),
            });
        }

        Ok(Self {
            model,
            weights: weights.to_path_buf(),
            min_confidence: 0.5,
        })
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn weights(&self) -> &Path {
        &self.weights
    }

    fn input_tensor(image: &DynamicImage) -> NdTensor<f32, 4> {
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let mut data = vec![0f32; 3 * height * width];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                data[c * height * width + y as usize * width + x as usize] =
                    pixel[c] as f32 / 255.0;
            }
        }
        NdTensor::from_data([1, 3, height, width], data)
    }
}

/// Non-finite scores never pass, whatever the threshold.
fn passes_confidence(score: f32, min_confidence: f32) -> bool {
    score.is_finite() && score >= min_confidence
}

fn inference_error(e: impl std::fmt::Display) -> Error {
    Error::Inference(e.to_string())
}

impl Detector for MaskRcnnDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(Error::Inference(format!(
                "Cannot detect on a {}x{} image",
                width, height
            )));
        }

        let input = Self::input_tensor(image);
        let input_id = self.model.input_ids()[0];
        let output_ids = self.model.output_ids().to_vec();

        let mut outputs = self
            .model
            .run(vec![(input_id, input.view().into())], &output_ids, None)
            .map_err(inference_error)?
            .into_iter();

        let mut next = || outputs.next().ok_or_else(|| inference_error("model returned too few outputs"));
        let rois: NdTensor<f32, 2> = next()?.try_into().map_err(inference_error)?;
        let class_ids: NdTensor<f32, 1> = next()?.try_into().map_err(inference_error)?;
        let scores: NdTensor<f32, 1> = next()?.try_into().map_err(inference_error)?;
        let masks: NdTensor<f32, 3> = next()?.try_into().map_err(inference_error)?;

        let count = rois.shape()[0];
        if rois.shape()[1] != 4
            || class_ids.shape()[0] != count
            || scores.shape()[0] != count
            || masks.shape() != [count, height as usize, width as usize]
        {
            return Err(Error::Inference(format!(
                "Inconsistent output shapes: rois {:?}, class_ids {:?}, scores {:?}, masks {:?}",
                rois.shape(),
                class_ids.shape(),
                scores.shape(),
                masks.shape()
            )));
        }

        let mut detections = Vec::with_capacity(count);
        for i in 0..count {
            let score = scores[[i]];
            if !passes_confidence(score, self.min_confidence) {
                continue;
            }
            let class = match ElementClass::from_id(class_ids[[i]].round() as u32) {
                Some(ElementClass::Background) | None => continue,
                Some(class) => class,
            };

            let clamp_x = |v: f32| v.clamp(0.0, width as f32);
            let clamp_y = |v: f32| v.clamp(0.0, height as f32);
            let bbox = BoundingBox::new(
                clamp_x(rois[[i, 1]]),
                clamp_y(rois[[i, 0]]),
                clamp_x(rois[[i, 3]]),
                clamp_y(rois[[i, 2]]),
            );
            if !bbox.is_within(width, height) {
                continue;
            }

            let mask = InstanceMask::from_fn(width, height, |x, y| {
                masks[[i, y as usize, x as usize]] > MASK_THRESHOLD
            });

            detections.push(Detection {
                class,
                score: score.clamp(0.0, 1.0),
                bbox,
                mask,
            });
        }

        debug!("Mask R-CNN kept {} of {} detections", detections.len(), count);
        Ok(detections)
    }

    fn name(&self) -> &str {
        "mask-rcnn"
    }
}
