use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;

use super::postprocess::{self, OutputLayout};
use super::preprocessing::{self, Letterbox};
use super::Detector;
use crate::models::Detection;

/// Inference settings shared by both models
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloParams {
    pub input_size: u32,
    pub confidence: f32,
    pub iou_threshold: f32,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence: 0.25,
            iou_threshold: 0.7,
        }
    }
}

/// YOLOv8-style detector running a `.rten` model
pub struct YoloDetector {
    name: String,
    model: Model,
    labels: Vec<String>,
    params: YoloParams,
}

impl YoloDetector {
    pub fn load(path: &Path, labels: Vec<String>, params: YoloParams) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Model not found: {}\nConvert the exported ONNX model with: rten-convert model.onnx",
                path.display()
            );
        }

        let model = Model::load_file(path)
            .with_context(|| format!("loading model {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        log::debug!("Loaded model '{}' from {}", name, path.display());

        Ok(Self {
            name,
            model,
            labels,
            params,
        })
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let size = self.params.input_size;
        let (canvas, letterbox) = preprocessing::letterbox(image, size);
        let input = NdTensor::from_data(
            [1, 3, size as usize, size as usize],
            preprocessing::to_chw(&canvas),
        );

        let output = self
            .model
            .run_one(input.view().into(), None)
            .with_context(|| format!("running model '{}'", self.name))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| anyhow!("unexpected output from model '{}': {:?}", self.name, e))?;

        let detections = to_detections(
            &output,
            &self.labels,
            &self.params,
            &letterbox,
            (image.width(), image.height()),
        );

        log::debug!("{}: {} detections", self.name, detections.len());
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Class name for `class_id`, or `class_<id>` when the model has more classes
/// than configured labels
fn label_for(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_id))
}

/// Decode a `[1, dim1, dim2]` head output into detections on the source image
fn to_detections(
    output: &NdTensor<f32, 3>,
    labels: &[String],
    params: &YoloParams,
    letterbox: &Letterbox,
    (width, height): (u32, u32),
) -> Vec<Detection> {
    let [_, dim1, dim2] = output.shape();
    let (layout, num_attrs, num_anchors) = OutputLayout::infer(dim1, dim2);
    let data = output.to_vec();

    let candidates = postprocess::decode(&data, layout, num_attrs, num_anchors, params.confidence);
    postprocess::non_max_suppression(candidates, params.iou_threshold)
        .into_iter()
        .map(|c| Detection {
            class_id: c.class_id,
            label: label_for(labels, c.class_id),
            confidence: c.confidence,
            bbox: letterbox.unmap(c.bbox).to_pixel_box(width, height),
        })
        .filter(|d| !d.bbox.is_empty())
        .collect()
}
