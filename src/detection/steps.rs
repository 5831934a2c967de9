use std::sync::Arc;

use ab_glyph::FontVec;
use anyhow::Result;
use image::{DynamicImage, Rgb};

use super::Detector;
use crate::annotate;
use crate::compliance::CompliancePolicy;
use crate::pipeline::{BoundingBox, MetadataValue, PipelineContext, PipelineData, PipelineStep};

/// Metadata keys written by the steps below
pub mod keys {
    pub const PERSON_INDEX: &str = "person_index";
    pub const PERSON_CONFIDENCE: &str = "person_confidence";
    pub const DETECTED_LABELS: &str = "detected_labels";
    pub const PASSED: &str = "passed";
    pub const MISSING: &str = "missing";
}

/// COCO class id for "person"
pub const COCO_PERSON_CLASS: usize = 0;

/// Find people in the image and split it into one item per person crop
pub struct PersonDetectionStep {
    pub detector: Arc<dyn Detector>,
    pub person_class: usize,
}

impl PipelineStep for PersonDetectionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let mut persons: Vec<_> = self
                .detector
                .detect(&item.image)?
                .into_iter()
                .filter(|d| d.class_id == self.person_class)
                .collect();
            // Reading order, so "person 1" is the leftmost one
            persons.sort_by_key(|d| (d.bbox.x, d.bbox.y));

            log::info!("Persons detected: {}", persons.len());

            let (offset_x, offset_y) = item.bbox.map(|b| (b.x, b.y)).unwrap_or((0, 0));
            let (img_width, img_height) = (item.image.width(), item.image.height());

            for person in persons {
                let local = person.bbox.clamp_to(img_width, img_height);
                if local.is_empty() {
                    log::debug!("Skipping empty person box {:?}", person.bbox);
                    continue;
                }

                let crop = item.image.crop_imm(local.x, local.y, local.width, local.height);
                let bbox = BoundingBox::new(local.x + offset_x, local.y + offset_y, local.width, local.height);
                let index = result.len() as i64 + 1;

                let person_item = PipelineData::from_region(crop, item.original.clone(), bbox)
                    .with_metadata(keys::PERSON_INDEX, MetadataValue::Int(index))
                    .with_metadata(keys::PERSON_CONFIDENCE, MetadataValue::Float(person.confidence));
                result.push(person_item);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Person Detection"
    }
}

/// Run the PPE detector on each person crop
pub struct PpeDetectionStep {
    pub detector: Arc<dyn Detector>,
}

impl PipelineStep for PpeDetectionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let total = data.len();
        let mut result = Vec::with_capacity(total);

        for (i, mut item) in data.into_iter().enumerate() {
            log::debug!("  Checking equipment for person {} of {}...", i + 1, total);

            item.detections = self.detector.detect(&item.image)?;
            log::debug!("    Detected: {}", item.detected_labels().join(", "));
            result.push(item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "PPE Detection"
    }
}

/// Compare the detected labels of each person against the policy.
/// Records the evaluated label set alongside the outcome.
pub struct ComplianceStep {
    pub policy: CompliancePolicy,
}

impl PipelineStep for ComplianceStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::with_capacity(data.len());

        for mut item in data {
            let verdict = self.policy.evaluate(item.detected_labels());
            item.set(keys::PASSED, MetadataValue::Bool(verdict.passed));
            item.set(
                keys::DETECTED_LABELS,
                MetadataValue::Labels(verdict.detected.into_iter().collect()),
            );
            item.set(keys::MISSING, MetadataValue::Labels(verdict.missing));
            result.push(item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Compliance Check"
    }
}

/// Draw the PPE boxes onto each person crop
pub struct AnnotateStep {
    pub font: Option<Arc<FontVec>>,
    pub color: Rgb<u8>,
}

impl AnnotateStep {
    pub fn new(font: Option<Arc<FontVec>>) -> Self {
        Self {
            font,
            color: annotate::PASS_COLOR,
        }
    }
}

impl PipelineStep for AnnotateStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::with_capacity(data.len());

        for mut item in data {
            let mut canvas = item.image.to_rgb8();
            annotate::draw_detections(&mut canvas, &item.detections, self.color, self.font.as_deref());
            item.image = DynamicImage::ImageRgb8(canvas);
            result.push(item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Annotate"
    }
}
