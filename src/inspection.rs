use std::path::PathBuf;
use std::sync::Arc;

use ab_glyph::FontVec;
use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage};

use crate::annotate;
use crate::compliance::{CompliancePolicy, Language, Verdict};
use crate::config::InspectorConfig;
use crate::detection::steps::{keys, AnnotateStep, ComplianceStep, PersonDetectionStep, PpeDetectionStep};
use crate::detection::{Detector, LazyDetector};
use crate::models::Detection;
use crate::pipeline::{BoundingBox, Pipeline, PipelineData};

/// Result for one detected person
#[derive(Debug, Clone)]
pub struct PersonResult {
    /// 1-based, in left-to-right order
    pub index: usize,
    pub bbox: BoundingBox,
    pub confidence: f32,
    /// Person crop with the PPE boxes drawn on it
    pub crop: RgbImage,
    pub detections: Vec<Detection>,
    pub verdict: Verdict,
}

impl PersonResult {
    /// Pass/fail message in `language`
    pub fn message(&self, language: Language) -> String {
        language.verdict_message(&self.verdict)
    }

    /// Normalised labels the verdict was computed from, sorted
    pub fn detected_labels(&self) -> Vec<String> {
        self.verdict.detected.iter().cloned().collect()
    }
}

/// Everything produced by one inspection run
#[derive(Debug, Clone)]
pub struct Inspection {
    pub original: RgbImage,
    /// Original with person boxes coloured by verdict
    pub overview: RgbImage,
    pub persons: Vec<PersonResult>,
    pub required: Vec<String>,
}

impl Inspection {
    /// True only when at least one person was found and everyone passed
    pub fn all_passed(&self) -> bool {
        !self.persons.is_empty() && self.persons.iter().all(|p| p.verdict.passed)
    }

    /// One line per person, or the no-persons message
    pub fn summary(&self, language: Language) -> Vec<String> {
        if self.persons.is_empty() {
            return vec![language.no_persons_message().to_string()];
        }
        self.persons
            .iter()
            .map(|p| format!("{}: {}", language.person_heading(p.index), p.message(language)))
            .collect()
    }
}

/// Runs person detection, PPE detection and the compliance check on a photo
pub struct Inspector {
    person_detector: Arc<dyn Detector>,
    ppe_detector: Arc<dyn Detector>,
    policy: CompliancePolicy,
    person_class: usize,
    font: Option<Arc<FontVec>>,
    debug_dir: Option<PathBuf>,
}

impl Inspector {
    pub fn new(
        config: &InspectorConfig,
        person_detector: Arc<dyn Detector>,
        ppe_detector: Arc<dyn Detector>,
    ) -> Result<Self> {
        let font = match &config.font {
            Some(path) => Some(Arc::new(annotate::load_font(path)?)),
            None => None,
        };

        Ok(Self {
            person_detector,
            ppe_detector,
            policy: CompliancePolicy::new(&config.policy.required),
            person_class: config.detection.person_class,
            font,
            debug_dir: None,
        })
    }

    /// Inspector backed by the two YOLO models named in the config.
    /// Models are loaded on first use.
    pub fn from_config(config: &InspectorConfig) -> Result<Self> {
        let person = LazyDetector::yolo(
            config.models.person.clone(),
            vec!["person".to_string()],
            config.person_params(),
        );
        let ppe = LazyDetector::yolo(
            config.models.equipment.clone(),
            config.policy.labels.clone(),
            config.equipment_params(),
        );
        Self::new(config, Arc::new(person), Arc::new(ppe))
    }

    pub fn with_debug(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    fn build_pipeline(&self) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new()
            .add_step(Arc::new(PersonDetectionStep {
                detector: self.person_detector.clone(),
                person_class: self.person_class,
            }))
            .add_step(Arc::new(PpeDetectionStep {
                detector: self.ppe_detector.clone(),
            }))
            .add_step(Arc::new(ComplianceStep {
                policy: self.policy.clone(),
            }))
            .add_step(Arc::new(AnnotateStep::new(self.font.clone())));

        if let Some(dir) = &self.debug_dir {
            pipeline = pipeline.with_debug(dir.clone())?;
        }
        Ok(pipeline)
    }

    pub fn inspect(&self, image: DynamicImage) -> Result<Inspection> {
        let original = image.to_rgb8();
        log::info!("Inspecting image {}x{}", original.width(), original.height());

        let results = self.build_pipeline()?.run(image)?;

        let persons = results
            .into_iter()
            .map(|item| self.person_result(item))
            .collect::<Result<Vec<_>>>()?;

        let boxes: Vec<(BoundingBox, bool)> = persons
            .iter()
            .map(|p| (p.bbox, p.verdict.passed))
            .collect();
        let overview = annotate::draw_overview(&original, &boxes);

        Ok(Inspection {
            original,
            overview,
            persons,
            required: self.policy.required().to_vec(),
        })
    }

    fn person_result(&self, item: PipelineData) -> Result<PersonResult> {
        let index = item
            .get_int(keys::PERSON_INDEX)
            .ok_or_else(|| anyhow!("Missing {}", keys::PERSON_INDEX))?;
        let bbox = item
            .bbox
            .ok_or_else(|| anyhow!("person {} has no bounding box", index))?;
        let confidence = item.get_float(keys::PERSON_CONFIDENCE).unwrap_or(0.0);

        let passed = item
            .get_bool(keys::PASSED)
            .ok_or_else(|| anyhow!("person {} was not checked for compliance", index))?;
        let verdict = Verdict {
            passed,
            detected: item
                .get_labels(keys::DETECTED_LABELS)
                .map(|labels| labels.iter().cloned().collect())
                .unwrap_or_default(),
            missing: item
                .get_labels(keys::MISSING)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        };

        Ok(PersonResult {
            index: index as usize,
            bbox,
            confidence,
            crop: item.image.to_rgb8(),
            detections: item.detections,
            verdict,
        })
    }
}
