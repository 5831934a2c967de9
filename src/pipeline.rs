use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};

use crate::models::Detection;

/// Bounding box in pixel coordinates of some parent image
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// True when the box covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp the box so it lies inside an image of the given size
    pub fn clamp_to(&self, img_width: u32, img_height: u32) -> Self {
        let x = self.x.min(img_width);
        let y = self.y.min(img_height);
        Self {
            x,
            y,
            width: self.width.min(img_width - x),
            height: self.height.min(img_height - y),
        }
    }
}

/// One image region flowing through the pipeline.
///
/// The first item is the full input image; a splitting step (person detection)
/// turns it into one item per region, and later steps enrich those items.
#[derive(Clone)]
pub struct PipelineData {
    /// Current image for this item (a crop once the item has been split)
    pub image: DynamicImage,

    /// The untouched input image, shared by every item
    pub original: Arc<DynamicImage>,

    /// Region of `original` this item covers (None means full image)
    pub bbox: Option<BoundingBox>,

    /// Detections produced for `image`, in its own coordinates
    pub detections: Vec<Detection>,

    /// Per-item properties such as "person_index" or "passed"
    pub metadata: HashMap<String, MetadataValue>,
}

/// Typed value stored in `PipelineData::metadata`
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Float(f32),
    Int(i64),
    Labels(Vec<String>),
}

impl PipelineData {
    /// Create the initial item from a full input image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            bbox: None,
            detections: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Create an item for a region cropped out of `original`
    pub fn from_region(image: DynamicImage, original: Arc<DynamicImage>, bbox: BoundingBox) -> Self {
        Self {
            image,
            original,
            bbox: Some(bbox),
            detections: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Builder-style metadata insert
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Insert or replace a metadata value
    pub fn set(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.metadata.insert(key.into(), value);
    }

    /// Get a bool metadata value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetadataValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get a float metadata value
    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get an integer metadata value
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get a label list metadata value
    pub fn get_labels(&self, key: &str) -> Option<&[String]> {
        match self.metadata.get(key) {
            Some(MetadataValue::Labels(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Labels of the detections attached to this item, in detection order
    pub fn detected_labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }
}

/// Where debug images are written when debug mode is on
#[derive(Clone, Debug)]
pub struct DebugConfig {
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// Directory for the outputs of step `index` (1-based, 0 is the input)
    pub fn step_dir(&self, index: usize, step_name: &str) -> PathBuf {
        let slug = step_name.to_lowercase().replace(' ', "_");
        self.output_dir.join(format!("{:02}_{}", index, slug))
    }
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name, also used for the debug directory
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode. The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir)
                .with_context(|| format!("reading debug directory {}", output_dir.display()))?;
            if entries.next().is_some() {
                anyhow::bail!("Debug directory is not empty: {}", output_dir.display());
            }
        } else {
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("creating debug directory {}", output_dir.display()))?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Append a step; steps run in insertion order
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step in order, starting from a single item holding `input`
    pub fn run(&self, input: DynamicImage) -> Result<Vec<PipelineData>> {
        let mut data = vec![PipelineData::from_image(input)];
        self.save_debug(0, "input", &data)?;

        for (step_idx, step) in self.steps.iter().enumerate() {
            log::debug!("Running step: {} (processing {} items)", step.name(), data.len());

            data = step
                .process(data, &self.context)
                .with_context(|| format!("pipeline step '{}' failed", step.name()))?;
            self.save_debug(step_idx + 1, step.name(), &data)?;

            log::debug!("  → {} items", data.len());
        }

        Ok(data)
    }

    fn save_debug(&self, index: usize, step_name: &str, data: &[PipelineData]) -> Result<()> {
        let Some(debug) = &self.context.debug else {
            return Ok(());
        };

        let step_dir = debug.step_dir(index, step_name);
        std::fs::create_dir_all(&step_dir)?;

        for (idx, item) in data.iter().enumerate() {
            let output_path = step_dir.join(format!("{:02}.png", idx + 1));
            item.image
                .save(&output_path)
                .with_context(|| format!("saving debug image {}", output_path.display()))?;
        }

        log::debug!("  Debug: saved {} images to {}", data.len(), step_dir.display());
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
