pub mod annotate;
pub mod compliance;
pub mod config;
pub mod detection;
pub mod inspection;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod speech;

pub use compliance::{CompliancePolicy, Language, Verdict};
pub use config::InspectorConfig;
pub use detection::{Detector, LazyDetector, YoloDetector, YoloParams};
pub use inspection::{Inspection, Inspector, PersonResult};
pub use models::Detection;
pub use pipeline::{BoundingBox, MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep};
pub use report::{InspectionReport, ReportWriter};
pub use source::ImageInput;
pub use speech::{GoogleTranslateTts, SpeechSynthesizer};
