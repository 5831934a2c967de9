#![allow(dead_code, unused_imports)]

mod fixtures;
pub use fixtures::*;

pub use ppe_inspector::{
    BoundingBox, CompliancePolicy, Detection, Detector, Inspection, Inspector, InspectorConfig,
    Language, ReportWriter, SpeechSynthesizer,
};
