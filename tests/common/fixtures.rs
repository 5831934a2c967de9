use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use ppe_inspector::{BoundingBox, Detection, Detector, Language, SpeechSynthesizer};

/// Detector that replays a fixed list of answers, one per call
pub struct ScriptedDetector {
    answers: Mutex<VecDeque<Vec<Detection>>>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(answers: Vec<Vec<Detection>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .answers
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .pop_front();
        Ok(next.unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Speech engine returning fake MP3 bytes, or failing on demand
pub struct FakeSpeech {
    pub fail: bool,
    pub spoken: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self {
            fail: false,
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            spoken: Mutex::new(Vec::new()),
        }
    }
}

impl SpeechSynthesizer for FakeSpeech {
    fn synthesize(&self, text: &str, _language: Language) -> Result<Vec<u8>> {
        if self.fail {
            anyhow::bail!("speech service unavailable");
        }
        self.spoken
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(text.to_string());
        Ok(b"ID3fake".to_vec())
    }
}

pub fn detection(class_id: usize, label: &str, bbox: BoundingBox) -> Detection {
    Detection {
        class_id,
        label: label.to_string(),
        confidence: 0.9,
        bbox,
    }
}

pub fn person(bbox: BoundingBox) -> Detection {
    detection(0, "person", bbox)
}

pub fn ppe(labels: &[&str]) -> Vec<Detection> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| detection(i, label, BoundingBox::new(2, 2 + i as u32 * 4, 6, 3)))
        .collect()
}

/// 200x100 grey scene used by every test
pub fn scene() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([90, 90, 90])))
}
