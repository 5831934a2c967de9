use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::compliance::Language;
use crate::inspection::{Inspection, PersonResult};
use crate::models::Detection;
use crate::pipeline::BoundingBox;
use crate::speech::SpeechSynthesizer;

pub const JSON_FILE: &str = "report.json";
pub const HTML_FILE: &str = "index.html";
pub const ORIGINAL_FILE: &str = "original.png";
pub const OVERVIEW_FILE: &str = "overview.png";

/// Machine-readable form of an inspection, written as `report.json`
#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub source: String,
    pub generated_at: String,
    pub language: Language,
    pub image_width: u32,
    pub image_height: u32,
    pub required: Vec<String>,
    pub persons_detected: usize,
    pub all_passed: bool,
    pub persons: Vec<PersonReport>,
}

/// One person's entry in the report
#[derive(Debug, Clone, Serialize)]
pub struct PersonReport {
    pub index: usize,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub passed: bool,
    /// Normalised labels the verdict was computed from
    pub detected: Vec<String>,
    /// Raw detections on the person crop
    pub missing: Vec<String>,
    pub detections: Vec<Detection>,
    pub message: String,
    /// Crop file name inside the report directory
    pub image: String,
    /// None when speech was disabled or failed
    pub audio: Option<String>,
}

impl InspectionReport {
    /// Build the report, stamped with the current UTC time
    pub fn new(inspection: &Inspection, source: &str, language: Language) -> Result<Self> {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("formatting report timestamp")?;

        Ok(Self {
            source: source.to_string(),
            generated_at,
            language,
            image_width: inspection.original.width(),
            image_height: inspection.original.height(),
            required: inspection.required.clone(),
            persons_detected: inspection.persons.len(),
            all_passed: inspection.all_passed(),
            persons: inspection
                .persons
                .iter()
                .map(|p| PersonReport::new(p, language))
                .collect(),
        })
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing report")
    }
}

impl PersonReport {
    fn new(person: &PersonResult, language: Language) -> Self {
        Self {
            index: person.index,
            bbox: person.bbox,
            confidence: person.confidence,
            passed: person.verdict.passed,
            detected: person.detected_labels(),
            missing: person.verdict.missing.clone(),
            detections: person.detections.clone(),
            message: person.message(language),
            image: person_image_file(person.index),
            audio: None,
        }
    }
}

/// File name of a person crop, e.g. `person_01.png`
pub fn person_image_file(index: usize) -> String {
    format!("person_{:02}.png", index)
}

/// File name of a person's spoken verdict, e.g. `person_01.mp3`
pub fn person_audio_file(index: usize) -> String {
    format!("person_{:02}.mp3", index)
}

/// Writes the report directory: images, optional audio, JSON and HTML
pub struct ReportWriter<'a> {
    language: Language,
    speech: Option<&'a dyn SpeechSynthesizer>,
}

impl<'a> ReportWriter<'a> {
    /// Writer without speech
    pub fn new(language: Language) -> Self {
        Self {
            language,
            speech: None,
        }
    }

    /// Speak each verdict with `speech`; None disables audio
    pub fn with_speech(mut self, speech: Option<&'a dyn SpeechSynthesizer>) -> Self {
        self.speech = speech;
        self
    }

    /// Create `dir` if needed and write every artifact into it.
    /// Speech errors are logged and only drop that person's audio.
    pub fn write(&self, dir: &Path, inspection: &Inspection, source: &str) -> Result<InspectionReport> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;

        save_png(&inspection.original, &dir.join(ORIGINAL_FILE))?;
        save_png(&inspection.overview, &dir.join(OVERVIEW_FILE))?;

        let mut report = InspectionReport::new(inspection, source, self.language)?;

        for (person, entry) in inspection.persons.iter().zip(report.persons.iter_mut()) {
            save_png(&person.crop, &dir.join(&entry.image))?;
            entry.audio = self.speak(dir, person.index, &entry.message);
        }

        let json_path = dir.join(JSON_FILE);
        std::fs::write(&json_path, report.to_json()?)
            .with_context(|| format!("writing {}", json_path.display()))?;

        let html_path = dir.join(HTML_FILE);
        std::fs::write(&html_path, render_html(&report))
            .with_context(|| format!("writing {}", html_path.display()))?;

        log::info!("Report written to {}", dir.display());
        Ok(report)
    }

    /// Speech is best effort; failures only cost the audio clip
    fn speak(&self, dir: &Path, index: usize, message: &str) -> Option<String> {
        let speech = self.speech?;
        let file = person_audio_file(index);
        let path: PathBuf = dir.join(&file);

        let result = speech
            .synthesize(message, self.language)
            .and_then(|audio| {
                std::fs::write(&path, audio)
                    .with_context(|| format!("writing {}", path.display()))
            });

        match result {
            Ok(()) => Some(file),
            Err(e) => {
                log::warn!("No audio for person {}: {:#}", index, e);
                None
            }
        }
    }
}

fn save_png(img: &image::RgbImage, path: &Path) -> Result<()> {
    img.save(path)
        .with_context(|| format!("saving image {}", path.display()))
}

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:auto;text-align:center}\
img.person{width:300px;border-radius:12px;box-shadow:0 4px 12px rgba(0,0,0,.2)}\
img.full{max-width:100%}\
.pass{background:#e6f4ea;color:#1e7e34;padding:.8em;border-radius:6px}\
.fail{background:#fdecea;color:#b02a37;padding:.8em;border-radius:6px}\
.info{background:#e8f0fe;color:#1a56b0;padding:.8em;border-radius:6px}";

/// Render `index.html` for a report
pub fn render_html(report: &InspectionReport) -> String {
    let lang = report.language;
    let mut html = String::new();

    // Writing into a String cannot fail
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<h1>{}</h1>\n",
        lang.code(),
        escape_html(lang.page_title()),
        STYLE,
        escape_html(lang.page_title()),
    );
    let _ = write!(
        html,
        "<h4>{}</h4>\n<img class=\"full\" src=\"{}\" alt=\"\">\n<h4>{}</h4>\n<img class=\"full\" src=\"{}\" alt=\"\">\n<hr>\n",
        escape_html(lang.original_image_heading()),
        ORIGINAL_FILE,
        escape_html(&lang.persons_detected(report.persons_detected)),
        OVERVIEW_FILE,
    );

    if report.persons.is_empty() {
        let _ = writeln!(
            html,
            "<p class=\"info\">{}</p>",
            escape_html(lang.no_persons_message())
        );
    }

    for person in &report.persons {
        let class = if person.passed { "pass" } else { "fail" };
        let _ = write!(
            html,
            "<section>\n<h4>{}</h4>\n<img class=\"person\" src=\"{}\" alt=\"\">\n<p><strong>{}</strong></p>\n<p class=\"{}\">{}</p>\n",
            escape_html(&lang.person_heading(person.index)),
            escape_html(&person.image),
            escape_html(&lang.detected_items(&person.detected)),
            class,
            escape_html(&person.message),
        );
        if let Some(audio) = &person.audio {
            let _ = writeln!(
                html,
                "<audio controls autoplay src=\"{}\" type=\"audio/mpeg\"></audio>",
                escape_html(audio)
            );
        }
        html.push_str("</section>\n<hr>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}
