mod common;

use std::sync::Arc;

use common::*;
use ppe_inspector::report::{HTML_FILE, JSON_FILE, ORIGINAL_FILE, OVERVIEW_FILE};

fn run_inspection() -> anyhow::Result<Inspection> {
    let mut config = InspectorConfig::default();
    config.policy.required = vec!["helmet".into(), "vest".into()];

    let persons = Arc::new(ScriptedDetector::new(vec![vec![
        person(BoundingBox::new(10, 10, 40, 80)),
        person(BoundingBox::new(120, 5, 50, 90)),
    ]]));
    let equipment = Arc::new(ScriptedDetector::new(vec![
        ppe(&["helmet", "vest"]),
        ppe(&["<vest>"]),
    ]));

    Inspector::new(&config, persons, equipment)?.inspect(scene())
}

#[test]
fn report_directory_has_every_artifact() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let out = dir.path().join("report");
    let inspection = run_inspection()?;
    let speech = FakeSpeech::new();

    let report = ReportWriter::new(Language::Es)
        .with_speech(Some(&speech))
        .write(&out, &inspection, "worker.jpg")?;

    for file in [ORIGINAL_FILE, OVERVIEW_FILE, JSON_FILE, HTML_FILE, "person_01.png", "person_02.png", "person_01.mp3", "person_02.mp3"] {
        assert!(out.join(file).exists(), "missing {}", file);
    }
    assert_eq!(report.persons[0].audio.as_deref(), Some("person_01.mp3"));
    assert_eq!(speech.spoken.lock().map(|s| s.len()).unwrap_or(0), 2);
    Ok(())
}

#[test]
fn json_report_describes_each_person() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let inspection = run_inspection()?;
    ReportWriter::new(Language::En).write(dir.path(), &inspection, "worker.jpg")?;

    let raw = std::fs::read_to_string(dir.path().join(JSON_FILE))?;
    let json: serde_json::Value = serde_json::from_str(&raw)?;

    assert_eq!(json["source"], "worker.jpg");
    assert_eq!(json["language"], "en");
    assert_eq!(json["image_width"], 200);
    assert_eq!(json["persons_detected"], 2);
    assert_eq!(json["all_passed"], false);
    assert_eq!(json["persons"][0]["passed"], true);
    assert_eq!(json["persons"][0]["detected"], serde_json::json!(["helmet", "vest"]));
    assert_eq!(json["persons"][1]["missing"][0], "helmet");
    assert_eq!(json["persons"][1]["bbox"]["x"], 120);
    assert!(json["persons"][1]["audio"].is_null());
    assert!(json["generated_at"].as_str().is_some_and(|t| t.contains('T')));
    Ok(())
}

#[test]
fn html_escapes_labels_and_embeds_audio() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let inspection = run_inspection()?;
    let speech = FakeSpeech::new();
    ReportWriter::new(Language::Es)
        .with_speech(Some(&speech))
        .write(dir.path(), &inspection, "worker.jpg")?;

    let html = std::fs::read_to_string(dir.path().join(HTML_FILE))?;
    assert!(html.contains("Personas detectadas: 2"));
    assert!(html.contains("Persona 1"));
    assert!(html.contains("¡Estás listo para trabajar compañero!"));
    assert!(html.contains("&lt;vest&gt;"));
    assert!(!html.contains("<vest>"));
    assert!(html.contains("<audio controls autoplay src=\"person_02.mp3\""));
    Ok(())
}

#[test]
fn speech_failure_only_drops_audio() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let inspection = run_inspection()?;
    let speech = FakeSpeech::failing();

    let report = ReportWriter::new(Language::Es)
        .with_speech(Some(&speech))
        .write(dir.path(), &inspection, "worker.jpg")?;

    assert!(report.persons.iter().all(|p| p.audio.is_none()));
    assert!(!dir.path().join("person_01.mp3").exists());
    assert!(dir.path().join(HTML_FILE).exists());
    Ok(())
}

#[test]
fn empty_inspection_reports_no_persons() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = InspectorConfig::default();
    let inspection = Inspector::new(
        &config,
        Arc::new(ScriptedDetector::new(vec![])),
        Arc::new(ScriptedDetector::new(vec![])),
    )?
    .inspect(scene())?;

    ReportWriter::new(Language::Es).write(dir.path(), &inspection, "-")?;
    let html = std::fs::read_to_string(dir.path().join(HTML_FILE))?;
    assert!(html.contains("No se detectaron personas en la imagen."));
    assert!(html.contains("Personas detectadas: 0"));
    Ok(())
}
