mod common;

use std::sync::Arc;

use common::*;
use image::Rgb;
use ppe_inspector::annotate::{FAIL_COLOR, PASS_COLOR};

fn config(required: &[&str]) -> InspectorConfig {
    let mut config = InspectorConfig::default();
    config.policy.required = required.iter().map(|s| s.to_string()).collect();
    config
}

fn inspector(
    required: &[&str],
    persons: Vec<Detection>,
    equipment: Vec<Vec<Detection>>,
) -> anyhow::Result<(Inspector, Arc<ScriptedDetector>)> {
    let person_detector = Arc::new(ScriptedDetector::new(vec![persons]));
    let ppe_detector = Arc::new(ScriptedDetector::new(equipment));
    let inspector = Inspector::new(&config(required), person_detector, ppe_detector.clone())?;
    Ok((inspector, ppe_detector))
}

#[test]
fn each_person_gets_a_verdict() -> anyhow::Result<()> {
    let (inspector, _) = inspector(
        &["helmet", "vest", "boots"],
        vec![
            person(BoundingBox::new(10, 10, 40, 80)),
            person(BoundingBox::new(120, 5, 50, 90)),
        ],
        vec![ppe(&["helmet", "vest", "boots", "gloves"]), ppe(&["vest"])],
    )?;

    let inspection = inspector.inspect(scene())?;

    assert_eq!(inspection.persons.len(), 2);
    let first = &inspection.persons[0];
    assert_eq!(first.index, 1);
    assert!(first.verdict.passed);
    assert_eq!(first.crop.dimensions(), (40, 80));

    let second = &inspection.persons[1];
    assert_eq!(second.index, 2);
    assert_eq!(second.bbox, BoundingBox::new(120, 5, 50, 90));
    assert!(!second.verdict.passed);
    assert_eq!(second.verdict.missing, vec!["helmet", "boots"]);
    assert!(!inspection.all_passed());
    Ok(())
}

#[test]
fn verdict_carries_the_evaluated_label_set() -> anyhow::Result<()> {
    let (inspector, _) = inspector(
        &["helmet", "vest"],
        vec![person(BoundingBox::new(10, 10, 40, 80))],
        vec![ppe(&["Helmet", "  ", "vest", "helmet"])],
    )?;

    let inspection = inspector.inspect(scene())?;
    let verdict = &inspection.persons[0].verdict;

    assert!(verdict.passed);
    let detected: Vec<&str> = verdict.detected.iter().map(String::as_str).collect();
    assert_eq!(detected, vec!["helmet", "vest"]);
    assert_eq!(inspection.persons[0].detected_labels(), vec!["helmet", "vest"]);
    // raw detections are kept as the model reported them
    assert_eq!(inspection.persons[0].detections.len(), 4);
    Ok(())
}

#[test]
fn persons_are_numbered_left_to_right() -> anyhow::Result<()> {
    let (inspector, _) = inspector(
        &["helmet"],
        vec![
            person(BoundingBox::new(150, 0, 20, 20)),
            person(BoundingBox::new(5, 0, 20, 20)),
        ],
        vec![ppe(&["helmet"]), ppe(&[])],
    )?;

    let inspection = inspector.inspect(scene())?;
    assert_eq!(inspection.persons[0].bbox.x, 5);
    assert_eq!(inspection.persons[1].bbox.x, 150);
    // equipment answers follow the left-to-right order
    assert!(inspection.persons[0].verdict.passed);
    assert!(!inspection.persons[1].verdict.passed);
    Ok(())
}

#[test]
fn non_person_classes_are_ignored() -> anyhow::Result<()> {
    let (inspector, ppe_detector) = inspector(
        &["helmet"],
        vec![
            detection(2, "car", BoundingBox::new(0, 0, 50, 50)),
            person(BoundingBox::new(60, 0, 30, 60)),
        ],
        vec![ppe(&["helmet"])],
    )?;

    let inspection = inspector.inspect(scene())?;
    assert_eq!(inspection.persons.len(), 1);
    assert_eq!(ppe_detector.calls(), 1);
    assert!(inspection.all_passed());
    Ok(())
}

#[test]
fn no_persons_means_no_equipment_check() -> anyhow::Result<()> {
    let (inspector, ppe_detector) = inspector(&["helmet"], vec![], vec![])?;

    let inspection = inspector.inspect(scene())?;
    assert!(inspection.persons.is_empty());
    assert_eq!(ppe_detector.calls(), 0);
    assert!(!inspection.all_passed());
    assert_eq!(
        inspection.summary(Language::En),
        vec!["No people were detected in the image."]
    );
    Ok(())
}

#[test]
fn boxes_past_the_image_edge_are_clamped() -> anyhow::Result<()> {
    let (inspector, _) = inspector(
        &["helmet"],
        vec![
            person(BoundingBox::new(180, 50, 60, 90)),
            person(BoundingBox::new(300, 0, 10, 10)),
        ],
        vec![ppe(&["helmet"])],
    )?;

    let inspection = inspector.inspect(scene())?;
    assert_eq!(inspection.persons.len(), 1);
    assert_eq!(inspection.persons[0].bbox, BoundingBox::new(180, 50, 20, 50));
    Ok(())
}

#[test]
fn overview_and_crops_are_annotated() -> anyhow::Result<()> {
    let (inspector, _) = inspector(
        &["helmet"],
        vec![
            person(BoundingBox::new(10, 10, 40, 80)),
            person(BoundingBox::new(120, 5, 50, 90)),
        ],
        vec![ppe(&["helmet"]), ppe(&["vest"])],
    )?;

    let inspection = inspector.inspect(scene())?;
    assert_eq!(inspection.overview.get_pixel(10, 30), &PASS_COLOR);
    assert_eq!(inspection.overview.get_pixel(120, 30), &FAIL_COLOR);
    assert_eq!(inspection.original.get_pixel(10, 30), &Rgb([90, 90, 90]));

    // ppe() puts the first box at (2, 2) inside the crop
    assert_eq!(inspection.persons[0].crop.get_pixel(2, 3), &PASS_COLOR);
    Ok(())
}

#[test]
fn summary_lists_each_person() -> anyhow::Result<()> {
    let (inspector, _) = inspector(
        &["helmet", "vest"],
        vec![person(BoundingBox::new(10, 10, 40, 80))],
        vec![ppe(&["vest"])],
    )?;

    let inspection = inspector.inspect(scene())?;
    assert_eq!(
        inspection.summary(Language::Es),
        vec!["Persona 1: Lo siento compañero, no estás listo para trabajar. Te falta: helmet."]
    );
    Ok(())
}

#[test]
fn debug_mode_saves_every_step() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");
    let (inspector, _) = inspector(
        &["helmet"],
        vec![person(BoundingBox::new(10, 10, 40, 80))],
        vec![ppe(&["helmet"])],
    )?;

    inspector.with_debug(Some(debug_dir.clone())).inspect(scene())?;

    for step in ["00_input", "01_person_detection", "02_ppe_detection", "03_compliance_check", "04_annotate"] {
        assert!(debug_dir.join(step).join("01.png").exists(), "missing {}", step);
    }
    Ok(())
}
