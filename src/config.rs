use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::compliance::Language;
use crate::detection::steps::COCO_PERSON_CLASS;
use crate::detection::YoloParams;

pub const CONFIG_ENV: &str = "PPE_INSPECTOR_CONFIG";

const DEFAULT_PERSON_MODEL: &str = "models/yolov8n.rten";
const DEFAULT_EQUIPMENT_MODEL: &str = "models/ppe.rten";
const DEFAULT_LABELS: [&str; 4] = ["helmet", "vest", "boots", "gloves"];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    models: Option<ModelsFile>,
    detection: Option<DetectionFile>,
    policy: Option<PolicyFile>,
    speech: Option<SpeechFile>,
    output: Option<OutputFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelsFile {
    person: Option<PathBuf>,
    equipment: Option<PathBuf>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionFile {
    person_class: Option<usize>,
    person_confidence: Option<f32>,
    equipment_confidence: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    labels: Option<Vec<String>>,
    required: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SpeechFile {
    enabled: Option<bool>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputFile {
    font: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectorConfig {
    pub models: ModelSettings,
    pub detection: DetectionSettings,
    pub policy: PolicySettings,
    pub speech: SpeechSettings,
    pub font: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub person: PathBuf,
    pub equipment: PathBuf,
    pub input_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub person_class: usize,
    pub person_confidence: f32,
    pub equipment_confidence: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicySettings {
    /// Class names of the equipment model, indexed by class id
    pub labels: Vec<String>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub language: Language,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        let labels: Vec<String> = DEFAULT_LABELS.iter().map(|s| s.to_string()).collect();
        let params = YoloParams::default();
        Self {
            models: ModelSettings {
                person: PathBuf::from(DEFAULT_PERSON_MODEL),
                equipment: PathBuf::from(DEFAULT_EQUIPMENT_MODEL),
                input_size: params.input_size,
            },
            detection: DetectionSettings {
                person_class: COCO_PERSON_CLASS,
                person_confidence: params.confidence,
                equipment_confidence: params.confidence,
                iou_threshold: params.iou_threshold,
            },
            policy: PolicySettings {
                required: labels.clone(),
                labels,
            },
            speech: SpeechSettings {
                enabled: true,
                language: Language::default(),
            },
            font: None,
        }
    }
}

/// Values given on the command line. They win over the file and the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub language: Option<Language>,
    pub speech_enabled: Option<bool>,
    pub required: Option<Vec<String>>,
}

impl CliOverrides {
    fn apply(&self, cfg: &mut InspectorConfig) {
        if let Some(language) = self.language {
            cfg.speech.language = language;
        }
        if let Some(enabled) = self.speech_enabled {
            cfg.speech.enabled = enabled;
        }
        if let Some(required) = &self.required {
            cfg.policy.required = required.clone();
        }
    }
}

impl InspectorConfig {
    /// Load from `path`, falling back to `$PPE_INSPECTOR_CONFIG`, then defaults.
    /// Environment overrides and then `cli` are applied before validation.
    pub fn load(path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        Self::load_with_env(path, cli, |key| std::env::var(key).ok())
    }

    fn load_with_env<F>(path: Option<&Path>, cli: &CliOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env_value(CONFIG_ENV).map(PathBuf::from));

        let mut file_cfg = match path {
            Some(path) => read_config_file(&path)?,
            None => ConfigFile::default(),
        };
        // A language from the command line makes the file's value irrelevant
        if cli.language.is_some() {
            if let Some(speech) = file_cfg.speech.as_mut() {
                speech.language = None;
            }
        }

        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env(&env_value, cli.language.is_none())?;
        cli.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw).context("parsing config")?;
        let cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let models = file.models.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let policy = file.policy.unwrap_or_default();
        let speech = file.speech.unwrap_or_default();

        // Without an explicit list every known label is required
        let labels = policy.labels.unwrap_or(defaults.policy.labels);
        let required = policy.required.unwrap_or_else(|| labels.clone());

        let language = match speech.language {
            Some(code) => code.parse()?,
            None => defaults.speech.language,
        };

        Ok(Self {
            models: ModelSettings {
                person: models.person.unwrap_or(defaults.models.person),
                equipment: models.equipment.unwrap_or(defaults.models.equipment),
                input_size: models.input_size.unwrap_or(defaults.models.input_size),
            },
            detection: DetectionSettings {
                person_class: detection
                    .person_class
                    .unwrap_or(defaults.detection.person_class),
                person_confidence: detection
                    .person_confidence
                    .unwrap_or(defaults.detection.person_confidence),
                equipment_confidence: detection
                    .equipment_confidence
                    .unwrap_or(defaults.detection.equipment_confidence),
                iou_threshold: detection
                    .iou_threshold
                    .unwrap_or(defaults.detection.iou_threshold),
            },
            policy: PolicySettings { labels, required },
            speech: SpeechSettings {
                enabled: speech.enabled.unwrap_or(defaults.speech.enabled),
                language,
            },
            font: file.output.and_then(|output| output.font),
        })
    }

    fn apply_env<F>(&mut self, env_value: &F, with_language: bool) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env_value("PPE_PERSON_MODEL") {
            self.models.person = PathBuf::from(path);
        }
        if let Some(path) = env_value("PPE_EQUIPMENT_MODEL") {
            self.models.equipment = PathBuf::from(path);
        }
        if with_language {
            if let Some(language) = env_value("PPE_LANGUAGE") {
                self.speech.language = language
                    .parse()
                    .map_err(|e| anyhow!("PPE_LANGUAGE: {}", e))?;
            }
        }
        if let Some(required) = env_value("PPE_REQUIRED") {
            let parsed = split_csv(&required);
            if !parsed.is_empty() {
                self.policy.required = parsed;
            }
        }
        Ok(())
    }

    /// Check ranges and the policy. Required labels the equipment model
    /// cannot produce only warn.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("person_confidence", self.detection.person_confidence),
            ("equipment_confidence", self.detection.equipment_confidence),
            ("iou_threshold", self.detection.iou_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(anyhow!("{} must be in (0, 1], got {}", name, value));
            }
        }

        let size = self.models.input_size;
        if size == 0 || size % 32 != 0 {
            return Err(anyhow!("input_size must be a non-zero multiple of 32, got {}", size));
        }

        if self.policy.required.iter().all(|label| label.trim().is_empty()) {
            return Err(anyhow!("policy.required must name at least one label"));
        }

        let known: Vec<String> = self
            .policy
            .labels
            .iter()
            .map(|l| crate::compliance::normalize_label(l))
            .collect();
        for label in &self.policy.required {
            if !known.contains(&crate::compliance::normalize_label(label)) {
                log::warn!(
                    "Required label '{}' is not produced by the equipment model; nobody can pass",
                    label
                );
            }
        }
        Ok(())
    }

    pub fn person_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.models.input_size,
            confidence: self.detection.person_confidence,
            iou_threshold: self.detection.iou_threshold,
        }
    }

    pub fn equipment_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.models.input_size,
            confidence: self.detection.equipment_confidence,
            iou_threshold: self.detection.iou_threshold,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

/// Split a comma-separated list, dropping blank entries
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
