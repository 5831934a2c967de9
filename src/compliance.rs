use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// PPE labels a person must be wearing to pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompliancePolicy {
    required: Vec<String>,
}

/// Outcome of checking one person against a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub passed: bool,
    pub detected: BTreeSet<String>,
    /// Required labels that were not detected, in policy order
    pub missing: Vec<String>,
}

pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

impl CompliancePolicy {
    /// Labels are normalised; repeats keep their first position.
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let required = required
            .into_iter()
            .map(|label| normalize_label(label.as_ref()))
            .filter(|label| !label.is_empty() && seen.insert(label.clone()))
            .collect();
        Self { required }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// A person passes iff every required label is among the detected ones.
    pub fn evaluate<I, S>(&self, detected_labels: I) -> Verdict
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let detected: BTreeSet<String> = detected_labels
            .into_iter()
            .map(|label| normalize_label(label.as_ref()))
            .filter(|label| !label.is_empty())
            .collect();

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|label| !detected.contains(*label))
            .cloned()
            .collect();

        Verdict {
            passed: missing.is_empty(),
            detected,
            missing,
        }
    }
}

/// Language used for messages, the report and speech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// Code understood by the speech service
    pub fn code(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }

    pub fn verdict_message(&self, verdict: &Verdict) -> String {
        let missing = verdict.missing.join(", ");
        match (self, verdict.passed) {
            (Language::Es, true) => "¡Estás listo para trabajar compañero!".to_string(),
            (Language::Es, false) => format!(
                "Lo siento compañero, no estás listo para trabajar. Te falta: {}.",
                missing
            ),
            (Language::En, true) => "You are ready to work, partner!".to_string(),
            (Language::En, false) => format!(
                "Sorry partner, you are not ready to work. You are missing: {}.",
                missing
            ),
        }
    }

    pub fn no_persons_message(&self) -> &'static str {
        match self {
            Language::Es => "No se detectaron personas en la imagen.",
            Language::En => "No people were detected in the image.",
        }
    }

    pub fn page_title(&self) -> &'static str {
        match self {
            Language::Es => "Evaluador PPE Inteligente",
            Language::En => "Smart PPE Inspector",
        }
    }

    pub fn original_image_heading(&self) -> &'static str {
        match self {
            Language::Es => "Imagen Original",
            Language::En => "Original Image",
        }
    }

    pub fn persons_detected(&self, count: usize) -> String {
        match self {
            Language::Es => format!("Personas detectadas: {}", count),
            Language::En => format!("Persons detected: {}", count),
        }
    }

    pub fn person_heading(&self, index: usize) -> String {
        match self {
            Language::Es => format!("Persona {}", index),
            Language::En => format!("Person {}", index),
        }
    }

    pub fn detected_items(&self, labels: &[String]) -> String {
        let items = if labels.is_empty() {
            "-".to_string()
        } else {
            labels.join(", ")
        };
        match self {
            Language::Es => format!("Elementos detectados: {}", items),
            Language::En => format!("Detected items: {}", items),
        }
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "es" | "spanish" | "español" => Ok(Language::Es),
            "en" | "english" => Ok(Language::En),
            other => anyhow::bail!("unsupported language '{}': expected 'es' or 'en'", other),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
