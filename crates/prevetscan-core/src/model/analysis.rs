// Health categories, severity labels and the structured analysis payload
// returned by the AI provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ModelError;

// ---------------------------------------------------------------------------
// HealthCategory
// ---------------------------------------------------------------------------

/// Body area the owner photographed. Serialized as the display label the
/// browser shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthCategory {
    #[serde(rename = "Teeth & Gums")]
    Teeth,
    #[serde(rename = "Eyes")]
    Eyes,
    #[serde(rename = "Skin & Coat")]
    Skin,
    #[serde(rename = "Gait & Movement")]
    Gait,
    #[serde(rename = "General")]
    General,
}

impl HealthCategory {
    pub const ALL: [HealthCategory; 5] = [
        HealthCategory::Teeth,
        HealthCategory::Eyes,
        HealthCategory::Skin,
        HealthCategory::Gait,
        HealthCategory::General,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HealthCategory::Teeth => "Teeth & Gums",
            HealthCategory::Eyes => "Eyes",
            HealthCategory::Skin => "Skin & Coat",
            HealthCategory::Gait => "Gait & Movement",
            HealthCategory::General => "General",
        }
    }

    fn key(self) -> &'static str {
        match self {
            HealthCategory::Teeth => "teeth",
            HealthCategory::Eyes => "eyes",
            HealthCategory::Skin => "skin",
            HealthCategory::Gait => "gait",
            HealthCategory::General => "general",
        }
    }
}

impl fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the display label or the short key, case-insensitively.
/// `other` is an alias for `General`.
impl FromStr for HealthCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        if needle.eq_ignore_ascii_case("other") {
            return Ok(HealthCategory::General);
        }
        HealthCategory::ALL
            .into_iter()
            .find(|c| needle.eq_ignore_ascii_case(c.label()) || needle.eq_ignore_ascii_case(c.key()))
            .ok_or_else(|| ModelError::UnknownCategory(needle.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Healthy,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Healthy,
        Severity::Low,
        Severity::Moderate,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Healthy => "Healthy",
            Severity::Low => "Low",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// Structured triage produced by the AI provider for one photo.
///
/// List fields default to empty so a model response that omits an optional
/// list still parses; the scalar fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    #[serde(default)]
    pub vet_will_examine: Vec<String>,
    #[serde(default)]
    pub questions_to_ask: Vec<String>,
    pub urgency: String,
    pub next_steps: String,
    pub disclaimer: String,
    pub financial_forecast: String,
}
