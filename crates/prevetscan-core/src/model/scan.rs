// Persisted snapshot of one completed analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, AnalysisResult, HealthCategory, Severity};

/// A stored scan row. Immutable after creation except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub user_id: AccountId,
    #[serde(default)]
    pub pet_id: Option<Uuid>,
    pub category: HealthCategory,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    #[serde(default)]
    pub urgency: String,
    #[serde(default)]
    pub next_steps: String,
    #[serde(default)]
    pub financial_forecast: String,
    #[serde(default)]
    pub disclaimer: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a scan; the BaaS assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScan {
    pub user_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<Uuid>,
    pub category: HealthCategory,
    pub severity: Severity,
    pub title: String,
    pub observations: Vec<String>,
    pub possible_causes: Vec<String>,
    pub urgency: String,
    pub next_steps: String,
    pub financial_forecast: String,
    pub disclaimer: String,
}

impl NewScan {
    pub fn from_analysis(
        user_id: &str,
        pet_id: Option<Uuid>,
        category: HealthCategory,
        analysis: &AnalysisResult,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            pet_id,
            category,
            severity: analysis.severity,
            title: analysis.title.clone(),
            observations: analysis.observations.clone(),
            possible_causes: analysis.possible_causes.clone(),
            urgency: analysis.urgency.clone(),
            next_steps: analysis.next_steps.clone(),
            financial_forecast: analysis.financial_forecast.clone(),
            disclaimer: analysis.disclaimer.clone(),
        }
    }

    /// Materialize the row the BaaS would return for this insert.
    pub fn into_scan(self, id: Uuid, created_at: DateTime<Utc>) -> Scan {
        Scan {
            id,
            user_id: self.user_id,
            pet_id: self.pet_id,
            category: self.category,
            severity: self.severity,
            title: self.title,
            observations: self.observations,
            possible_causes: self.possible_causes,
            urgency: self.urgency,
            next_steps: self.next_steps,
            financial_forecast: self.financial_forecast,
            disclaimer: self.disclaimer,
            created_at,
        }
    }
}
