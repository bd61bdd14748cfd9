// Prompt templates and the structured-output schema for the AI provider.

use prevetscan_core::model::{HealthCategory, Severity};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Image analysis
// ---------------------------------------------------------------------------

/// Instruction sent with every analysis photo. Only the category varies.
pub fn analysis_instruction(category: HealthCategory) -> String {
    format!(
        "You are an expert veterinary triage assistant.\n\
         Examine this photo of a pet's {category}. Identify visible health issues, \
         abnormalities or signs of disease.\n\
         \n\
         Also act as a cost forecaster for the owner: explain how addressing this \
         finding at its current stage compares in cost to waiting until it worsens \
         (for example: a cleaning now at $0-$300 versus extraction surgery later at $1200+).\n\
         \n\
         List the likely causes, what a veterinarian will examine, and questions the \
         owner should ask at the appointment. State how urgent a visit is and the \
         concrete next steps.\n\
         \n\
         Be precise, empathetic and realistic. If the photo is unclear or does not show \
         a pet, say so in the observations and set severity to Low or Healthy.",
        category = category.label()
    )
}

/// `responseSchema` constraining the analysis reply to `AnalysisResult`.
pub fn analysis_schema() -> Value {
    let severities: Vec<&str> = Severity::ALL.iter().map(|s| s.as_str()).collect();
    let string_list = |description: &str| {
        json!({
            "type": "ARRAY",
            "items": { "type": "STRING" },
            "description": description,
        })
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "severity": {
                "type": "STRING",
                "enum": severities,
                "description": "Estimated severity of the visible finding."
            },
            "title": {
                "type": "STRING",
                "description": "Short clinical summary of the finding."
            },
            "observations": string_list("Specific visual indicators seen in the photo."),
            "possibleCauses": string_list("Likely causes of the finding."),
            "vetWillExamine": string_list("What a veterinarian will check at the visit."),
            "questionsToAsk": string_list("Questions the owner should ask the vet."),
            "urgency": {
                "type": "STRING",
                "description": "How soon the pet should be seen."
            },
            "nextSteps": {
                "type": "STRING",
                "description": "Actionable advice for the owner."
            },
            "disclaimer": {
                "type": "STRING",
                "description": "Statement that this is AI guidance, not a diagnosis."
            },
            "financialForecast": {
                "type": "STRING",
                "description": "Cost of acting now versus waiting."
            }
        },
        "required": [
            "severity", "title", "observations", "possibleCauses", "vetWillExamine",
            "questionsToAsk", "urgency", "nextSteps", "disclaimer", "financialForecast"
        ]
    })
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Message used when the owner sends only an image.
pub const IMAGE_ONLY_MESSAGE: &str = "Analyze this image.";

/// System instruction for the chat assistant.
pub fn chat_system_instruction() -> &'static str {
    "You are the PreVetScan assistant, an unbiased second opinion for pet owners.\n\
     You have no financial incentive to deny claims or upsell treatments.\n\
     \n\
     You help with:\n\
     1. Symptom triage: assess urgency from descriptions and photos.\n\
     2. Quote auditing: when the owner shares a vet bill or estimate, review each line \
     item, flag vague charges and compare costs with typical regional prices.\n\
     3. Prevention value: always point out the cost of doing nothing.\n\
     \n\
     When asked about treatment, describe the conservative or preventative path, the \
     standard veterinary path, and rough costs for both.\n\
     \n\
     Always make clear that you are an AI and not a replacement for a veterinarian."
}
