use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// End-of-session performance summary, regenerated on demand and never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterviewSummary {
    pub final_score: i64,
    pub strengths: String,
    pub improvements: String,
    pub resources: String,
}

impl InterviewSummary {
    /// The zero-score summary produced when generation fails; the error
    /// description lands in `improvements` so the screen still has
    /// something to show.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            improvements: description.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum SummaryParseError {
    #[error("invalid summary JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("summary response is not a JSON object")]
    NotAnObject,
}

/// Parses the model's summary payload.
///
/// The model is asked for exactly four keys but is not reliable about the
/// shape of the text fields: each of them arrives either as a plain string
/// or as an array of strings. Arrays are flattened into a bulleted string.
/// Unknown keys are ignored, missing keys default to `0` / `""`, and the
/// score is clamped to the 0-100 range the UI renders.
pub fn parse_summary(json_text: &str) -> Result<InterviewSummary, SummaryParseError> {
    let value: Value = serde_json::from_str(json_text)?;
    let object = value.as_object().ok_or(SummaryParseError::NotAnObject)?;

    let final_score = object
        .get("finalScore")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        .clamp(0, 100);

    Ok(InterviewSummary {
        final_score,
        strengths: text_field(object.get("areasOfStrength")),
        improvements: text_field(object.get("areasToImprove")),
        resources: text_field(object.get("suggestedResources")),
    })
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
