//! Normalization of provider judgements into `AnalysisResult`.
//!
//! Providers are asked for a fixed JSON shape but do not always honor it:
//! counts arrive as keyed breakdowns, text fields arrive as nested objects.
//! Nothing is dropped: breakdowns are summed, structured text is serialized.

use crate::types::{AnalysisResult, Confidence, PromptSpec};
use serde_json::Value;

/// Convert a raw judgement into the fixed result shape for `prompt`.
pub fn normalize_judgement(prompt: &PromptSpec, judgement: &Value) -> AnalysisResult {
    let field = |names: &[&str]| names.iter().find_map(|n| judgement.get(*n));

    let additional_observations = field(&["additional_observations", "additionalObservations"])
        .map(value_to_text)
        .filter(|s| !s.trim().is_empty());

    AnalysisResult {
        prompt_id: prompt.id.clone(),
        prompt_name: prompt.name.clone(),
        matched: field(&["match", "matched"]).is_some_and(value_to_bool),
        count: field(&["count"]).map(normalize_count).unwrap_or(0),
        description: field(&["description"]).map(value_to_text).unwrap_or_default(),
        details: field(&["details"]).map(value_to_text).unwrap_or_default(),
        confidence: field(&["confidence"])
            .map(value_to_confidence)
            .unwrap_or_default(),
        additional_observations,
    }
}

/// Reduce a count to a non-negative scalar, summing every numeric leaf of a breakdown.
pub fn normalize_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_f64().map(non_negative).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(non_negative).unwrap_or(0),
        Value::Object(map) => saturating_sum(map.values()),
        Value::Array(items) => saturating_sum(items.iter()),
        Value::Bool(_) | Value::Null => 0,
    }
}

fn saturating_sum<'a>(values: impl Iterator<Item = &'a Value>) -> u64 {
    values.fold(0u64, |total, v| total.saturating_add(normalize_count(v)))
}

fn non_negative(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 {
        n.round() as u64
    } else {
        0
    }
}

/// Strings pass through; any other value is serialized so it is not lost.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn value_to_confidence(value: &Value) -> Confidence {
    match value {
        Value::String(s) => Confidence::parse(s),
        // Some models answer with a probability instead of a label
        Value::Number(n) => match n.as_f64().unwrap_or(0.0) {
            p if p >= 0.75 => Confidence::High,
            p if p >= 0.4 => Confidence::Medium,
            _ => Confidence::Low,
        },
        _ => Confidence::Low,
    }
}
