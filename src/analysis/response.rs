use chrono::Utc;
use serde_json::{Map, Value};

use super::{Analysis, LearningValue};
use crate::error::{Result, TrendingError};

/// Turns raw provider text into a validated [`Analysis`]
///
/// The JSON object may be the whole reply, sit in a fenced code block, or be
/// surrounded by prose. `summary` and a numeric `score` in `[0, 10]` are
/// required; anything else malformed is a validation error too.
pub fn parse_analysis(raw: &str, model: &str) -> Result<Analysis> {
    let object = extract_object(raw)?;
    validate(&object, model)
}

/// Finds the JSON object in a model reply
pub fn extract_object(raw: &str) -> Result<Map<String, Value>> {
    let cleaned = strip_control_chars(raw);
    let candidates = [
        Some(cleaned.trim()),
        fenced_block(&cleaned),
        outer_braces(&cleaned),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            return Ok(map);
        }
    }

    Err(TrendingError::AnalysisValidation(format!(
        "no JSON object found in response ({} chars)",
        raw.chars().count()
    )))
}

fn strip_control_chars(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn validate(object: &Map<String, Value>, model: &str) -> Result<Analysis> {
    let summary = optional_string(object, "summary")?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing required field `summary`"))?;

    let score = match object.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
    .ok_or_else(|| invalid("missing or non-numeric `score`"))?;
    if !(0.0..=10.0).contains(&score) {
        return Err(invalid(&format!("score {} outside [0, 10]", score)));
    }

    let learning_value = match optional_string(object, "learning_value")? {
        Some(value) => value.parse::<LearningValue>()?,
        None => LearningValue::Medium,
    };

    let recommended = match object.get("is_worthwhile").or_else(|| object.get("recommended")) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => true,
            "false" | "no" => false,
            other => return Err(invalid(&format!("is_worthwhile must be a boolean, got {:?}", other))),
        },
        Some(other) => return Err(invalid(&format!("is_worthwhile must be a boolean, got {}", other))),
    };

    Ok(Analysis {
        summary,
        key_features: string_list(object, "key_features")?,
        tech_stack: string_list(object, "tech_stack")?,
        use_cases: string_list(object, "use_cases")?,
        learning_value,
        score: score as f32,
        recommended,
        reason: optional_string(object, "reason")?.unwrap_or_default(),
        model: model.to_string(),
        analyzed_at: Utc::now(),
    })
}

fn optional_string(object: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => Err(invalid(&format!("`{}` must be a string, got {}", field, other))),
    }
}

fn string_list(object: &Map<String, Value>, field: &str) -> Result<Vec<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect()),
        Some(other) => Err(invalid(&format!("`{}` must be a list, got {}", field, other))),
    }
}

fn invalid(message: &str) -> TrendingError {
    TrendingError::AnalysisValidation(message.to_string())
}
