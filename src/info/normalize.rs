//! Turning raw model text into normalized records
//!
//! Parsing never repairs broken JSON syntax. It only strips a markdown fence
//! the model may have added and fills fields that are absent or null.

use serde::Deserialize;
use serde_json::Value;

use super::{CancellationInfo, Info, InfoParseError, Mode, RegistrationInfo, RequiredInfo, Step};

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````)
///
/// Text without a leading fence is returned trimmed and otherwise untouched.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) up to the first newline
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse model output for `mode` into a normalized record
///
/// `verified` is reset to `false`: only a human edit may verify a record.
pub fn parse_model_output(text: &str, mode: Mode) -> Result<Info, InfoParseError> {
    let body = strip_code_fence(text);
    let value: Value =
        serde_json::from_str(body).map_err(|e| InfoParseError::InvalidJson(e.to_string()))?;

    let mut info = normalize_value(mode, unwrap_singleton_array(value))?;
    info.set_verified(false);
    Ok(info)
}

/// Some models wrap the object in a one-element array despite instructions
fn unwrap_singleton_array(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 && items[0].is_object() => items.remove(0),
        other => other,
    }
}

pub(super) fn normalize_value(mode: Mode, value: Value) -> Result<Info, InfoParseError> {
    if !value.is_object() {
        return Err(InfoParseError::NotAnObject(json_kind(&value)));
    }

    let schema_error = |e: serde_json::Error| InfoParseError::Schema {
        mode,
        message: e.to_string(),
    };

    match mode {
        Mode::Cancellation => {
            let raw: RawCancellation = serde_json::from_value(value).map_err(schema_error)?;
            Ok(Info::Cancellation(raw.into()))
        }
        Mode::Registration => {
            let raw: RawRegistration = serde_json::from_value(value).map_err(schema_error)?;
            Ok(Info::Registration(raw.into()))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Lenient wire shapes
// =============================================================================

#[derive(Deserialize)]
struct RawCancellation {
    cancellation_url: Option<String>,
    steps: Option<Vec<RawStep>>,
    required_info: Option<Vec<RawRequiredInfo>>,
    is_cancellable: Option<bool>,
    verified: Option<bool>,
    #[serde(rename = "debugLogs")]
    debug_logs: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawStep {
    label: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct RawRequiredInfo {
    label: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize)]
struct RawRegistration {
    registration_url: Option<String>,
    has_free_trial: Option<bool>,
    trial_period: Option<String>,
    notes: Option<String>,
    verified: Option<bool>,
}

impl From<RawCancellation> for CancellationInfo {
    fn from(raw: RawCancellation) -> Self {
        let defaults = CancellationInfo::default();

        // Renumber so ids stay 1-based and dense whatever the model emitted
        let steps = raw
            .steps
            .unwrap_or_default()
            .into_iter()
            .map(|s| (clean(s.label), clean(s.description)))
            .filter(|(label, description)| !(label.is_empty() && description.is_empty()))
            .enumerate()
            .map(|(i, (label, description))| Step {
                id: i as u32 + 1,
                label,
                description,
            })
            .collect();

        let required_info = raw
            .required_info
            .unwrap_or_default()
            .into_iter()
            .map(|r| RequiredInfo {
                label: clean(r.label),
                value: clean(r.value),
            })
            .filter(|r| !r.label.is_empty())
            .collect();

        Self {
            cancellation_url: clean(raw.cancellation_url),
            steps,
            required_info,
            is_cancellable: raw.is_cancellable.unwrap_or(defaults.is_cancellable),
            verified: raw.verified.unwrap_or(defaults.verified),
            debug_logs: raw.debug_logs,
        }
    }
}

impl From<RawRegistration> for RegistrationInfo {
    fn from(raw: RawRegistration) -> Self {
        Self {
            registration_url: clean(raw.registration_url),
            has_free_trial: raw.has_free_trial.unwrap_or(false),
            trial_period: non_empty(raw.trial_period),
            notes: non_empty(raw.notes),
            verified: raw.verified.unwrap_or(false),
        }
    }
}

fn clean(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
