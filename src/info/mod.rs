//! Info records produced by the resolver and stored per subscription
//!
//! Field names follow the persisted JSON exactly, so serializing an [`Info`]
//! yields the object written to the store.

mod normalize;

pub use normalize::{parse_model_output, strip_code_fence};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Which kind of guidance to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Cancellation,
    Registration,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Cancellation => "cancellation",
            Mode::Registration => "registration",
        }
    }

    /// JSON key holding the record's URL
    pub fn url_key(&self) -> &'static str {
        match self {
            Mode::Cancellation => "cancellation_url",
            Mode::Registration => "registration_url",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = InfoParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancellation" => Ok(Mode::Cancellation),
            "registration" => Ok(Mode::Registration),
            other => Err(InfoParseError::UnknownMode(other.to_string())),
        }
    }
}

/// Input to the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRequest {
    /// Free text as typed by the user, suffixes like "premium" included
    pub service_name: String,

    pub mode: Mode,

    /// Record to upsert the result into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl InfoRequest {
    pub fn new(service_name: impl Into<String>, mode: Mode) -> Self {
        Self {
            service_name: service_name.into(),
            mode,
            record_id: None,
        }
    }

    #[must_use]
    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

/// One user action; ids are 1-based and dense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: u32,
    pub label: String,
    pub description: String,
}

/// A piece of information the user must have at hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredInfo {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationInfo {
    pub cancellation_url: String,
    pub steps: Vec<Step>,
    pub required_info: Vec<RequiredInfo>,
    pub is_cancellable: bool,
    pub verified: bool,
    #[serde(rename = "debugLogs", default, skip_serializing_if = "Option::is_none")]
    pub debug_logs: Option<Vec<String>>,
}

impl Default for CancellationInfo {
    fn default() -> Self {
        Self {
            cancellation_url: String::new(),
            steps: Vec::new(),
            required_info: Vec::new(),
            // optimistic: most subscriptions can be cancelled somehow
            is_cancellable: true,
            verified: false,
            debug_logs: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub registration_url: String,
    pub has_free_trial: bool,
    pub trial_period: Option<String>,
    pub notes: Option<String>,
    pub verified: bool,
}

/// A resolved record of either kind
///
/// Serializes untagged: the JSON is exactly the inner record. Use
/// [`Info::from_value`] to read one back, since the mode is not encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Info {
    Cancellation(CancellationInfo),
    Registration(RegistrationInfo),
}

impl Info {
    /// Read a stored or model-produced object, filling absent fields with
    /// defaults. `verified` and `debugLogs` are kept as found.
    pub fn from_value(mode: Mode, value: Value) -> Result<Self, InfoParseError> {
        normalize::normalize_value(mode, value)
    }

    pub fn mode(&self) -> Mode {
        match self {
            Info::Cancellation(_) => Mode::Cancellation,
            Info::Registration(_) => Mode::Registration,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Info::Cancellation(info) => &info.cancellation_url,
            Info::Registration(info) => &info.registration_url,
        }
    }

    pub fn verified(&self) -> bool {
        match self {
            Info::Cancellation(info) => info.verified,
            Info::Registration(info) => info.verified,
        }
    }

    pub(crate) fn set_verified(&mut self, verified: bool) {
        match self {
            Info::Cancellation(info) => info.verified = verified,
            Info::Registration(info) => info.verified = verified,
        }
    }

    pub fn as_cancellation(&self) -> Option<&CancellationInfo> {
        match self {
            Info::Cancellation(info) => Some(info),
            Info::Registration(_) => None,
        }
    }

    pub fn as_registration(&self) -> Option<&RegistrationInfo> {
        match self {
            Info::Registration(info) => Some(info),
            Info::Cancellation(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        // Derived Serialize on plain structs of strings, bools, and vecs
        // cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Error, Debug)]
pub enum InfoParseError {
    #[error("Model output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Model output does not match the {mode} schema: {message}")]
    Schema { mode: Mode, message: String },

    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_round_trips_through_strings() {
        assert_eq!("Cancellation".parse::<Mode>().unwrap(), Mode::Cancellation);
        assert_eq!(" registration ".parse::<Mode>().unwrap(), Mode::Registration);
        assert!("refund".parse::<Mode>().is_err());
        assert_eq!(serde_json::to_value(Mode::Registration).unwrap(), json!("registration"));
    }

    #[test]
    fn request_uses_camel_case_keys() {
        let request = InfoRequest::new("hulu", Mode::Cancellation).with_record_id("sub-1");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"serviceName": "hulu", "mode": "cancellation", "recordId": "sub-1"})
        );
    }

    #[test]
    fn cancellation_serializes_without_absent_debug_logs() {
        let info = Info::Cancellation(CancellationInfo::default());
        let value = info.to_value();
        assert_eq!(
            value,
            json!({
                "cancellation_url": "",
                "steps": [],
                "required_info": [],
                "is_cancellable": true,
                "verified": false
            })
        );
    }

    #[test]
    fn registration_serializes_nulls() {
        let info = Info::Registration(RegistrationInfo::default());
        assert_eq!(
            info.to_value(),
            json!({
                "registration_url": "",
                "has_free_trial": false,
                "trial_period": null,
                "notes": null,
                "verified": false
            })
        );
    }
}
