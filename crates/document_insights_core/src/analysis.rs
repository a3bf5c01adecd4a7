//! crates/document_insights_core/src/analysis.rs
//!
//! The structured result returned by the analysis provider.
//!
//! Only `risk_level` and `required_actions` are interpreted by the core; every other
//! field the provider sends (document type, issuer, dates, amounts, narrative text)
//! is carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// One thing the recipient of a document has to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAction")]
pub struct RequiredAction {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl RequiredAction {
    pub fn new(action: impl Into<String>, deadline: Option<String>) -> Self {
        Self {
            action: action.into(),
            deadline,
        }
    }
}

// Providers return actions either as bare strings or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAction {
    Text(String),
    Detailed {
        #[serde(alias = "text", alias = "description", alias = "task")]
        action: String,
        #[serde(default, alias = "due", alias = "due_date")]
        deadline: Option<String>,
    },
}

impl From<RawAction> for RequiredAction {
    fn from(raw: RawAction) -> Self {
        match raw {
            RawAction::Text(action) => RequiredAction::new(action, None),
            RawAction::Detailed { action, deadline } => RequiredAction::new(action, deadline),
        }
    }
}

/// A structured document analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(
        default,
        alias = "riskLevel",
        deserialize_with = "lenient_risk_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub risk_level: Option<RiskLevel>,

    #[serde(
        default,
        alias = "requiredActions",
        deserialize_with = "lenient_actions"
    )]
    pub required_actions: Vec<RequiredAction>,

    /// Provider fields the core does not interpret.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisParseError {
    #[error("provider returned no content")]
    Empty,
    #[error("provider response is not a JSON object")]
    NotAnObject,
    #[error("provider response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl Analysis {
    /// Parses raw provider output, tolerating a surrounding markdown code fence.
    pub fn from_provider_output(raw: &str) -> Result<Self, AnalysisParseError> {
        let json = strip_code_fence(raw);
        if json.is_empty() {
            return Err(AnalysisParseError::Empty);
        }

        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(AnalysisParseError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn has_required_actions(&self) -> bool {
        !self.required_actions.is_empty()
    }
}

/// Removes a leading ```` ```json ```` / ```` ``` ```` fence and a trailing ```` ``` ````.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

fn lenient_risk_level<'de, D>(deserializer: D) -> Result<Option<RiskLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok()))
}

fn lenient_actions<'de, D>(deserializer: D) -> Result<Vec<RequiredAction>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let actions = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(actions)
}
