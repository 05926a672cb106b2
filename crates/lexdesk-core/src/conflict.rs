use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LexError;

const MIN_SUMMARY_CHARS: usize = 5;

/// Intake for a smart conflict check. Only constructible through [`new`],
/// so an instance has always passed validation.
///
/// [`new`]: ConflictCheckRequest::new
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictCheckRequest {
    client_name: String,
    matter_summary: String,
    opposing_parties: String,
}

impl ConflictCheckRequest {
    pub fn new(
        client_name: &str,
        matter_summary: &str,
        opposing_parties: Option<&str>,
    ) -> Result<Self, LexError> {
        let client_name = client_name.trim();
        if client_name.is_empty() {
            return Err(LexError::Validation("client name is required".into()));
        }
        let matter_summary = matter_summary.trim();
        if matter_summary.chars().count() < MIN_SUMMARY_CHARS {
            return Err(LexError::Validation(format!(
                "matter summary must be at least {MIN_SUMMARY_CHARS} characters"
            )));
        }
        Ok(Self {
            client_name: client_name.to_string(),
            matter_summary: matter_summary.to_string(),
            opposing_parties: opposing_parties.unwrap_or_default().trim().to_string(),
        })
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn matter_summary(&self) -> &str {
        &self.matter_summary
    }

    pub fn opposing_parties(&self) -> &str {
        &self.opposing_parties
    }
}

/// One party name or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parties {
    One(String),
    Many(Vec<String>),
}

impl Parties {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Parties::One(name) => vec![name.as_str()],
            Parties::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(default, alias = "conflict_type", alias = "type")]
    pub conflict_type: String,
    #[serde(alias = "parties_involved", alias = "parties")]
    pub parties_involved: Parties,
    #[serde(default)]
    pub reason: String,
}

/// Read `{conflicts: [...]}` from an edge-function response.
pub fn parse_conflicts(body: Value) -> Result<Vec<Conflict>, LexError> {
    let conflicts = match body {
        Value::Object(mut obj) => obj.remove("conflicts"),
        _ => None,
    };
    match conflicts {
        Some(list @ Value::Array(_)) => serde_json::from_value(list)
            .map_err(|e| LexError::remote(None, format!("malformed conflict entry: {e}"))),
        Some(other) => Err(LexError::remote(
            None,
            format!("conflicts should be a list, got {}", json_kind(&other)),
        )),
        None => Err(LexError::remote(None, "response has no conflicts list")),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
