use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::draft::DraftSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationInfo {
    pub request_id: String,
    pub parameter_name: String,
    pub prompt: String,
    #[serde(default)]
    pub allowed_values: Vec<String>,
}

/// Everything a chat turn can render to the user.
///
/// Most fields are optional because a turn can end in one of several
/// terminal shapes: a result set, a clarification question, a confidence
/// confirmation, or an error with recovery suggestions. Only one of
/// those shapes is ever fully populated per response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Nl2SqlResponse {
    pub sql_query: Option<String>,
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub row_count: usize,
    pub source: Option<DraftSource>,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub hidden_columns: Vec<String>,
    #[serde(default)]
    pub defaults_used: HashMap<String, String>,
    pub confirmation_note: Option<String>,

    #[serde(default)]
    pub needs_clarification: bool,
    pub clarification: Option<ClarificationInfo>,

    pub query_summary: Option<String>,
    #[serde(default)]
    pub query_confidence: f64,
    pub query_source: Option<DraftSource>,

    pub error: Option<String>,
    #[serde(default)]
    pub error_recovery_suggestions: Vec<Suggestion>,

    #[serde(default)]
    pub tables_used: Vec<String>,
    pub tables_metadata_json: Option<String>,
    pub original_question: Option<String>,

    /// Template, raw extracted parameters, and raw defaults this response
    /// was built from — carried alongside `defaults_used`'s rendered
    /// strings so a session can resume a template refinement without
    /// re-parsing the SQL or re-running extraction.
    pub template_json: Option<String>,
    #[serde(default)]
    pub template_parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub template_defaults: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl Nl2SqlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}
