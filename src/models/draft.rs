use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::template::ParameterDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Success,
    NeedsClarification,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSource {
    Template,
    Dynamic,
}

/// A missing or low-confidence parameter that the pipeline needs the user
/// to resolve before the draft can proceed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissingParameter {
    pub name: String,
    pub best_guess: Option<String>,
    pub guess_confidence: Option<f64>,
    /// Up to five alternative values (enforced by whoever constructs this).
    pub alternatives: Option<Vec<String>>,
    pub description: String,
}

/// The pipeline's running state for a single turn.
///
/// Progresses extraction -> substitution -> validation -> execution.
/// Every stage returns a new `SqlDraft` (the stages are pure transforms);
/// nothing here is mutated in place except by the stage that owns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlDraft {
    pub status: Option<DraftStatus>,
    pub source: Option<DraftSource>,
    pub user_query: String,

    /// SQL with literals inlined - the form shown to the user and logged.
    /// Also the form the query validator inspects.
    pub completed_sql: Option<String>,
    /// SQL with `?` placeholders, ready for parameterized execution.
    pub exec_sql: Option<String>,
    pub exec_params: Vec<serde_json::Value>,

    pub template_id: Option<String>,
    pub template_json: Option<String>,
    pub parameter_definitions: Vec<ParameterDefinition>,

    pub extracted_parameters: HashMap<String, serde_json::Value>,
    pub parameter_confidences: HashMap<String, f64>,
    pub needs_confirmation: bool,
    pub missing_parameters: Vec<MissingParameter>,
    pub clarification_prompt: Option<String>,

    pub params_validated: bool,
    pub parameter_violations: Vec<String>,
    /// Parameters whose allowed-values list came back truncated by the
    /// allowed-values cache; the parameter validator must not apply a
    /// strict allowed-value check for these.
    pub partial_cache_params: Vec<String>,

    pub query_validated: bool,
    pub query_violations: Vec<String>,
    pub query_warnings: Vec<String>,

    pub tables_used: Vec<String>,
    pub tables_metadata_json: Option<String>,

    pub reasoning: Option<String>,
    /// C7-reported confidence in [0, 1]; unused for template drafts.
    pub confidence: f64,
    pub retry_count: u8,

    pub defaults_used: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
}

impl SqlDraft {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(DraftStatus::Success)
    }

    pub fn has_query_violations(&self) -> bool {
        !self.query_violations.is_empty()
    }

    pub fn has_parameter_violations(&self) -> bool {
        !self.parameter_violations.is_empty()
    }
}
