use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A paused workflow waiting on a single parameter answer, as stored in
/// the paused-workflow cache (C10). Resuming re-applies the user's
/// answer to `extracted_parameters` and re-enters the pipeline from
/// validation rather than re-running extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub parameter_name: String,
    pub prompt: String,
    #[serde(default)]
    pub allowed_values: Vec<String>,
    pub original_question: String,
    pub template_id: String,
    pub template_json: String,
    pub extracted_parameters: HashMap<String, serde_json::Value>,
}
