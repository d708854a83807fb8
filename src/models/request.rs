use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Carries forward enough of the previous turn's draft for a refinement
/// question ("now just show me the top 5") to be resolved without
/// re-running template/table search from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviousContext {
    Template {
        template_json: String,
        base_params: HashMap<String, serde_json::Value>,
        #[serde(default)]
        overrides: HashMap<String, serde_json::Value>,
    },
    Dynamic {
        previous_sql: String,
        tables_json: String,
        previous_question: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nl2SqlRequest {
    pub user_query: String,
    #[serde(default)]
    pub is_refinement: bool,
    pub previous_context: Option<PreviousContext>,
}
