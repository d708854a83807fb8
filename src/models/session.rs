use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Snapshot of the last turn's draft, kept just long enough to resolve a
/// refinement question on the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LastQueryContext {
    Template {
        template_json: String,
        parameters: HashMap<String, serde_json::Value>,
        defaults: HashMap<String, serde_json::Value>,
        query: String,
    },
    Dynamic {
        sql: String,
        tables_metadata_json: String,
        tables: Vec<String>,
        question: String,
    },
}

/// Per-user conversational state held in the session cache (C10).
///
/// `exploration_depth` tracks how many refinements deep the user is into
/// the current schema area, used to decide when to nudge a broader
/// suggestion instead of another narrow drill-down.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub current_schema_area: Option<String>,
    #[serde(default)]
    pub exploration_depth: u32,
    pub last_context: Option<LastQueryContext>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, schema_area: Option<String>, context: LastQueryContext) {
        if schema_area.is_some() && schema_area == self.current_schema_area {
            self.exploration_depth += 1;
        } else {
            self.exploration_depth = 0;
            self.current_schema_area = schema_area;
        }
        self.last_context = Some(context);
    }
}
