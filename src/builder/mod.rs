//! Query builder (C7): LLM-driven dynamic SQL generation from table
//! metadata, used when no template matches well enough.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::collaborators::LlmChatClient;
use crate::error::AppError;
use crate::models::TableMetadata;

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{[^{}]*\}").unwrap());

#[derive(Debug, Serialize)]
struct ColumnForPrompt<'a> {
    name: &'a str,
    description: &'a str,
    data_type: &'a Option<String>,
    is_primary_key: bool,
    is_foreign_key: bool,
}

#[derive(Debug, Serialize)]
struct TableForPrompt<'a> {
    table: &'a str,
    description: &'a str,
    columns: Vec<ColumnForPrompt<'a>>,
}

fn build_prompt(user_query: &str, tables: &[TableMetadata]) -> String {
    let tables_for_prompt: Vec<TableForPrompt> = tables
        .iter()
        .map(|t| TableForPrompt {
            table: &t.qualified_name,
            description: &t.description,
            columns: t
                .columns
                .iter()
                .map(|c| ColumnForPrompt {
                    name: &c.name,
                    description: &c.description,
                    data_type: &c.data_type,
                    is_primary_key: c.is_primary_key,
                    is_foreign_key: c.is_foreign_key,
                })
                .collect(),
        })
        .collect();

    format!(
        "Generate a SQL query to answer the following user question.\n\n\
## User Question\n{user_query}\n\n\
## Available Tables\n{}\n\n\
Analyze the user question and generate a valid SQL SELECT query using only the tables and columns listed above.\n\
Respond with a single JSON object of shape {{\"status\": \"success\"|\"error\", \"completed_sql\": \"...\", \
\"tables_used\": [\"Schema.Table\", ...], \"confidence\": 0.0-1.0, \"reasoning\": \"...\", \"error\": \"...\"}}.",
        serde_json::to_string_pretty(&tables_for_prompt).unwrap_or_default(),
    )
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawBuilderResponse {
    #[serde(default)]
    status: String,
    completed_sql: Option<String>,
    #[serde(default)]
    tables_used: Vec<String>,
    #[serde(default)]
    confidence: Value,
    reasoning: Option<String>,
    error: Option<String>,
}

fn parse_llm_response(text: &str) -> RawBuilderResponse {
    let trimmed = text.trim();

    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return parsed;
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            if let Ok(parsed) = serde_json::from_str(after[..end].trim()) {
                return parsed;
            }
        }
    }

    if let Some(m) = JSON_OBJECT_RE.find(trimmed) {
        if let Ok(parsed) = serde_json::from_str(m.as_str()) {
            return parsed;
        }
    }

    let preview: String = trimmed.chars().take(200).collect();
    warn!(response = %preview, "failed to parse query builder response");
    RawBuilderResponse {
        status: "error".to_string(),
        error: Some(format!("failed to parse LLM response: {preview}")),
        ..Default::default()
    }
}

fn clamp_confidence(raw: &Value) -> f64 {
    match raw.as_f64() {
        Some(n) if n.is_finite() => n.clamp(0.0, 1.0),
        _ => 0.5,
    }
}

/// C7's output — everything C8 needs to populate onto a dynamic
/// [`crate::models::SqlDraft`].
#[derive(Debug, Clone)]
pub struct DynamicBuildResult {
    pub status_success: bool,
    pub completed_sql: Option<String>,
    pub tables_used: Vec<String>,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub error: Option<String>,
}

/// Builds a dynamic SQL draft from a user question and candidate tables.
/// Carries the serialized table metadata separately (the caller attaches
/// it to the draft) so a later refinement can re-use it without another
/// table search.
pub async fn build_query(
    llm: &dyn LlmChatClient,
    user_query: &str,
    tables: &[TableMetadata],
    retry_count: u8,
) -> Result<DynamicBuildResult, AppError> {
    info!(table_count = tables.len(), retry_count, "building dynamic query");
    let prompt = build_prompt(user_query, tables);
    let response_text = llm.run(&prompt, None).await?;
    let parsed = parse_llm_response(&response_text);

    if parsed.status == "success" {
        Ok(DynamicBuildResult {
            status_success: true,
            completed_sql: parsed.completed_sql,
            tables_used: parsed.tables_used,
            confidence: clamp_confidence(&parsed.confidence),
            reasoning: parsed.reasoning,
            error: None,
        })
    } else {
        Ok(DynamicBuildResult {
            status_success: false,
            completed_sql: None,
            tables_used: parsed.tables_used,
            confidence: 0.0,
            reasoning: None,
            error: Some(parsed.error.unwrap_or_else(|| "Unknown error during query generation".to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm(String);
    #[async_trait]
    impl LlmChatClient for StubLlm {
        async fn run(&self, _prompt: &str, _thread: Option<&str>) -> Result<String, AppError> {
            Ok(self.0.clone())
        }
    }

    fn table() -> TableMetadata {
        TableMetadata {
            id: "t1".to_string(),
            qualified_name: "Sales.Orders".to_string(),
            description: "Orders".to_string(),
            columns: vec![],
            score: 0.5,
        }
    }

    #[tokio::test]
    async fn clamps_out_of_range_confidence() {
        let llm = StubLlm(r#"{"status":"success","completed_sql":"SELECT 1","confidence":5.0}"#.to_string());
        let result = build_query(&llm, "question", &[table()], 0).await.unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn defaults_confidence_when_non_numeric() {
        let llm = StubLlm(r#"{"status":"success","completed_sql":"SELECT 1","confidence":"high"}"#.to_string());
        let result = build_query(&llm, "question", &[table()], 0).await.unwrap();
        assert_eq!(result.confidence, 0.5);
    }

    #[tokio::test]
    async fn error_status_carries_message() {
        let llm = StubLlm(r#"{"status":"error","error":"no usable tables"}"#.to_string());
        let result = build_query(&llm, "question", &[table()], 0).await.unwrap();
        assert!(!result.status_success);
        assert_eq!(result.error.as_deref(), Some("no usable tables"));
    }
}
