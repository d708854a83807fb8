//! Response rendering (C9): turns a finished `Nl2SqlResponse` into the
//! markdown text and tool-call payload a chat transport can forward.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ClarificationInfo, DraftSource, Nl2SqlResponse, Suggestion};

const MAX_TABLE_ROWS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    pub sql_query: Option<String>,
    pub sql_response: Vec<Value>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub confidence_score: f64,
    pub query_source: Option<DraftSource>,
    pub error: Option<String>,
    pub needs_clarification: bool,
    pub clarification: Option<ClarificationInfo>,
    pub defaults_used: Vec<String>,
    pub suggestions: Vec<Suggestion>,
    pub hidden_columns: Vec<String>,
    pub query_summary: Option<String>,
    pub query_confidence: f64,
    pub error_suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub tool_call_id: String,
    pub args: Value,
    pub result: ToolCallResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedResponse {
    pub text: String,
    pub thread_id: String,
    pub tool_call: ToolCall,
}

fn row_cell(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn markdown_table(columns: &[String], rows: &[Value]) -> String {
    let header = format!("| {} |", columns.join(" | "));
    let separator = format!("|{}|", columns.iter().map(|_| "---").collect::<Vec<_>>().join("|"));
    let body = rows
        .iter()
        .take(MAX_TABLE_ROWS)
        .map(|row| format!("| {} |", columns.iter().map(|c| row_cell(row, c)).collect::<Vec<_>>().join(" | ")))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{header}\n{separator}\n{body}")
}

fn format_response_text(response: &Nl2SqlResponse) -> String {
    if response.needs_clarification {
        if let Some(clarification) = &response.clarification {
            let mut text = format!("**{}**", clarification.prompt);
            if !clarification.allowed_values.is_empty() {
                text.push_str(&format!("\n\nValid options: {}", clarification.allowed_values.join(", ")));
            }
            return text;
        }
    }

    if let Some(error) = &response.error {
        return format!("**Error:** {error}");
    }

    let mut lines = Vec::new();

    if !response.defaults_used.is_empty() {
        let mut descriptions: Vec<&String> = response.defaults_used.values().collect();
        descriptions.sort();
        if descriptions.len() == 1 {
            lines.push(format!("*Using default: {}*", descriptions[0]));
        } else {
            let joined: Vec<String> = descriptions.into_iter().cloned().collect();
            lines.push(format!("*Using defaults: {}*", joined.join(", ")));
        }
    }

    lines.push(format!("**Query Results** ({} rows)", response.row_count));

    if !response.columns.is_empty() && !response.rows.is_empty() {
        lines.push(markdown_table(&response.columns, &response.rows));
    }

    if let Some(sql) = &response.sql_query {
        lines.push(format!("<details><summary>SQL Query</summary>\n\n```sql\n{sql}\n```\n\n</details>"));
    }

    lines.join("\n\n")
}

/// Renders `response` for delivery over chat: markdown body text plus a
/// structured tool-call payload carrying the full result for any client
/// that wants it instead of the prose.
pub fn render_response(response: &Nl2SqlResponse, thread_id: &str) -> RenderedResponse {
    let text = format_response_text(response);

    let mut defaults_used: Vec<String> = response.defaults_used.values().cloned().collect();
    defaults_used.sort();

    RenderedResponse {
        text,
        thread_id: thread_id.to_string(),
        tool_call: ToolCall {
            tool_name: "nl2sql_query".to_string(),
            tool_call_id: format!("nl2sql_{}", Uuid::new_v4()),
            args: Value::Object(Default::default()),
            result: ToolCallResult {
                sql_query: response.sql_query.clone(),
                sql_response: response.rows.clone(),
                columns: response.columns.clone(),
                row_count: response.row_count,
                confidence_score: response.confidence_score,
                query_source: response.query_source.or(response.source),
                error: response.error.clone(),
                needs_clarification: response.needs_clarification,
                clarification: response.clarification.clone(),
                defaults_used,
                suggestions: response.suggestions.clone(),
                hidden_columns: response.hidden_columns.clone(),
                query_summary: response.query_summary.clone(),
                query_confidence: response.query_confidence,
                error_suggestions: response.error_recovery_suggestions.clone(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_error_response() {
        let response = Nl2SqlResponse::error("table not allowed");
        let rendered = render_response(&response, "thread-1");
        assert_eq!(rendered.text, "**Error:** table not allowed");
    }

    #[test]
    fn renders_results_table_and_sql_block() {
        let response = Nl2SqlResponse {
            sql_query: Some("SELECT id FROM Sales.Orders".to_string()),
            columns: vec!["id".to_string()],
            rows: vec![json!({"id": 1}), json!({"id": 2})],
            row_count: 2,
            ..Default::default()
        };
        let rendered = render_response(&response, "thread-1");
        assert!(rendered.text.contains("**Query Results** (2 rows)"));
        assert!(rendered.text.contains("| id |"));
        assert!(rendered.text.contains("<summary>SQL Query</summary>"));
    }

    #[test]
    fn renders_singular_default_note() {
        let mut response = Nl2SqlResponse { row_count: 5, ..Default::default() };
        response.defaults_used.insert("days".to_string(), "last 30 days".to_string());
        let rendered = render_response(&response, "thread-1");
        assert!(rendered.text.starts_with("*Using default: last 30 days*"));
    }

    #[test]
    fn clarification_response_lists_options() {
        let response = Nl2SqlResponse {
            needs_clarification: true,
            clarification: Some(ClarificationInfo {
                request_id: "req-1".to_string(),
                parameter_name: "region".to_string(),
                prompt: "Which region?".to_string(),
                allowed_values: vec!["West".to_string(), "East".to_string()],
            }),
            ..Default::default()
        };
        let rendered = render_response(&response, "thread-1");
        assert!(rendered.text.contains("**Which region?**"));
        assert!(rendered.text.contains("Valid options: West, East"));
    }
}
