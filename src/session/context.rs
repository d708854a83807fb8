//! Context bookkeeping (C9): folds a finished turn's response back into
//! the session so the next turn can resolve a refinement.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DraftSource, LastQueryContext, Nl2SqlResponse, SessionContext};

const SCHEMA_AREAS: [&str; 4] = ["sales", "purchasing", "warehouse", "application"];

static TABLE_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:FROM|JOIN)\s+([\w.]+)").expect("valid regex"));

fn detect_area(tables: &[String]) -> Option<String> {
    let first = tables.first()?;
    let (schema, _) = first.split_once('.')?;
    let schema = schema.to_ascii_lowercase();
    SCHEMA_AREAS.contains(&schema.as_str()).then_some(schema)
}

/// Extracts `FROM`/`JOIN` table references straight out of SQL text, used
/// as a schema-area fallback when a response carries no structured
/// `tables_used` list (the dynamic branch always populates one, but a
/// template whose SQL was built without table metadata might not).
fn tables_from_sql(sql: &str) -> Vec<String> {
    TABLE_REF_RE.captures_iter(sql).map(|c| c[1].to_string()).collect()
}

/// Updates `context` from a finished turn. A no-op for error responses or
/// responses with no executed SQL — there is nothing worth remembering
/// from those.
pub fn update_context(context: &mut SessionContext, response: &Nl2SqlResponse) {
    if response.error.is_some() {
        return;
    }
    let Some(sql) = response.sql_query.clone() else { return };

    let tables = if !response.tables_used.is_empty() {
        response.tables_used.clone()
    } else {
        tables_from_sql(&sql)
    };
    let schema_area = detect_area(&tables);

    let last_context = match response.source {
        Some(DraftSource::Template) => LastQueryContext::Template {
            template_json: response.template_json.clone().unwrap_or_default(),
            parameters: response.template_parameters.clone(),
            defaults: response.template_defaults.clone(),
            query: sql,
        },
        _ => LastQueryContext::Dynamic {
            sql,
            tables_metadata_json: response.tables_metadata_json.clone().unwrap_or_default(),
            tables,
            question: response.original_question.clone().unwrap_or_default(),
        },
    };

    context.record(schema_area, last_context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ignores_error_responses() {
        let mut context = SessionContext::new();
        let response = Nl2SqlResponse::error("boom");
        update_context(&mut context, &response);
        assert!(context.last_context.is_none());
    }

    #[test]
    fn records_template_context_and_area() {
        let mut context = SessionContext::new();
        let response = Nl2SqlResponse {
            sql_query: Some("SELECT * FROM Sales.Orders".to_string()),
            source: Some(DraftSource::Template),
            tables_used: vec!["Sales.Orders".to_string()],
            template_json: Some("{}".to_string()),
            template_parameters: [("region".to_string(), json!("West"))].into_iter().collect(),
            ..Default::default()
        };
        update_context(&mut context, &response);
        assert_eq!(context.current_schema_area.as_deref(), Some("sales"));
        assert!(matches!(context.last_context, Some(LastQueryContext::Template { .. })));
    }

    #[test]
    fn falls_back_to_sql_regex_when_tables_used_is_empty() {
        let mut context = SessionContext::new();
        let response = Nl2SqlResponse {
            sql_query: Some("SELECT * FROM Warehouse.StockItems si JOIN Warehouse.Holdings h ON 1=1".to_string()),
            source: Some(DraftSource::Dynamic),
            ..Default::default()
        };
        update_context(&mut context, &response);
        assert_eq!(context.current_schema_area.as_deref(), Some("warehouse"));
    }

    #[test]
    fn repeated_area_increments_depth() {
        let mut context = SessionContext::new();
        let response = Nl2SqlResponse {
            sql_query: Some("SELECT * FROM Sales.Orders".to_string()),
            source: Some(DraftSource::Dynamic),
            tables_used: vec!["Sales.Orders".to_string()],
            ..Default::default()
        };
        update_context(&mut context, &response);
        update_context(&mut context, &response);
        assert_eq!(context.exploration_depth, 1);
    }
}
