//! Dynamic branch (C8): table search plus LLM-generated SQL when no
//! template matches well enough, plus its refinement variant.

use crate::builder::build_query;
use crate::error::AppError;
use crate::models::{DraftSource, DraftStatus, Nl2SqlRequest, Nl2SqlResponse, SqlDraft, TableMetadata};
use crate::utils::{build_error_recovery, refine_columns, DEFAULT_MAX_DISPLAY_COLUMNS};
use crate::validation::validate_query;

use super::{PipelineClients, PipelineOutcome};

const MAX_RETRIES: u8 = 1;

pub async fn run_fresh(request: &Nl2SqlRequest, clients: &PipelineClients) -> Result<PipelineOutcome, AppError> {
    let table_result = clients.table_search.search(&request.user_query).await?;
    if !table_result.has_matches {
        return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(
            "I couldn't find a matching query pattern or relevant tables for your request.",
        ))));
    }

    run_with_tables(request, clients, &request.user_query, table_result.tables, true).await
}

/// Resumes a dynamic-sourced draft from a previous turn. Prefers the
/// tables carried forward from the prior turn over a fresh table search,
/// and bypasses the confidence gate — a refinement of an already-accepted
/// query doesn't need re-confirming.
pub async fn run_refinement(
    request: &Nl2SqlRequest,
    clients: &PipelineClients,
    previous_sql: &str,
    tables_json: &str,
    previous_question: &str,
) -> Result<PipelineOutcome, AppError> {
    let carried: Vec<TableMetadata> = serde_json::from_str(tables_json).unwrap_or_default();
    let tables = if carried.is_empty() {
        clients.table_search.search(&request.user_query).await?.tables
    } else {
        carried
    };

    let enriched_query = format!(
        "Modify this previous query based on the user's request.\n\n\
Previous question: {previous_question}\nPrevious SQL: {previous_sql}\n\n\
User's refinement request: {}",
        request.user_query
    );

    run_with_tables(request, clients, &enriched_query, tables, false).await
}

async fn run_with_tables(
    request: &Nl2SqlRequest,
    clients: &PipelineClients,
    effective_query: &str,
    tables: Vec<TableMetadata>,
    apply_confidence_gate: bool,
) -> Result<PipelineOutcome, AppError> {
    let mut retry_count = 0;
    let mut rejection_note: Option<String> = None;

    loop {
        let query_for_builder = match &rejection_note {
            Some(note) => format!(
                "{effective_query}\n\n[IMPORTANT: Your previous query was rejected for validation errors: {note}]"
            ),
            None => effective_query.to_string(),
        };

        let built = build_query(clients.llm.as_ref(), &query_for_builder, &tables, retry_count).await?;

        if !built.status_success {
            return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(
                built.error.unwrap_or_else(|| "Unable to generate a dynamic query".to_string()),
            ))));
        }

        let mut draft = SqlDraft::new(request.user_query.clone());
        draft.source = Some(DraftSource::Dynamic);
        draft.status = Some(DraftStatus::Success);
        draft.completed_sql = built.completed_sql.clone();
        draft.tables_used = built.tables_used;
        draft.confidence = built.confidence;
        draft.reasoning = built.reasoning;
        draft.tables_metadata_json = serde_json::to_string(&tables).ok();
        draft.retry_count = retry_count;

        let validated = validate_query(draft, &clients.allowed_tables);
        if validated.has_query_violations() {
            if retry_count < MAX_RETRIES {
                retry_count += 1;
                rejection_note = Some(validated.query_violations.join("; "));
                continue;
            }
            let (message, suggestions) = build_error_recovery(&validated.query_violations, &validated.tables_used);
            let mut response = Nl2SqlResponse::error(message);
            response.error_recovery_suggestions = suggestions;
            return Ok(PipelineOutcome::Response(Box::new(response)));
        }

        if apply_confidence_gate && validated.confidence < clients.thresholds.dynamic_confidence_gate {
            let preview: String = validated.completed_sql.as_deref().unwrap_or("").chars().take(150).collect();
            let summary = validated.reasoning.clone().unwrap_or_else(|| format!("Execute: {preview}"));
            return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse {
                needs_clarification: true,
                query_summary: Some(summary),
                query_confidence: validated.confidence,
                query_source: Some(DraftSource::Dynamic),
                tables_metadata_json: validated.tables_metadata_json.clone(),
                original_question: Some(validated.user_query.clone()),
                ..Default::default()
            })));
        }

        let sql = validated.completed_sql.clone().unwrap_or_default();
        let result = clients.sql_executor.execute(&sql, &[]).await;
        if !result.success {
            return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(
                result.error.unwrap_or_else(|| "Query execution failed".to_string()),
            ))));
        }

        let refined =
            refine_columns(&result.columns, &result.rows, &request.user_query, &sql, DEFAULT_MAX_DISPLAY_COLUMNS);

        return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse {
            sql_query: validated.completed_sql,
            rows: refined.rows,
            columns: refined.columns,
            hidden_columns: refined.hidden_columns,
            row_count: result.row_count,
            source: Some(DraftSource::Dynamic),
            confidence_score: validated.confidence,
            tables_used: validated.tables_used,
            tables_metadata_json: validated.tables_metadata_json,
            ..Default::default()
        })));
    }
}
