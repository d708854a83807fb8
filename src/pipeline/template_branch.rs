//! Template branch (C8): extraction, confidence routing, substitution,
//! validation, and execution for a matched template — fresh or as a
//! refinement of a previous template turn.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::AppError;
use crate::extraction::{self, PriorParam};
use crate::models::{DraftSource, DraftStatus, MissingParameter, Nl2SqlRequest, Nl2SqlResponse, QueryTemplate, SqlDraft};
use crate::utils::{build_error_recovery, substitute_parameters};
use crate::validation::{validate_parameters, validate_query};

use super::rendering::format_defaults_for_display;
use super::{PipelineClients, PipelineOutcome};

const CONFIDENCE_LOW: f64 = 0.60;
const CONFIDENCE_HIGH: f64 = 0.85;

fn merge_overrides(
    base: &HashMap<String, Value>,
    overrides: &HashMap<String, Value>,
) -> HashMap<String, PriorParam> {
    let mut merged = HashMap::new();
    for (k, v) in base {
        merged.insert(k.clone(), PriorParam { value: v.clone(), method: None });
    }
    for (k, v) in overrides {
        merged.insert(k.clone(), PriorParam { value: v.clone(), method: None });
    }
    merged
}

fn rewrite_query_with_overrides(user_query: &str, overrides: &HashMap<String, Value>) -> String {
    if overrides.is_empty() {
        return user_query.to_string();
    }
    let hints: Vec<String> = overrides.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{user_query}\n\nUse these values: {}", hints.join(", "))
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn run_fresh(
    request: &Nl2SqlRequest,
    clients: &PipelineClients,
    template: &QueryTemplate,
    template_match_confidence: f64,
) -> Result<PipelineOutcome, AppError> {
    run_inner(
        request,
        clients,
        template,
        &request.user_query,
        &HashMap::new(),
        template_match_confidence,
    )
    .await
}

/// Resumes a template-sourced draft from a previous turn. Overrides fold
/// into the carried-forward parameters and are also woven into the
/// extraction query text, so a still-unresolved required parameter's LLM
/// fallback can see them too.
pub async fn run_refinement(
    request: &Nl2SqlRequest,
    clients: &PipelineClients,
    template_json: &str,
    base_params: &HashMap<String, Value>,
    overrides: &HashMap<String, Value>,
) -> Result<PipelineOutcome, AppError> {
    let template: QueryTemplate = match serde_json::from_str(template_json) {
        Ok(t) => t,
        Err(_) => {
            return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(
                "Could not resume the previous query template.",
            ))));
        }
    };

    let previously_extracted = merge_overrides(base_params, overrides);
    let rewritten_query = rewrite_query_with_overrides(&request.user_query, overrides);
    // A refinement reuses a template the user already confirmed; there's no
    // fresh vector-search score to carry, so it's treated as fully trusted.
    run_inner(request, clients, &template, &rewritten_query, &previously_extracted, 1.0).await
}

async fn run_inner(
    request: &Nl2SqlRequest,
    clients: &PipelineClients,
    template: &QueryTemplate,
    effective_query: &str,
    previously_extracted: &HashMap<String, PriorParam>,
    template_match_confidence: f64,
) -> Result<PipelineOutcome, AppError> {
    let outcome = extraction::extract_parameters(
        template,
        effective_query,
        previously_extracted,
        &clients.allowed_values,
        clients.llm.as_ref(),
    )
    .await?;

    let mut draft = SqlDraft::new(request.user_query.clone());
    draft.source = Some(DraftSource::Template);
    draft.template_id = Some(template.id.clone());
    draft.template_json = serde_json::to_string(template).ok();
    draft.parameter_definitions = template.parameters.clone();
    draft.extracted_parameters = outcome.extracted_parameters;
    draft.parameter_confidences = outcome.parameter_confidences;
    draft.missing_parameters = outcome.missing_parameters;
    draft.partial_cache_params = outcome.partial_cache_params;
    draft.status = Some(outcome.status);
    draft.clarification_prompt = outcome.clarification_prompt;

    apply_confidence_routing(&mut draft, template);

    if draft.status == Some(DraftStatus::NeedsClarification) {
        return Ok(PipelineOutcome::Clarification(Box::new(super::build_clarification(&draft))));
    }

    if draft.completed_sql.is_none() && !draft.extracted_parameters.is_empty() {
        let substituted = substitute_parameters(&template.sql_template, &draft.extracted_parameters);
        draft.completed_sql = Some(substituted.display_sql);
        draft.exec_sql = Some(substituted.exec_sql);
        draft.exec_params = substituted.exec_params;
    }

    let draft = validate_parameters(draft);
    if draft.has_parameter_violations() {
        return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(
            draft.error.unwrap_or_else(|| "Parameter validation failed".to_string()),
        ))));
    }

    let draft = validate_query(draft, &clients.allowed_tables);
    if draft.has_query_violations() {
        let (message, suggestions) = build_error_recovery(&draft.query_violations, &draft.tables_used);
        let mut response = Nl2SqlResponse::error(message);
        response.error_recovery_suggestions = suggestions;
        return Ok(PipelineOutcome::Response(Box::new(response)));
    }

    let exec_sql = draft.exec_sql.clone().unwrap_or_default();
    let result = clients.sql_executor.execute(&exec_sql, &draft.exec_params).await;
    if !result.success {
        return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(
            result.error.unwrap_or_else(|| "Query execution failed".to_string()),
        ))));
    }

    let defaults_used = format_defaults_for_display(&draft.defaults_used);

    let confirmation_note = confirmation_note(&draft);

    Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse {
        sql_query: draft.completed_sql,
        rows: result.rows,
        columns: result.columns,
        row_count: result.row_count,
        source: Some(DraftSource::Template),
        confidence_score: template_match_confidence,
        defaults_used,
        confirmation_note,
        tables_used: draft.tables_used,
        template_json: draft.template_json,
        template_parameters: draft.extracted_parameters,
        template_defaults: draft.defaults_used,
        ..Default::default()
    })))
}

/// Routes on the lowest-confidence resolved parameter: below 0.60 turns
/// the draft into a clarification, 0.60-0.85 flags it for a confirmation
/// note, 0.85+ proceeds unchanged.
fn apply_confidence_routing(draft: &mut SqlDraft, template: &QueryTemplate) {
    if draft.status != Some(DraftStatus::Success) {
        return;
    }

    let lowest = draft
        .parameter_confidences
        .iter()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(k, v)| (k.clone(), *v));

    let Some((name, conf)) = lowest else { return };

    if conf < CONFIDENCE_LOW {
        let definition = template.parameters.iter().find(|p| p.name == name);
        let current_value = draft.extracted_parameters.get(&name).cloned();
        let guess = current_value.as_ref().map(display_value);
        let alternatives = definition
            .and_then(|d| d.validation.as_ref())
            .and_then(|v| v.allowed_values.clone())
            .map(|values| {
                let guess_str = guess.as_deref().unwrap_or("");
                values.into_iter().filter(|v| v != guess_str).take(5).collect::<Vec<_>>()
            });

        draft.missing_parameters = vec![MissingParameter {
            name: name.clone(),
            best_guess: guess,
            guess_confidence: Some(conf),
            alternatives,
            description: definition
                .map(|d| format!("Please confirm a value for {}", d.name))
                .unwrap_or_default(),
        }];
        draft.status = Some(DraftStatus::NeedsClarification);
    } else if conf < CONFIDENCE_HIGH {
        draft.needs_confirmation = true;
    }
}

fn confirmation_note(draft: &SqlDraft) -> Option<String> {
    if !draft.needs_confirmation {
        return None;
    }

    let assumed: Vec<String> = draft
        .parameter_confidences
        .iter()
        .filter(|(_, conf)| **conf >= CONFIDENCE_LOW && **conf < CONFIDENCE_HIGH)
        .filter_map(|(name, _)| {
            draft
                .extracted_parameters
                .get(name)
                .map(|v| format!("{name}=**{}**", display_value(v)))
        })
        .collect();

    if assumed.is_empty() {
        None
    } else {
        Some(format!("I assumed {} for these results. Want me to adjust?", assumed.join(", ")))
    }
}
