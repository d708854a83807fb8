//! Parameter extractor (C6): deterministic pre-extraction, LLM fallback,
//! and confidence scoring for a single matched query template.

pub mod confidence;
mod deterministic;
mod llm;

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::cache::AllowedValuesProvider;
use crate::collaborators::LlmChatClient;
use crate::error::AppError;
use crate::models::{AllowedValuesSource, DraftStatus, MissingParameter, QueryTemplate};

/// A parameter value carried forward from a prior turn — either a
/// refinement override or the previous turn's own resolution, re-applied
/// so it doesn't have to go through extraction again.
#[derive(Debug, Clone)]
pub struct PriorParam {
    pub value: Value,
    pub method: Option<String>,
}

/// Everything C8 needs to assemble a template-sourced [`crate::models::SqlDraft`].
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub status: DraftStatus,
    pub extracted_parameters: HashMap<String, Value>,
    pub parameter_confidences: HashMap<String, f64>,
    pub missing_parameters: Vec<MissingParameter>,
    pub partial_cache_params: Vec<String>,
    pub clarification_prompt: Option<String>,
}

/// Runs C6 end to end against one template: hydrates database-sourced
/// allowed values, resolves as many parameters as possible deterministically,
/// falls back to the LLM for whatever's left, then scores every resolved
/// parameter's confidence.
pub async fn extract_parameters(
    template: &QueryTemplate,
    user_query: &str,
    previously_extracted: &HashMap<String, PriorParam>,
    allowed_values: &AllowedValuesProvider,
    llm: &dyn LlmChatClient,
) -> Result<ExtractionOutcome, AppError> {
    let mut definitions = template.parameters.clone();
    let mut partial_cache_params = Vec::new();

    for definition in definitions.iter_mut() {
        let Some(AllowedValuesSource::Database { table, column }) = definition.allowed_values_source.clone() else {
            continue;
        };
        if let Some(result) = allowed_values.get_allowed_values(&table, &column).await {
            let validation = definition.validation.get_or_insert_with(Default::default);
            validation.allowed_values = Some(result.values);
            if result.is_partial {
                partial_cache_params.push(definition.name.clone());
            }
        }
    }

    let mut extracted: HashMap<String, Value> = HashMap::new();
    let mut methods: HashMap<String, String> = HashMap::new();

    for definition in &definitions {
        if let Some(prior) = previously_extracted.get(&definition.name) {
            extracted.insert(definition.name.clone(), prior.value.clone());
            methods.insert(
                definition.name.clone(),
                prior.method.clone().unwrap_or_else(|| confidence::EXACT_MATCH.to_string()),
            );
            continue;
        }
        if let Some(resolved) = deterministic::resolve(definition, user_query) {
            extracted.insert(definition.name.clone(), resolved.value);
            methods.insert(definition.name.clone(), resolved.method);
        }
    }

    let still_unresolved: Vec<_> = definitions.iter().filter(|d| !extracted.contains_key(&d.name)).collect();
    let any_required_unresolved = still_unresolved.iter().any(|d| d.required);

    let mut clarification_prompt = None;
    let mut llm_missing_hints: HashMap<String, String> = HashMap::new();

    if any_required_unresolved && !still_unresolved.is_empty() {
        info!(template = %template.id, count = still_unresolved.len(), "falling back to LLM for remaining parameters");
        let outcome = llm::resolve_remaining(llm, user_query, template, &still_unresolved).await?;

        for (name, resolution) in outcome.resolved {
            extracted.insert(name.clone(), resolution.value);
            methods.insert(name, resolution.method);
        }
        for missing in outcome.missing {
            if !missing.name.is_empty() {
                llm_missing_hints.insert(missing.name, missing.description);
            }
        }
        clarification_prompt = outcome.clarification_prompt;
    }

    let mut missing_parameters = Vec::new();
    for definition in &definitions {
        if extracted.contains_key(&definition.name) || !definition.required {
            continue;
        }
        let description = llm_missing_hints
            .get(&definition.name)
            .cloned()
            .unwrap_or_else(|| format!("Please provide a value for {}", definition.name));
        missing_parameters.push(MissingParameter {
            name: definition.name.clone(),
            best_guess: None,
            guess_confidence: None,
            alternatives: definition.validation.as_ref().and_then(|v| v.allowed_values.clone()),
            description,
        });
    }

    let mut parameter_confidences = HashMap::new();
    for definition in &definitions {
        if let Some(method) = methods.get(&definition.name) {
            parameter_confidences.insert(
                definition.name.clone(),
                confidence::score(method, definition.confidence_weight()),
            );
        }
    }

    let status = if missing_parameters.is_empty() {
        DraftStatus::Success
    } else {
        DraftStatus::NeedsClarification
    };

    Ok(ExtractionOutcome {
        status,
        extracted_parameters: extracted,
        parameter_confidences,
        missing_parameters,
        partial_cache_params,
        clarification_prompt,
    })
}
