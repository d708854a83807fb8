//! LLM fallback extraction (C6 step 3), used only for parameters that
//! survive deterministic pre-extraction unresolved.

use std::collections::HashMap;

use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::collaborators::LlmChatClient;
use crate::error::AppError;
use crate::models::{ParameterDefinition, QueryTemplate};
use crate::validation::validate_single;

use super::confidence::{LLM_FAILED_VALIDATION, LLM_UNVALIDATED, LLM_VALIDATED};

const HISTORICAL_OFFSET_DAYS: i64 = 12 * 365;

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{[^{}]*\}").unwrap());

#[derive(Debug, Serialize)]
struct ParamDescription<'a> {
    name: &'a str,
    required: bool,
    ask_if_missing: bool,
    default_value: &'a Option<Value>,
    validation: &'a Option<crate::models::ParameterValidation>,
}

pub fn build_prompt(user_query: &str, template: &QueryTemplate, remaining: &[&ParameterDefinition]) -> String {
    let adjusted_date = (Utc::now() - ChronoDuration::days(HISTORICAL_OFFSET_DAYS)).format("%Y-%m-%d");
    let params_info: Vec<ParamDescription> = remaining
        .iter()
        .map(|p| ParamDescription {
            name: &p.name,
            required: p.required,
            ask_if_missing: p.ask_if_missing,
            default_value: &p.default_value,
            validation: &p.validation,
        })
        .collect();

    format!(
        "Extract parameters from the following user question to fill the SQL template.\n\n\
## Adjusted Reference Date\n\
{adjusted_date} — use this date as \"today\" for any date-related parameters; the data is historical.\n\n\
## User Question\n{user_query}\n\n\
## SQL Template\n{}\n\n\
## Template Intent\n{}\n\n\
## Template Example Question\n{}\n\n\
## Parameters To Extract\n{}\n\n\
Respond with a single JSON object of shape {{\"status\": \"success\" | \"needs_clarification\" | \"error\", \
\"extracted_parameters\": {{name: value, ...}}, \
\"missing_parameters\": [{{\"name\", \"description\", \"validation_hint\"}}], \
\"clarification_prompt\": \"...\", \"error\": \"...\"}}. Omit fields that don't apply.",
        template.sql_template,
        template.intent,
        template.example_question,
        serde_json::to_string_pretty(&params_info).unwrap_or_default(),
    )
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMissingParameter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub validation_hint: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawLlmExtraction {
    #[serde(default)]
    status: String,
    #[serde(default)]
    extracted_parameters: HashMap<String, Value>,
    #[serde(default)]
    missing_parameters: Vec<RawMissingParameter>,
    #[serde(default)]
    clarification_prompt: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Tolerant JSON extraction: try the raw text, then a fenced ```json
/// block, then a flat-object regex search. Anything still unparseable
/// becomes an `error` outcome rather than propagating a parse failure.
fn parse_llm_response(text: &str) -> RawLlmExtraction {
    let trimmed = text.trim();

    if let Ok(parsed) = serde_json::from_str::<RawLlmExtraction>(trimmed) {
        return parsed;
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            if let Ok(parsed) = serde_json::from_str::<RawLlmExtraction>(after[..end].trim()) {
                return parsed;
            }
        }
    }

    if let Some(m) = JSON_OBJECT_RE.find(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<RawLlmExtraction>(m.as_str()) {
            return parsed;
        }
    }

    let preview: String = trimmed.chars().take(200).collect();
    warn!(response = %preview, "failed to parse LLM extraction response");
    RawLlmExtraction {
        status: "error".to_string(),
        error: Some(format!("failed to parse LLM response: {preview}")),
        ..Default::default()
    }
}

pub struct LlmResolution {
    pub value: Value,
    pub method: String,
}

pub struct LlmOutcome {
    pub resolved: HashMap<String, LlmResolution>,
    pub missing: Vec<RawMissingParameter>,
    pub clarification_prompt: Option<String>,
}

/// Runs the LLM fallback for every still-unresolved parameter, then
/// re-validates each returned value locally to assign its method:
/// `llm_validated` on pass, `llm_failed_validation` on fail (value kept,
/// scored low), `llm_unvalidated` when the parameter carries no rules.
pub async fn resolve_remaining(
    llm: &dyn LlmChatClient,
    user_query: &str,
    template: &QueryTemplate,
    remaining: &[&ParameterDefinition],
) -> Result<LlmOutcome, AppError> {
    let prompt = build_prompt(user_query, template, remaining);
    let response_text = llm.run(&prompt, None).await?;
    let parsed = parse_llm_response(&response_text);

    let mut resolved = HashMap::new();
    for (name, value) in parsed.extracted_parameters {
        let Some(definition) = remaining.iter().find(|d| d.name == name) else {
            continue;
        };
        let method = match &definition.validation {
            Some(_) => {
                let violations = validate_single(&name, &value, definition);
                if violations.is_empty() {
                    LLM_VALIDATED
                } else {
                    LLM_FAILED_VALIDATION
                }
            }
            None => LLM_UNVALIDATED,
        };
        resolved.insert(name, LlmResolution { value, method: method.to_string() });
    }

    Ok(LlmOutcome {
        resolved,
        missing: parsed.missing_parameters,
        clarification_prompt: parsed.clarification_prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_json() {
        let raw = r#"{"status":"success","extracted_parameters":{"limit":5}}"#;
        let parsed = parse_llm_response(raw);
        assert_eq!(parsed.status, "success");
        assert_eq!(parsed.extracted_parameters.get("limit"), Some(&Value::Number(5.into())));
    }

    #[test]
    fn parses_markdown_fenced_json() {
        let raw = "Here you go:\n```json\n{\"status\":\"success\",\"extracted_parameters\":{\"category\":\"Supermarket\"}}\n```\n";
        let parsed = parse_llm_response(raw);
        assert_eq!(parsed.status, "success");
    }

    #[test]
    fn falls_back_to_error_on_garbage() {
        let parsed = parse_llm_response("not json at all");
        assert_eq!(parsed.status, "error");
        assert!(parsed.error.is_some());
    }
}
