//! Deterministic pre-extraction (C6 step 2): resolution methods tried,
//! in priority order, before falling back to the LLM.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{ParamType, ParameterDefinition};

use super::confidence::{DEFAULT_POLICY, DEFAULT_VALUE, EXACT_MATCH, FUZZY_MATCH};

const MIN_STEM_LENGTH: usize = 3;

static HINTED_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:top|last|first|for)\s+(\d+)\b").unwrap());
static ANY_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

pub struct Resolved {
    pub value: Value,
    pub method: String,
}

fn strip_plural(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    if let Some(stem) = lower.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = lower.strip_suffix("es") {
        return stem.to_string();
    }
    if let Some(stem) = lower.strip_suffix('s') {
        return stem.to_string();
    }
    lower
}

fn exact_match(query_lower: &str, allowed_values: &[String]) -> Option<String> {
    allowed_values
        .iter()
        .find(|v| query_lower.contains(&v.to_ascii_lowercase()))
        .cloned()
}

fn fuzzy_match(query_lower: &str, allowed_values: &[String]) -> Option<String> {
    allowed_values
        .iter()
        .find(|v| {
            let stem = strip_plural(v);
            stem.len() >= MIN_STEM_LENGTH && query_lower.contains(&stem)
        })
        .cloned()
}

fn extract_integer(query: &str) -> Option<i64> {
    if let Some(caps) = HINTED_NUMBER_RE.captures(query) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            return Some(n);
        }
    }
    ANY_NUMBER_RE.find(query).and_then(|m| m.as_str().parse().ok())
}

/// Tries exact match, fuzzy match, numeric pattern, default value, then
/// default policy, in that order. Returns `None` if nothing resolves —
/// the parameter must go to the LLM fallback step.
pub fn resolve(definition: &ParameterDefinition, user_query: &str) -> Option<Resolved> {
    let query_lower = user_query.to_ascii_lowercase();
    let allowed = definition.validation.as_ref().and_then(|v| v.allowed_values.as_ref());

    if let Some(allowed) = allowed {
        if let Some(value) = exact_match(&query_lower, allowed) {
            return Some(Resolved {
                value: Value::String(value),
                method: EXACT_MATCH.to_string(),
            });
        }
        if let Some(value) = fuzzy_match(&query_lower, allowed) {
            return Some(Resolved {
                value: Value::String(value),
                method: FUZZY_MATCH.to_string(),
            });
        }
    }

    let param_type = definition
        .validation
        .as_ref()
        .and_then(|v| v.kind.as_deref())
        .and_then(ParamType::parse);
    if param_type == Some(ParamType::Integer) {
        if let Some(n) = extract_integer(user_query) {
            return Some(Resolved {
                value: Value::Number(n.into()),
                method: EXACT_MATCH.to_string(),
            });
        }
    }

    if let Some(default_value) = &definition.default_value {
        return Some(Resolved {
            value: default_value.clone(),
            method: DEFAULT_VALUE.to_string(),
        });
    }

    if let Some(policy) = &definition.default_policy {
        return Some(Resolved {
            value: Value::String(policy.clone()),
            method: DEFAULT_POLICY.to_string(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParameterValidation;

    fn def(name: &str) -> ParameterDefinition {
        ParameterDefinition {
            name: name.to_string(),
            column: None,
            required: true,
            ask_if_missing: false,
            default_value: None,
            default_policy: None,
            confidence_weight: 1.0,
            validation: None,
            allowed_values_source: None,
        }
    }

    #[test]
    fn exact_match_wins_over_fuzzy() {
        let mut d = def("category");
        d.validation = Some(ParameterValidation {
            kind: Some("string".to_string()),
            min: None,
            max: None,
            allowed_values: Some(vec!["Supermarket".to_string(), "Corporate".to_string()]),
            regex: None,
        });
        let r = resolve(&d, "top 5 supermarket customers").unwrap();
        assert_eq!(r.method, EXACT_MATCH);
        assert_eq!(r.value, Value::String("Supermarket".to_string()));
    }

    #[test]
    fn fuzzy_match_strips_plural() {
        let mut d = def("category");
        d.validation = Some(ParameterValidation {
            kind: Some("string".to_string()),
            min: None,
            max: None,
            allowed_values: Some(vec!["Novelty Shop".to_string(), "Corporate".to_string()]),
            regex: None,
        });
        let r = resolve(&d, "show corporates please").unwrap();
        assert_eq!(r.method, FUZZY_MATCH);
        assert_eq!(r.value, Value::String("Corporate".to_string()));
    }

    #[test]
    fn numeric_pattern_prefers_hinted_number() {
        let mut d = def("limit");
        d.validation = Some(ParameterValidation {
            kind: Some("integer".to_string()),
            min: None,
            max: None,
            allowed_values: None,
            regex: None,
        });
        let r = resolve(&d, "top 5 supermarket customers").unwrap();
        assert_eq!(r.value, Value::Number(5.into()));
    }

    #[test]
    fn falls_back_to_default_value_then_policy() {
        let mut d = def("from_date");
        d.default_value = Some(serde_json::json!("2020-01-01"));
        let r = resolve(&d, "no date mentioned").unwrap();
        assert_eq!(r.method, DEFAULT_VALUE);

        let mut d2 = def("from_date");
        d2.default_policy = Some("DATEADD(year, -1, GETDATE())".to_string());
        let r2 = resolve(&d2, "no date mentioned").unwrap();
        assert_eq!(r2.method, DEFAULT_POLICY);
    }

    #[test]
    fn returns_none_when_nothing_resolves() {
        let d = def("weird_param");
        assert!(resolve(&d, "no relevant tokens here").is_none());
    }
}
