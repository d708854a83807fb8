//! Parameter validation (type, range, regex, allowed-value checks).
//!
//! Pure and framework-free: takes a [`SqlDraft`], returns a new one.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{DraftStatus, ParameterDefinition, ParameterValidation, SqlDraft};

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?;
    for fmt in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_hms_opt(0, 0, 0).unwrap());
        }
    }
    None
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn validate_integer(value: &Value, validation: &ParameterValidation, name: &str) -> Vec<String> {
    let mut violations = Vec::new();

    let as_int = match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => n.as_i64(),
        Value::Number(n) => n.as_f64().and_then(|f| {
            if f.fract() == 0.0 {
                Some(f as i64)
            } else {
                None
            }
        }),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };

    let int_val = match as_int {
        Some(v) => v,
        None => {
            if matches!(value, Value::Number(n) if n.as_f64().is_some()) {
                violations.push(format!(
                    "Parameter '{name}': expected integer, got float with decimal"
                ));
            } else {
                violations.push(format!("Parameter '{name}': expected integer, got '{value}'"));
            }
            return violations;
        }
    };

    if let Some(min) = validation.min.as_ref().and_then(as_f64) {
        if (int_val as f64) < min {
            violations.push(format!("Parameter '{name}': value {int_val} is below minimum {min}"));
        }
    }
    if let Some(max) = validation.max.as_ref().and_then(as_f64) {
        if (int_val as f64) > max {
            violations.push(format!("Parameter '{name}': value {int_val} exceeds maximum {max}"));
        }
    }

    violations
}

fn validate_string(value: &Value, validation: &ParameterValidation, name: &str) -> Vec<String> {
    let mut violations = Vec::new();
    let str_value = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if let Some(allowed) = &validation.allowed_values {
        let upper_allowed: Vec<String> = allowed.iter().map(|v| v.to_ascii_uppercase()).collect();
        if !upper_allowed.contains(&str_value.to_ascii_uppercase()) {
            let list = allowed
                .iter()
                .map(|v| format!("'{v}'"))
                .collect::<Vec<_>>()
                .join(", ");
            violations.push(format!(
                "Parameter '{name}': value '{str_value}' not in allowed values: {list}"
            ));
        }
    }

    if let Some(pattern) = &validation.regex {
        match Regex::new(&format!("^(?:{pattern})")) {
            Ok(re) => {
                if !re.is_match(&str_value) {
                    violations.push(format!(
                        "Parameter '{name}': value '{str_value}' does not match pattern '{pattern}'"
                    ));
                }
            }
            Err(e) => violations.push(format!("Parameter '{name}': invalid regex pattern: {e}")),
        }
    }

    violations
}

fn validate_date(value: &Value, validation: &ParameterValidation, name: &str) -> Vec<String> {
    let mut violations = Vec::new();

    if let Value::String(s) = value {
        let upper = s.to_ascii_uppercase();
        let sql_functions = ["GETDATE", "DATEADD", "DATEDIFF", "CURRENT_DATE", "NOW"];
        if sql_functions.iter().any(|f| upper.contains(f)) {
            return violations;
        }
    }

    let parsed = match parse_date(value) {
        Some(d) => d,
        None => {
            violations.push(format!("Parameter '{name}': could not parse date value '{value}'"));
            return violations;
        }
    };

    if let Some(min_raw) = &validation.min {
        if let Some(min_date) = parse_date(min_raw) {
            if parsed < min_date {
                violations.push(format!("Parameter '{name}': date {value} is before minimum {min_raw}"));
            }
        }
    }
    if let Some(max_raw) = &validation.max {
        if let Some(max_date) = parse_date(max_raw) {
            if parsed > max_date {
                violations.push(format!("Parameter '{name}': date {value} is after maximum {max_raw}"));
            }
        }
    }

    violations
}

fn validate_float(value: &Value, validation: &ParameterValidation, name: &str) -> Vec<String> {
    let mut violations = Vec::new();

    let float_val = match as_f64(value) {
        Some(v) => v,
        None => {
            violations.push(format!("Parameter '{name}': expected number, got '{value}'"));
            return violations;
        }
    };

    if let Some(min) = validation.min.as_ref().and_then(as_f64) {
        if float_val < min {
            violations.push(format!("Parameter '{name}': value {float_val} is below minimum {min}"));
        }
    }
    if let Some(max) = validation.max.as_ref().and_then(as_f64) {
        if float_val > max {
            violations.push(format!("Parameter '{name}': value {float_val} exceeds maximum {max}"));
        }
    }

    violations
}

fn validate_parameter(name: &str, value: Option<&Value>, definition: &ParameterDefinition) -> Vec<String> {
    if definition.required && value.is_none() {
        if !definition.ask_if_missing {
            return vec![format!("Parameter '{name}': required value is missing")];
        }
        return Vec::new();
    }

    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => return Vec::new(),
    };

    let validation = match &definition.validation {
        Some(v) => v,
        None => return Vec::new(),
    };

    let val_type = validation.kind.as_deref().unwrap_or("").to_ascii_lowercase();
    match val_type.as_str() {
        "integer" => validate_integer(value, validation, name),
        "string" => validate_string(value, validation, name),
        "date" => validate_date(value, validation, name),
        "float" | "decimal" | "number" => validate_float(value, validation, name),
        other => {
            warn!(param = name, kind = other, "unknown validation type for parameter");
            Vec::new()
        }
    }
}

/// Validates a single candidate value against its parameter definition.
/// Used by the extractor (C6) to re-check LLM-supplied values before
/// scoring them `llm_validated` vs. `llm_failed_validation`.
pub fn validate_single(name: &str, value: &Value, definition: &ParameterDefinition) -> Vec<String> {
    validate_parameter(name, Some(value), definition)
}

/// Validates every extracted parameter against its definition, plus
/// reports any required parameter that's entirely missing.
pub fn validate_all_parameters(
    extracted_parameters: &HashMap<String, Value>,
    parameter_definitions: &[ParameterDefinition],
) -> (bool, Vec<String>) {
    let mut violations = Vec::new();
    let def_lookup: HashMap<&str, &ParameterDefinition> =
        parameter_definitions.iter().map(|d| (d.name.as_str(), d)).collect();

    for (name, value) in extracted_parameters {
        let Some(definition) = def_lookup.get(name.as_str()) else {
            warn!(param = name, "extracted parameter not found in definitions");
            continue;
        };
        violations.extend(validate_parameter(name, Some(value), definition));
    }

    let provided: HashSet<&str> = extracted_parameters.keys().map(|s| s.as_str()).collect();
    for definition in parameter_definitions {
        if definition.required
            && !provided.contains(definition.name.as_str())
            && definition.default_value.is_none()
            && !definition.ask_if_missing
        {
            violations.push(format!("Parameter '{}': required but not provided", definition.name));
        }
    }

    (violations.is_empty(), violations)
}

/// Validates all parameters in a draft, skipping allowed-value checks for
/// parameters whose allowed-values cache came back partial (it may not
/// contain the user's actual value).
pub fn validate_parameters(mut draft: SqlDraft) -> SqlDraft {
    if draft.parameter_definitions.is_empty() {
        info!("no parameter definitions provided, skipping validation");
        draft.params_validated = true;
        return draft;
    }

    let partial: HashSet<&str> = draft.partial_cache_params.iter().map(|s| s.as_str()).collect();
    let mut saved_allowed: HashMap<String, Option<Vec<String>>> = HashMap::new();
    let mut definitions = draft.parameter_definitions.clone();
    for pdef in definitions.iter_mut() {
        if partial.contains(pdef.name.as_str()) {
            if let Some(validation) = pdef.validation.as_mut() {
                saved_allowed.insert(pdef.name.clone(), validation.allowed_values.take());
            }
        }
    }

    let (is_valid, violations) = validate_all_parameters(&draft.extracted_parameters, &definitions);

    for pdef in definitions.iter_mut() {
        if let Some(restored) = saved_allowed.remove(&pdef.name) {
            if let Some(validation) = pdef.validation.as_mut() {
                validation.allowed_values = restored;
            }
        }
    }

    if is_valid {
        info!("all parameters validated successfully");
        draft.params_validated = true;
        draft.parameter_violations = Vec::new();
    } else {
        warn!(?violations, "parameter validation failed");
        draft.status = Some(DraftStatus::Error);
        draft.error = Some(format!("Parameter validation failed: {}", violations.join("; ")));
        draft.parameter_violations = violations;
    }

    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamType;
    use serde_json::json;

    fn int_def(name: &str, min: Option<i64>, max: Option<i64>) -> ParameterDefinition {
        ParameterDefinition {
            name: name.to_string(),
            column: None,
            required: false,
            ask_if_missing: false,
            default_value: None,
            default_policy: None,
            confidence_weight: 1.0,
            validation: Some(ParameterValidation {
                kind: Some("integer".to_string()),
                min: min.map(|v| json!(v)),
                max: max.map(|v| json!(v)),
                allowed_values: None,
                regex: None,
            }),
            allowed_values_source: None,
        }
    }

    #[test]
    fn integer_out_of_range_is_rejected() {
        let def = int_def("limit", Some(1), Some(100));
        let v = validate_parameter("limit", Some(&json!(500)), &def);
        assert_eq!(v.len(), 1);
        assert!(v[0].contains("exceeds maximum"));
    }

    #[test]
    fn integer_float_with_fraction_is_rejected() {
        let def = int_def("limit", None, None);
        let v = validate_parameter("limit", Some(&json!(5.5)), &def);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn missing_required_without_ask_if_missing_is_violation() {
        let mut def = int_def("limit", None, None);
        def.required = true;
        let v = validate_parameter("limit", None, &def);
        assert_eq!(v, vec!["Parameter 'limit': required value is missing"]);
    }

    #[test]
    fn missing_required_with_ask_if_missing_is_not_a_violation() {
        let mut def = int_def("limit", None, None);
        def.required = true;
        def.ask_if_missing = true;
        assert!(validate_parameter("limit", None, &def).is_empty());
    }

    #[test]
    fn allowed_values_is_case_insensitive() {
        let def = ParameterDefinition {
            validation: Some(ParameterValidation {
                kind: Some("string".to_string()),
                min: None,
                max: None,
                allowed_values: Some(vec!["Supermarket".to_string(), "Corporate".to_string()]),
                regex: None,
            }),
            ..int_def("category", None, None)
        };
        assert!(validate_parameter("category", Some(&json!("SUPERMARKET")), &def).is_empty());
        assert_eq!(validate_parameter("category", Some(&json!("Grocery")), &def).len(), 1);
    }

    #[test]
    fn date_sql_function_passes_through() {
        let def = ParameterDefinition {
            validation: Some(ParameterValidation {
                kind: Some("date".to_string()),
                min: None,
                max: None,
                allowed_values: None,
                regex: None,
            }),
            ..int_def("from_date", None, None)
        };
        assert!(validate_parameter("from_date", Some(&json!("DATEADD(day, -30, GETDATE())")), &def).is_empty());
    }

    #[test]
    fn partial_cache_params_skip_allowed_value_check() {
        let def = ParameterDefinition {
            validation: Some(ParameterValidation {
                kind: Some("string".to_string()),
                min: None,
                max: None,
                allowed_values: Some(vec!["A".to_string()]),
                regex: None,
            }),
            ..int_def("category", None, None)
        };
        let mut draft = SqlDraft::new("q");
        draft.parameter_definitions = vec![def];
        draft.extracted_parameters.insert("category".to_string(), json!("B"));
        draft.partial_cache_params = vec!["category".to_string()];

        let result = validate_parameters(draft);
        assert!(result.params_validated);
        assert!(result.parameter_violations.is_empty());
    }

    #[test]
    fn param_type_parse_accepts_synonyms() {
        assert_eq!(ParamType::parse("decimal"), Some(ParamType::Float));
        assert_eq!(ParamType::parse("Number"), Some(ParamType::Float));
        assert_eq!(ParamType::parse("bogus"), None);
    }
}
