//! Human-readable rendering helpers shared by the pipeline and the
//! session assistant (C9).

use std::collections::HashMap;

use serde_json::Value;

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turns a draft's raw `defaults_used` map into descriptions a user can
/// read without knowing the parameter names — special-cased for the
/// common default shapes, falling back to the raw value otherwise.
pub fn format_defaults_for_display(defaults_used: &HashMap<String, Value>) -> HashMap<String, String> {
    let mut descriptions = HashMap::with_capacity(defaults_used.len());

    for (name, value) in defaults_used {
        let description = match name.as_str() {
            "days" => format!("last {} days", display_value(value)),
            "from_date" if matches!(value, Value::String(s) if s.to_ascii_uppercase().contains("GETDATE()")) => {
                "relative to current date".to_string()
            }
            "limit" | "top" => format!("showing top {} results", display_value(value)),
            "order" | "sort" => format!("sorted {}", display_value(value)),
            _ => display_value(value),
        };
        descriptions.insert(name.clone(), description);
    }

    descriptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn special_cases_known_parameter_names() {
        let mut defaults = HashMap::new();
        defaults.insert("days".to_string(), json!(30));
        defaults.insert("limit".to_string(), json!(10));
        defaults.insert("from_date".to_string(), json!("DATEADD(day, -30, GETDATE())"));
        defaults.insert("region".to_string(), json!("West"));

        let rendered = format_defaults_for_display(&defaults);
        assert_eq!(rendered["days"], "last 30 days");
        assert_eq!(rendered["limit"], "showing top 10 results");
        assert_eq!(rendered["from_date"], "relative to current date");
        assert_eq!(rendered["region"], "West");
    }
}
