//! Pure parameter substitution for `%{{name}}%` SQL templates.
//!
//! No external dependencies beyond `regex`/`once_cell`, so this is
//! unit-testable without mocking anything.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SQL_FUNC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[A-Z_]+\s*\(").unwrap());
static TOP_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bTOP\s+\?").unwrap());

const SQL_KEYWORDS: [&str; 3] = ["ASC", "DESC", "NULL"];

/// Result of substitution, separating the human-readable form from the
/// one actually sent to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedQuery {
    /// SQL with literal values inlined — for logging and UI display.
    pub display_sql: String,
    /// SQL with `?` placeholders for parameterized execution.
    pub exec_sql: String,
    /// Ordered values matching the `?` placeholders in `exec_sql`.
    pub exec_params: Vec<Value>,
}

/// Substitutes `%{{name}}%` tokens, using `?` placeholders where safe.
///
/// SQL keywords (`ASC`/`DESC`/`NULL`) and values containing a SQL function
/// call (e.g. `DATEADD(...)`) are inlined directly in both SQL strings —
/// they cannot be represented as bind parameters. Every other value is
/// bound positionally.
pub fn substitute_parameters(sql_template: &str, params: &HashMap<String, Value>) -> ParameterizedQuery {
    let mut display = sql_template.to_string();
    let mut executed = sql_template.to_string();
    let mut ordered_params = Vec::new();

    for (name, value) in params {
        let token = format!("%{{{{{name}}}}}%", name = name);
        if !display.contains(&token) {
            continue;
        }

        match value {
            Value::Null => {
                display = display.replace(&token, "NULL");
                executed = executed.replace(&token, "NULL");
            }
            Value::Bool(b) => {
                let int_val = if *b { 1 } else { 0 };
                display = display.replace(&token, &int_val.to_string());
                executed = executed.replace(&token, "?");
                ordered_params.push(Value::from(int_val));
            }
            Value::String(s) if SQL_KEYWORDS.contains(&s.to_ascii_uppercase().as_str()) => {
                let upper = s.to_ascii_uppercase();
                display = display.replace(&token, &upper);
                executed = executed.replace(&token, &upper);
            }
            Value::String(s) if SQL_FUNC_RE.is_match(s) => {
                display = display.replace(&token, s);
                executed = executed.replace(&token, s);
            }
            Value::Number(n) => {
                display = display.replace(&token, &n.to_string());
                executed = executed.replace(&token, "?");
                ordered_params.push(value.clone());
            }
            Value::String(s) => {
                let quoted_token = format!("'{token}'");
                if executed.contains(&quoted_token) {
                    display = display.replace(&quoted_token, &format!("'{s}'"));
                    executed = executed.replace(&quoted_token, "?");
                } else {
                    display = display.replace(&token, s);
                    executed = executed.replace(&token, "?");
                }
                ordered_params.push(value.clone());
            }
            other => {
                display = display.replace(&token, &other.to_string());
                executed = executed.replace(&token, "?");
                ordered_params.push(value.clone());
            }
        }
    }

    // SQL Server-style dialects require parentheses around a parameterized
    // TOP value: `TOP (?)` not `TOP ?`.
    let executed = TOP_PARAM_RE.replace_all(&executed, "TOP (?)").into_owned();

    ParameterizedQuery {
        display_sql: display,
        exec_sql: executed,
        exec_params: ordered_params,
    }
}
