//! Error classification and recovery-suggestion selection for query
//! validation failures. Pure functions, no I/O.

use once_cell::sync::Lazy;

use crate::models::Suggestion;

const DISALLOWED_TABLE_PATTERNS: [&str; 3] =
    ["disallowed table", "not in the allowed", "table not allowed"];
const SYNTAX_PATTERNS: [&str; 4] = ["syntax error", "parse error", "invalid sql", "incorrect syntax"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCategory {
    DisallowedTables,
    Syntax,
    Generic,
}

fn suggestion(title: &str, prompt: &str) -> Suggestion {
    Suggestion {
        title: title.to_string(),
        prompt: prompt.to_string(),
    }
}

static RECOVERY_SUGGESTIONS: Lazy<Vec<(&'static str, Vec<Suggestion>)>> = Lazy::new(|| {
    vec![
        (
            "sales",
            vec![
                suggestion("Order summary", "Show me a summary of recent orders"),
                suggestion("Top customers", "Who are the top customers by revenue?"),
                suggestion("Invoice totals", "Show invoice totals by month"),
            ],
        ),
        (
            "purchasing",
            vec![
                suggestion("Purchase orders", "Show recent purchase order status"),
                suggestion("Supplier list", "List all suppliers and their categories"),
                suggestion("PO volumes", "Show purchase order volumes by supplier"),
            ],
        ),
        (
            "warehouse",
            vec![
                suggestion("Stock levels", "What are the current stock levels?"),
                suggestion("Low stock", "Show items with low stock quantities"),
                suggestion("Stock groups", "List stock items by group"),
            ],
        ),
        (
            "application",
            vec![
                suggestion("People", "Show people and their roles"),
                suggestion("Cities", "List cities and states in the system"),
                suggestion("Delivery methods", "Show available delivery methods"),
            ],
        ),
    ]
});

static GENERIC_SUGGESTIONS: Lazy<Vec<Suggestion>> = Lazy::new(|| {
    vec![
        suggestion("Browse sales", "Show me recent sales orders"),
        suggestion("Browse inventory", "What stock items are available?"),
        suggestion("Browse suppliers", "List all suppliers"),
    ]
});

pub fn classify_violations(violations: &[String]) -> ViolationCategory {
    let combined = violations.join(" ").to_lowercase();
    if DISALLOWED_TABLE_PATTERNS.iter().any(|p| combined.contains(p)) {
        return ViolationCategory::DisallowedTables;
    }
    if SYNTAX_PATTERNS.iter().any(|p| combined.contains(p)) {
        return ViolationCategory::Syntax;
    }
    ViolationCategory::Generic
}

/// Detects the schema area (e.g. `sales`) from the first fully-qualified
/// table name, returning `None` when it doesn't match a known area.
pub fn detect_area_from_tables(tables: &[String]) -> Option<String> {
    let first = tables.first()?;
    let area = first.split('.').next()?.to_lowercase();
    if first.contains('.') && RECOVERY_SUGGESTIONS.iter().any(|(a, _)| *a == area) {
        Some(area)
    } else {
        None
    }
}

/// Builds a user-friendly error message and 2-3 contextual recovery
/// suggestions from query-validation violations.
pub fn build_error_recovery(violations: &[String], tables_used: &[String]) -> (String, Vec<Suggestion>) {
    let category = classify_violations(violations);
    let violation_summary = violations.join("; ");

    let message = match category {
        ViolationCategory::DisallowedTables => {
            "Your request references data that isn't available in the current database. \
             Try asking about sales, purchasing, warehouse, or application data instead."
                .to_string()
        }
        ViolationCategory::Syntax => "I had trouble constructing a valid query for your request. \
             Could you rephrase your question or be more specific about what data you need?"
            .to_string(),
        ViolationCategory::Generic => format!(
            "I was unable to generate a valid query for your request. \
             Validation issues: {violation_summary}. \
             Please try rephrasing your question or be more specific about what data you need."
        ),
    };

    let suggestions = detect_area_from_tables(tables_used)
        .and_then(|area| RECOVERY_SUGGESTIONS.iter().find(|(a, _)| *a == area))
        .map(|(_, s)| s.clone())
        .unwrap_or_else(|| GENERIC_SUGGESTIONS.clone());

    (message, suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_disallowed_table() {
        let v = vec!["Disallowed table Finance.Ledger".to_string()];
        assert_eq!(classify_violations(&v), ViolationCategory::DisallowedTables);
    }

    #[test]
    fn classifies_syntax() {
        let v = vec!["Syntax error near SELECT".to_string()];
        assert_eq!(classify_violations(&v), ViolationCategory::Syntax);
    }

    #[test]
    fn detects_known_area() {
        let tables = vec!["Sales.Orders".to_string(), "Sales.Customers".to_string()];
        assert_eq!(detect_area_from_tables(&tables), Some("sales".to_string()));
    }

    #[test]
    fn unknown_area_returns_none() {
        let tables = vec!["Finance.Ledger".to_string()];
        assert_eq!(detect_area_from_tables(&tables), None);
    }

    #[test]
    fn falls_back_to_generic_suggestions() {
        let (_, suggestions) = build_error_recovery(&["some error".to_string()], &[]);
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].title, "Browse sales");
    }

    #[test]
    fn picks_area_specific_suggestions() {
        let (_, suggestions) =
            build_error_recovery(&["syntax error".to_string()], &["Warehouse.StockItems".to_string()]);
        assert_eq!(suggestions[0].title, "Stock levels");
    }
}
