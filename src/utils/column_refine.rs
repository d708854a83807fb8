//! Pure column refinement for dynamic query results.
//!
//! Follows the same shape as [`super::substitution`]: a plain result
//! struct and a pure function, no external I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const DEFAULT_MAX_DISPLAY_COLUMNS: usize = 8;
const MIN_STEM_LENGTH: usize = 3;
const SUFFIXES: [&str; 6] = ["name", "id", "date", "count", "number", "code"];

static GROUP_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bGROUP\s+BY\b(.+?)(?:\bHAVING\b|\bORDER\b|\bLIMIT\b|$)").unwrap());
static ORDER_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bORDER\s+BY\b(.+?)(?:\bLIMIT\b|\bOFFSET\b|$)").unwrap());
static AGGREGATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:COUNT|SUM|AVG|MIN|MAX)\s*\(").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRefinementResult {
    /// Visible column names, after stripping empties and capping.
    pub columns: Vec<String>,
    /// Column names hidden by the cap — still present in `rows`.
    pub hidden_columns: Vec<String>,
    pub rows: Vec<Value>,
}

fn is_empty_column(rows: &[Value], col: &str) -> bool {
    rows.iter().all(|row| match row.get(col) {
        None => true,
        Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    })
}

fn word_match(needle: &str, haystack: &str) -> bool {
    if haystack.contains(needle) {
        return true;
    }
    for suffix in SUFFIXES {
        if let Some(stem) = needle.strip_suffix(suffix) {
            if stem.len() >= MIN_STEM_LENGTH && haystack.contains(stem) {
                return true;
            }
        }
    }
    false
}

/// Ranks columns by relevance, lowest tier first: mentioned in the user's
/// question, referenced by GROUP BY/ORDER BY/aggregate clauses, PK- or
/// name-like, then stable positional order.
fn rank_columns(columns: &[String], user_query: &str, sql: &str) -> Vec<String> {
    let user_query_lower = user_query.to_lowercase();

    let mut clause_refs: std::collections::HashSet<String> = std::collections::HashSet::new();
    for pattern in [&*GROUP_BY_RE, &*ORDER_BY_RE] {
        if let Some(caps) = pattern.captures(sql) {
            let clause_text = caps.get(1).map(|m| m.as_str().to_uppercase()).unwrap_or_default();
            for col in columns {
                if clause_text.contains(&col.to_uppercase()) {
                    clause_refs.insert(col.clone());
                }
            }
        }
    }

    let has_aggregates = AGGREGATE_RE.is_match(sql);
    let clause_refs_lower: std::collections::HashSet<String> =
        clause_refs.iter().map(|c| c.to_lowercase()).collect();

    let score = |col: &str, position: usize| -> (u8, usize) {
        let col_lower = col.to_lowercase();
        let bare_col = col_lower.rsplit('.').next().unwrap_or(&col_lower);

        if !bare_col.is_empty() && (user_query_lower.contains(bare_col) || word_match(bare_col, &user_query_lower)) {
            return (0, position);
        }
        if clause_refs.contains(col) {
            return (1, position);
        }
        if has_aggregates && !clause_refs_lower.contains(&col_lower) {
            let col_upper = col.to_uppercase();
            if ["TOTAL", "COUNT", "SUM", "AVG", "MIN", "MAX"]
                .iter()
                .any(|kw| col_upper.contains(kw))
            {
                return (1, position);
            }
        }
        if bare_col.ends_with("id") || bare_col.ends_with("name") || bare_col == "name" {
            return (2, position);
        }
        (3, position)
    };

    let mut scored: Vec<(String, (u8, usize))> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| (col.clone(), score(col, i)))
        .collect();
    scored.sort_by(|a, b| a.1.cmp(&b.1));
    scored.into_iter().map(|(col, _)| col).collect()
}

/// Strips empty columns and caps visible columns with relevance ranking.
///
/// All rows keep every original field; only the `columns` / `hidden_columns`
/// split changes, so a client can still expand hidden columns on demand.
pub fn refine_columns(
    columns: &[String],
    rows: &[Value],
    user_query: &str,
    sql: &str,
    max_cols: usize,
) -> ColumnRefinementResult {
    if columns.is_empty() || rows.is_empty() {
        return ColumnRefinementResult {
            columns: columns.to_vec(),
            hidden_columns: Vec::new(),
            rows: rows.to_vec(),
        };
    }

    let non_empty: Vec<String> = columns
        .iter()
        .filter(|col| !is_empty_column(rows, col))
        .cloned()
        .collect();

    if non_empty.is_empty() {
        return ColumnRefinementResult {
            columns: columns.to_vec(),
            hidden_columns: Vec::new(),
            rows: rows.to_vec(),
        };
    }

    if non_empty.len() <= max_cols {
        return ColumnRefinementResult {
            columns: non_empty,
            hidden_columns: Vec::new(),
            rows: rows.to_vec(),
        };
    }

    let ranked = rank_columns(&non_empty, user_query, sql);
    let visible = ranked[..max_cols].to_vec();
    let hidden = ranked[max_cols..].to_vec();

    ColumnRefinementResult {
        columns: visible,
        hidden_columns: hidden,
        rows: rows.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_all_empty_columns() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![json!({"a": null, "b": 1}), json!({"a": "", "b": 2})];
        let result = refine_columns(&columns, &rows, "", "", DEFAULT_MAX_DISPLAY_COLUMNS);
        assert_eq!(result.columns, vec!["b"]);
        assert!(result.hidden_columns.is_empty());
    }

    #[test]
    fn keeps_originals_when_all_empty() {
        let columns = vec!["a".to_string()];
        let rows = vec![json!({"a": null})];
        let result = refine_columns(&columns, &rows, "", "", DEFAULT_MAX_DISPLAY_COLUMNS);
        assert_eq!(result.columns, vec!["a"]);
    }

    #[test]
    fn caps_and_ranks_by_relevance() {
        let columns: Vec<String> = (1..=10).map(|i| format!("col{i}")).collect();
        let mut row = serde_json::Map::new();
        for col in &columns {
            row.insert(col.clone(), json!("x"));
        }
        let rows = vec![Value::Object(row)];
        let result = refine_columns(&columns, &rows, "show col3 please", "SELECT * FROM t", 8);
        assert_eq!(result.columns.len(), 8);
        assert_eq!(result.hidden_columns.len(), 2);
        assert_eq!(result.columns[0], "col3");
    }

    #[test]
    fn word_match_strips_known_suffixes() {
        assert!(word_match("customername", "top customer by sales"));
        assert!(!word_match("id", "top customer by sales"));
    }
}
