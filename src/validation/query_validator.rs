//! SQL query validation: syntax, statement type, table allowlist, and
//! security pattern checks.
//!
//! Deliberately a lightweight check rather than a full SQL parser — the
//! upstream query builder (C7) is trusted to produce well-formed `SELECT`
//! statements; this is the last line of defense before execution.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::models::SqlDraft;

pub static SQL_INJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r";\s*--",
        r"(?i)'\s*OR\s+'?\d+'?\s*=\s*'?\d+'?",
        r"(?i)'\s*OR\s+''='",
        r"(?i)UNION\s+SELECT",
        r"(?i)INTO\s+OUTFILE",
        r"(?i)INTO\s+DUMPFILE",
        r"(?i)LOAD_FILE",
        r"(?i)xp_cmdshell",
        r"(?i)sp_executesql",
        r"(?i)EXEC\s*\(",
        r"(?i)EXECUTE\s*\(",
        r"(?i)@@version",
        r"(?i)INFORMATION_SCHEMA",
        r"(?i)sys\.",
        r"(?i)WAITFOR\s+DELAY",
        r"(?i)BENCHMARK\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub const DANGEROUS_KEYWORDS: [&str; 16] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE", "GRANT",
    "REVOKE", "DENY", "BACKUP", "RESTORE", "SHUTDOWN", "DBCC",
];

static TABLE_ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:FROM|JOIN)\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?)(?:\s+(?:AS\s+)?([A-Za-z_][A-Za-z0-9_]*))?",
    )
    .unwrap()
});

fn check_syntax(sql: &str) -> (bool, Vec<String>) {
    let mut errors = Vec::new();
    let trimmed = sql.trim();

    if trimmed.is_empty() {
        errors.push("Query is empty".to_string());
        return (false, errors);
    }

    if trimmed.matches('(').count() != trimmed.matches(')').count() {
        errors.push("Unbalanced parentheses".to_string());
    }

    if trimmed.matches('\'').count() % 2 != 0 {
        errors.push("Unbalanced single quotes".to_string());
    }

    if !trimmed.to_ascii_uppercase().starts_with("SELECT") {
        errors.push("Query does not start with SELECT".to_string());
    }

    (errors.is_empty(), errors)
}

fn check_statement_type(sql: &str) -> (&'static str, bool, Vec<String>) {
    let mut violations = Vec::new();
    let sql_upper = sql.trim().to_ascii_uppercase();

    let statement_type = if sql_upper.starts_with("SELECT") {
        "SELECT"
    } else if sql_upper.starts_with("INSERT") {
        "INSERT"
    } else if sql_upper.starts_with("UPDATE") {
        "UPDATE"
    } else if sql_upper.starts_with("DELETE") {
        "DELETE"
    } else if sql_upper.starts_with("DROP") {
        "DROP"
    } else if sql_upper.starts_with("CREATE") {
        "CREATE"
    } else if sql_upper.starts_with("ALTER") {
        "ALTER"
    } else {
        "UNKNOWN"
    };

    if statement_type != "SELECT" {
        violations.push(format!("Statement type is {statement_type}, must be SELECT"));
    }

    let sql_trimmed = sql.trim().trim_end_matches(';').trim();
    if sql_trimmed.contains(';') {
        violations.push("Multiple statements detected (semicolon found within query)".to_string());
        return (statement_type, false, violations);
    }

    (statement_type, true, violations)
}

fn check_allowlist(sql: &str, allowed_tables: &HashSet<String>) -> (bool, Vec<String>, Vec<String>) {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();
    let mut tables_found: HashSet<String> = HashSet::new();

    for caps in TABLE_ALIAS_RE.captures_iter(sql) {
        let table = caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        if !table.is_empty() {
            tables_found.insert(table);
        }
    }

    for table in &tables_found {
        if table.contains('.') {
            if !allowed_tables.iter().any(|t| t.eq_ignore_ascii_case(table)) {
                violations.push(format!("Table '{table}' is not in the allowlist"));
            }
        } else {
            warnings.push(format!("Table '{table}' should be fully qualified (e.g., Schema.Table)"));
        }
    }

    (violations.is_empty(), violations, warnings)
}

fn check_security(sql: &str) -> (bool, Vec<String>) {
    let mut violations = Vec::new();

    for keyword in DANGEROUS_KEYWORDS {
        let pattern = format!(r"(?i)\b{keyword}\b");
        if Regex::new(&pattern).unwrap().is_match(sql) {
            violations.push(format!("Dangerous keyword detected: {keyword}"));
        }
    }

    for pattern in SQL_INJECTION_PATTERNS.iter() {
        if pattern.is_match(sql) {
            violations.push("Potential SQL injection pattern detected".to_string());
            break;
        }
    }

    (violations.is_empty(), violations)
}

/// Validates a SQL draft's `completed_sql` for syntax, statement type,
/// table allowlist membership, and injection/dangerous-keyword patterns.
///
/// Always sets `query_validated = true`; violations (if any) land in
/// `query_violations` and non-fatal issues in `query_warnings`.
pub fn validate_query(mut draft: SqlDraft, allowed_tables: &HashSet<String>) -> SqlDraft {
    let sql_query = draft.completed_sql.clone().unwrap_or_default();
    info!(sql = %sql_query.chars().take(200).collect::<String>(), "validating query");

    let mut all_violations = Vec::new();
    let mut all_warnings = Vec::new();

    let (syntax_valid, syntax_errors) = check_syntax(&sql_query);
    all_violations.extend(syntax_errors);

    let (statement_type, is_single_statement, statement_violations) = check_statement_type(&sql_query);
    all_violations.extend(statement_violations);

    let (allowlist_valid, allowlist_violations, allowlist_warnings) = check_allowlist(&sql_query, allowed_tables);
    all_violations.extend(allowlist_violations);
    all_warnings.extend(allowlist_warnings);

    let (security_valid, security_violations) = check_security(&sql_query);
    all_violations.extend(security_violations);

    let is_valid =
        syntax_valid && allowlist_valid && statement_type == "SELECT" && is_single_statement && security_valid;

    info!(
        valid = is_valid,
        violations = all_violations.len(),
        warnings = all_warnings.len(),
        "query validation complete"
    );

    draft.query_validated = true;
    draft.query_violations = all_violations;
    draft.query_warnings = all_warnings;
    draft
}
