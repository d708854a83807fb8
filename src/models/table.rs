use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub description: String,
    pub data_type: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    pub fk_target: Option<String>,
}

/// Table metadata surfaced by the table-search adapter (C5) and consumed
/// by the dynamic query builder (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub id: String,
    /// Fully-qualified name, e.g. `Sales.Orders`.
    pub qualified_name: String,
    pub description: String,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub score: f64,
}

impl TableMetadata {
    /// First segment of the qualified name, lowercased — the "schema area"
    /// used for follow-up suggestions and error recovery.
    pub fn schema_area(&self) -> Option<String> {
        self.qualified_name
            .split('.')
            .next()
            .map(|s| s.to_ascii_lowercase())
    }
}
