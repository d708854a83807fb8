use serde::{Deserialize, Serialize};

/// Where a parameter's allowed values come from.
///
/// `Database` values are hydrated at extraction time by the allowed-values
/// provider (C4); `Static` values are authored directly on the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AllowedValuesSource {
    Static,
    Database { table: String, column: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Integer,
    Float,
    String,
    Date,
}

impl ParamType {
    /// Parses the validation-rule `type` field, tolerating the original
    /// system's synonyms for numeric types (`decimal`, `number`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "integer" => Some(Self::Integer),
            "float" | "decimal" | "number" => Some(Self::Float),
            "string" => Some(Self::String),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// Validation rules attached to a [`ParameterDefinition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterValidation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub min: Option<serde_json::Value>,
    pub max: Option<serde_json::Value>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    pub regex: Option<String>,
}

/// A single parameter slot on a [`QueryTemplate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub column: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub ask_if_missing: bool,
    pub default_value: Option<serde_json::Value>,
    pub default_policy: Option<String>,
    #[serde(default = "default_confidence_weight")]
    pub confidence_weight: f64,
    pub validation: Option<ParameterValidation>,
    pub allowed_values_source: Option<AllowedValuesSource>,
}

fn default_confidence_weight() -> f64 {
    1.0
}

impl ParameterDefinition {
    pub fn confidence_weight(&self) -> f64 {
        self.confidence_weight
    }
}

/// A stored SQL pattern with `%{{name}}%` tokens, a curated example
/// question, and ordered parameter metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub id: String,
    pub intent: String,
    pub example_question: String,
    pub sql_template: String,
    pub reasoning: String,
    pub parameters: Vec<ParameterDefinition>,
    #[serde(default)]
    pub score: f64,
}
