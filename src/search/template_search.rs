//! Template search adapter (C5) — a thin wrapper over the external
//! vector-search collaborator that hydrates hits into [`QueryTemplate`]
//! objects and applies the confidence/ambiguity thresholds.

use async_trait::async_trait;
use tracing::warn;

use crate::collaborators::VectorSearchClient;
use crate::error::AppError;
use crate::models::QueryTemplate;

const TOP_K: usize = 3;

#[derive(Debug, Clone)]
pub struct TemplateSearchResult {
    pub has_high_confidence_match: bool,
    pub is_ambiguous: bool,
    pub best_match: Option<QueryTemplate>,
    pub confidence_score: f64,
    pub ambiguity_gap: f64,
    pub all_matches: Vec<QueryTemplate>,
    pub message: String,
}

#[async_trait]
pub trait TemplateSearchClient: Send + Sync {
    async fn search(&self, question: &str) -> Result<TemplateSearchResult, AppError>;
}

pub struct VectorTemplateSearch {
    client: std::sync::Arc<dyn VectorSearchClient>,
    index_url: String,
    confidence_threshold: f64,
    ambiguity_gap_threshold: f64,
}

impl VectorTemplateSearch {
    pub fn new(
        client: std::sync::Arc<dyn VectorSearchClient>,
        index_url: String,
        confidence_threshold: f64,
        ambiguity_gap_threshold: f64,
    ) -> Self {
        Self {
            client,
            index_url,
            confidence_threshold,
            ambiguity_gap_threshold,
        }
    }
}

#[async_trait]
impl TemplateSearchClient for VectorTemplateSearch {
    async fn search(&self, question: &str) -> Result<TemplateSearchResult, AppError> {
        let hits = self.client.search(&self.index_url, question, TOP_K).await?;

        let mut templates = Vec::with_capacity(hits.len());
        for hit in &hits {
            match serde_json::from_value::<QueryTemplate>(hit.payload.clone()) {
                Ok(mut template) => {
                    template.score = hit.score;
                    templates.push(template);
                }
                Err(e) => warn!(error = %e, "failed to hydrate template search hit, skipping"),
            }
        }
        templates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let top_score = templates.first().map(|t| t.score).unwrap_or(0.0);
        let second_score = templates.get(1).map(|t| t.score).unwrap_or(0.0);
        let gap = top_score - second_score;

        let meets_confidence = top_score >= self.confidence_threshold;
        let has_high_confidence_match = meets_confidence && gap >= self.ambiguity_gap_threshold;
        let is_ambiguous = meets_confidence && gap < self.ambiguity_gap_threshold;

        let message = if has_high_confidence_match {
            format!(
                "Matched template '{}' with confidence {top_score:.2}",
                templates.first().map(|t| t.intent.as_str()).unwrap_or("")
            )
        } else if is_ambiguous {
            "Multiple templates matched with similar confidence".to_string()
        } else {
            "No template matched with sufficient confidence".to_string()
        };

        Ok(TemplateSearchResult {
            has_high_confidence_match,
            is_ambiguous,
            best_match: if has_high_confidence_match {
                templates.first().cloned()
            } else {
                None
            },
            confidence_score: top_score,
            ambiguity_gap: gap,
            all_matches: templates,
            message,
        })
    }
}
