//! Table search adapter (C5) — a thin wrapper over the external
//! vector-search collaborator that hydrates hits into [`TableMetadata`]
//! objects and applies the minimum-relevance threshold.

use async_trait::async_trait;
use tracing::warn;

use crate::collaborators::VectorSearchClient;
use crate::error::AppError;
use crate::models::TableMetadata;

const TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct TableSearchResult {
    pub has_matches: bool,
    pub tables: Vec<TableMetadata>,
    pub table_count: usize,
    pub message: String,
}

#[async_trait]
pub trait TableSearchClient: Send + Sync {
    async fn search(&self, question: &str) -> Result<TableSearchResult, AppError>;
}

pub struct VectorTableSearch {
    client: std::sync::Arc<dyn VectorSearchClient>,
    index_url: String,
    min_score: f64,
}

impl VectorTableSearch {
    pub fn new(client: std::sync::Arc<dyn VectorSearchClient>, index_url: String, min_score: f64) -> Self {
        Self {
            client,
            index_url,
            min_score,
        }
    }
}

#[async_trait]
impl TableSearchClient for VectorTableSearch {
    async fn search(&self, question: &str) -> Result<TableSearchResult, AppError> {
        let hits = self.client.search(&self.index_url, question, TOP_K).await?;

        let mut tables = Vec::with_capacity(hits.len());
        for hit in &hits {
            match serde_json::from_value::<TableMetadata>(hit.payload.clone()) {
                Ok(mut table) => {
                    table.score = hit.score;
                    if table.score >= self.min_score {
                        tables.push(table);
                    }
                }
                Err(e) => warn!(error = %e, "failed to hydrate table search hit, skipping"),
            }
        }
        tables.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let table_count = tables.len();
        let has_matches = table_count > 0;
        let message = if has_matches {
            format!("Found {table_count} relevant table(s)")
        } else {
            "No relevant tables found".to_string()
        };

        Ok(TableSearchResult {
            has_matches,
            tables,
            table_count,
            message,
        })
    }
}
