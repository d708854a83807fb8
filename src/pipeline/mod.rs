//! NL2SQL pipeline (C8): the central orchestration that turns one user
//! turn into a validated SQL result, a confidence confirmation, or a
//! clarification request.
//!
//! Collapses what used to be a controller/extractor/validator/executor
//! handoff into a single routine per branch: [`template_branch`] and
//! [`dynamic_branch`] each run start to finish and return, never
//! raising across their own boundary.

mod clarification;
mod dynamic_branch;
pub mod rendering;
mod template_branch;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::cache::AllowedValuesProvider;
use crate::collaborators::{LlmChatClient, SqlExecutor};
use crate::config::PipelineThresholds;
use crate::error::AppError;
use crate::models::{ClarificationRequest, Nl2SqlRequest, Nl2SqlResponse, PreviousContext};
use crate::search::{TableSearchClient, TemplateSearchClient};

pub use clarification::build_clarification;

/// Collaborators the pipeline calls through. Constructed once at startup
/// and passed explicitly into every call — nothing here is global
/// mutable state except the caches, which are legitimately shared.
#[derive(Clone)]
pub struct PipelineClients {
    pub template_search: Arc<dyn TemplateSearchClient>,
    pub table_search: Arc<dyn TableSearchClient>,
    pub allowed_values: AllowedValuesProvider,
    pub llm: Arc<dyn LlmChatClient>,
    pub sql_executor: Arc<dyn SqlExecutor>,
    pub allowed_tables: HashSet<String>,
    pub thresholds: PipelineThresholds,
}

/// The two shapes a turn can end in — a tagged result rather than an
/// exception crossing the pipeline boundary.
pub enum PipelineOutcome {
    Response(Box<Nl2SqlResponse>),
    Clarification(Box<ClarificationRequest>),
}

/// Routes a request to the template or dynamic branch and runs it to
/// completion. Refinements with previous context skip routing entirely
/// and go straight to the matching branch's refinement variant.
pub async fn process_query(request: &Nl2SqlRequest, clients: &PipelineClients) -> Result<PipelineOutcome, AppError> {
    if request.is_refinement {
        match &request.previous_context {
            Some(PreviousContext::Template { template_json, base_params, overrides }) => {
                return template_branch::run_refinement(request, clients, template_json, base_params, overrides)
                    .await;
            }
            Some(PreviousContext::Dynamic { previous_sql, tables_json, previous_question }) => {
                return dynamic_branch::run_refinement(request, clients, previous_sql, tables_json, previous_question)
                    .await;
            }
            None => {} // no context to resume from — fall through to fresh routing
        }
    }

    let template_result = clients.template_search.search(&request.user_query).await?;

    if template_result.has_high_confidence_match {
        let template = template_result
            .best_match
            .expect("has_high_confidence_match implies best_match is set");
        info!(template = %template.id, score = template_result.confidence_score, "routing to template-fresh");
        return template_branch::run_fresh(request, clients, &template, template_result.confidence_score).await;
    }

    if template_result.is_ambiguous {
        let matching_intents: Vec<String> = template_result
            .all_matches
            .iter()
            .take(3)
            .filter(|t| t.score >= clients.thresholds.template_confidence)
            .map(|t| format!("'{}'", t.intent))
            .collect();
        let message = format!(
            "Your question could match multiple query types: {}. Could you please be more specific about what data you're looking for?",
            matching_intents.join(", ")
        );
        return Ok(PipelineOutcome::Response(Box::new(Nl2SqlResponse::error(message))));
    }

    info!("no confident template match, routing to dynamic-fresh");
    dynamic_branch::run_fresh(request, clients).await
}
