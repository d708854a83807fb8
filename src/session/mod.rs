//! Session assistant (C9): conversational shell around the NL2SQL
//! pipeline. Classifies each chat message, turns it into a pipeline
//! request, and renders whatever the pipeline returns back into chat
//! text plus a tool-call payload.
//!
//! Free functions operating on an explicit `&mut SessionContext`, not a
//! stateful object — matching [`crate::pipeline::PipelineClients`]'s
//! "construct once, pass explicitly" shape rather than hiding the
//! session behind `self`.

mod context;
mod intent;
mod rendering;
mod suggestions;

pub use context::update_context;
pub use intent::{build_request, classify_intent, ClassificationResult, Intent};
pub use rendering::{render_response, RenderedResponse, ToolCall, ToolCallResult};
pub use suggestions::build_suggestions;

use crate::collaborators::LlmChatClient;
use crate::error::AppError;
use crate::models::{Nl2SqlResponse, SessionContext};

/// Handles a message classified as plain conversation — a trivial
/// passthrough to the LLM with no pipeline involvement.
pub async fn handle_conversation(llm: &dyn LlmChatClient, message: &str) -> Result<String, AppError> {
    llm.run(message, None).await
}

/// Attaches follow-up suggestions to a successful, non-clarification
/// response, based on the session's current schema area and exploration
/// depth *after* [`update_context`] has already run for this turn.
pub fn enrich_with_suggestions(response: &mut Nl2SqlResponse, context: &SessionContext) {
    if response.error.is_some() || response.needs_clarification {
        return;
    }
    let has_results = response.row_count > 0;
    response.suggestions =
        build_suggestions(context.current_schema_area.as_deref(), context.exploration_depth, has_results);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DraftSource;

    #[test]
    fn enrich_skips_error_and_clarification_responses() {
        let context = SessionContext::new();
        let mut response = Nl2SqlResponse::error("boom");
        enrich_with_suggestions(&mut response, &context);
        assert!(response.suggestions.is_empty());

        let mut response = Nl2SqlResponse { needs_clarification: true, ..Default::default() };
        enrich_with_suggestions(&mut response, &context);
        assert!(response.suggestions.is_empty());
    }

    #[test]
    fn enrich_attaches_suggestions_for_known_area() {
        let mut context = SessionContext::new();
        context.record(Some("sales".to_string()), crate::models::LastQueryContext::Dynamic {
            sql: "SELECT 1".to_string(),
            tables_metadata_json: String::new(),
            tables: vec!["Sales.Orders".to_string()],
            question: "orders".to_string(),
        });
        let mut response = Nl2SqlResponse {
            row_count: 3,
            source: Some(DraftSource::Dynamic),
            ..Default::default()
        };
        enrich_with_suggestions(&mut response, &context);
        assert!(!response.suggestions.is_empty());
    }
}
