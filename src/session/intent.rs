//! Intent classification (C9): decides whether a chat message is a new
//! data question, a refinement of the last one, or plain conversation.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::collaborators::LlmChatClient;
use crate::error::AppError;
use crate::models::{LastQueryContext, Nl2SqlRequest, PreviousContext, SessionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    DataQuery,
    Refinement,
    Conversation,
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub query: String,
    pub param_overrides: HashMap<String, Value>,
}

impl ClassificationResult {
    fn conversation() -> Self {
        Self { intent: Intent::Conversation, query: String::new(), param_overrides: HashMap::new() }
    }
}

#[derive(Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    query: String,
    #[serde(default)]
    param_overrides: HashMap<String, Value>,
}

fn context_info(context: &SessionContext) -> String {
    match &context.last_context {
        None => String::new(),
        Some(LastQueryContext::Template { query, parameters, defaults, .. }) => {
            let names: Vec<&str> = parameters.keys().map(String::as_str).collect();
            format!(
                "Previous question: {query}\nParameters used: {parameters:?}\n\
Available parameter names: {}\nDefaults applied: {defaults:?}",
                names.join(", ")
            )
        }
        Some(LastQueryContext::Dynamic { question, tables, sql, .. }) => {
            let preview: String = sql.chars().take(300).collect();
            format!("Previous question: {question}\nTables used: {}\nPrevious SQL: {preview}", tables.join(", "))
        }
    }
}

fn build_prompt(context: &SessionContext, user_message: &str) -> String {
    let info = context_info(context);
    format!(
        "You are classifying a user's chat message for a data-query assistant.\n\n\
{info}\n\nUser message: {user_message}\n\n\
Classify the message as one of:\n\
- A fresh data question: {{\"intent\": \"data_query\", \"query\": \"<the question, rewritten standalone if needed>\"}}\n\
- A refinement of the previous query (e.g. 'just the top 5', 'now for last year'): \
{{\"intent\": \"refinement\", \"query\": \"<the refinement request>\"}}\n\
- Plain conversation unrelated to data (greetings, thanks, small talk): {{\"intent\": \"conversation\"}}\n\n\
Respond with exactly one JSON object and nothing else."
    )
}

/// Classifies `user_message` given the session's prior-turn context.
/// Falls back to `Conversation` with no query on anything that isn't a
/// single well-formed JSON object — deliberately the simplest tolerance
/// in this codebase, since a misclassified conversational message is a
/// much smaller failure than a misparsed query.
pub async fn classify_intent(
    llm: &dyn LlmChatClient,
    context: &SessionContext,
    user_message: &str,
) -> Result<ClassificationResult, AppError> {
    let prompt = build_prompt(context, user_message);
    let raw_response = llm.run(&prompt, None).await?;

    let Some(start) = raw_response.find('{') else { return Ok(ClassificationResult::conversation()) };
    let Some(end) = raw_response.rfind('}') else { return Ok(ClassificationResult::conversation()) };
    if end < start {
        return Ok(ClassificationResult::conversation());
    }

    let Ok(parsed) = serde_json::from_str::<RawClassification>(&raw_response[start..=end]) else {
        return Ok(ClassificationResult::conversation());
    };

    let intent = match parsed.intent.as_str() {
        "data_query" => Intent::DataQuery,
        "refinement" => Intent::Refinement,
        _ => Intent::Conversation,
    };

    Ok(ClassificationResult { intent, query: parsed.query, param_overrides: parsed.param_overrides })
}

/// Turns a classification into the request the pipeline expects. A
/// refinement with no prior query to resume is downgraded to a fresh
/// data query — there's nothing for it to refine.
pub fn build_request(context: &SessionContext, classification: &ClassificationResult) -> Nl2SqlRequest {
    if classification.intent == Intent::Refinement {
        match &context.last_context {
            Some(LastQueryContext::Template { template_json, parameters, .. }) => {
                return Nl2SqlRequest {
                    user_query: classification.query.clone(),
                    is_refinement: true,
                    previous_context: Some(PreviousContext::Template {
                        template_json: template_json.clone(),
                        base_params: parameters.clone(),
                        overrides: classification.param_overrides.clone(),
                    }),
                };
            }
            Some(LastQueryContext::Dynamic { sql, tables_metadata_json, question, .. }) => {
                return Nl2SqlRequest {
                    user_query: classification.query.clone(),
                    is_refinement: true,
                    previous_context: Some(PreviousContext::Dynamic {
                        previous_sql: sql.clone(),
                        tables_json: tables_metadata_json.clone(),
                        previous_question: question.clone(),
                    }),
                };
            }
            None => {} // nothing to refine — fall through to a fresh request
        }
    }

    Nl2SqlRequest { user_query: classification.query.clone(), is_refinement: false, previous_context: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm(&'static str);
    #[async_trait]
    impl LlmChatClient for StubLlm {
        async fn run(&self, _prompt: &str, _thread: Option<&str>) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn parses_data_query() {
        let llm = StubLlm(r#"{"intent": "data_query", "query": "top 10 customers"}"#);
        let result = classify_intent(&llm, &SessionContext::new(), "show me top customers").await.unwrap();
        assert_eq!(result.intent, Intent::DataQuery);
        assert_eq!(result.query, "top 10 customers");
    }

    #[tokio::test]
    async fn tolerates_surrounding_prose() {
        let llm = StubLlm("Sure, here you go: {\"intent\": \"conversation\"} Hope that helps!");
        let result = classify_intent(&llm, &SessionContext::new(), "thanks").await.unwrap();
        assert_eq!(result.intent, Intent::Conversation);
    }

    #[tokio::test]
    async fn malformed_json_defaults_to_conversation() {
        let llm = StubLlm("not json at all");
        let result = classify_intent(&llm, &SessionContext::new(), "hi").await.unwrap();
        assert_eq!(result.intent, Intent::Conversation);
        assert_eq!(result.query, "");
    }

    #[test]
    fn refinement_without_prior_context_downgrades_to_fresh() {
        let classification =
            ClassificationResult { intent: Intent::Refinement, query: "top 5 instead".to_string(), param_overrides: HashMap::new() };
        let request = build_request(&SessionContext::new(), &classification);
        assert!(!request.is_refinement);
        assert!(request.previous_context.is_none());
    }
}
