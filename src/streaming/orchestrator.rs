//! Streaming orchestrator (C10): drives one user turn end to end and
//! emits its SSE events onto an unbounded channel, which [`run_turn`]
//! exposes back to the caller as a plain `Stream`.
//!
//! Collapsed into one sequential routine per §9's design note — no
//! handler graph, no implicit per-request global state; the caches and
//! pipeline collaborators are handed in explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::error;
use uuid::Uuid;

use crate::cache::{PausedWorkflowCache, SessionCache};
use crate::collaborators::LlmChatClient;
use crate::error::AppError;
use crate::models::{Nl2SqlRequest, PreviousContext, SessionContext};
use crate::pipeline::{self, PipelineClients, PipelineOutcome};
use crate::session::{self, ClassificationResult, Intent};

use super::event::{ClarificationFrame, StreamEvent};
use super::reporter::{timed_step, StepReporter};

const TEXT_CHUNK_CHARS: usize = 50;
const TEXT_CHUNK_DELAY: Duration = Duration::from_millis(15);

#[derive(Clone)]
pub struct StreamingClients {
    pub session_cache: Arc<SessionCache>,
    pub paused_workflow_cache: Arc<PausedWorkflowCache>,
    pub pipeline: PipelineClients,
    pub llm: Arc<dyn LlmChatClient>,
}

pub struct TurnRequest {
    pub message: String,
    pub thread_id: Option<String>,
    pub request_id: Option<String>,
}

/// Runs one turn in the background and returns a stream of its SSE
/// events. The turn keeps running even if the stream is dropped early —
/// the background task simply stops being drained, and its sends start
/// failing silently once the receiver is gone.
pub fn run_turn(clients: StreamingClients, request: TurnRequest) -> impl Stream<Item = StreamEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(drive_turn(clients, request, tx));
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) })
}

async fn drive_turn(clients: StreamingClients, request: TurnRequest, tx: mpsc::UnboundedSender<StreamEvent>) {
    let reporter = StepReporter::new(tx.clone());
    let mut any_steps = false;

    match run_turn_inner(&clients, &request, &reporter, &mut any_steps).await {
        Ok(thread_id) => {
            if any_steps {
                let _ = tx.send(StreamEvent::StepsComplete);
            }
            let _ = tx.send(StreamEvent::Done { thread_id });
        }
        Err(err) => {
            let correlation_id = Uuid::new_v4().to_string();
            error!(correlation_id = %correlation_id, error = %err, "unhandled error during chat turn");
            let _ = tx.send(StreamEvent::Error { message: "An unexpected error occurred".to_string(), correlation_id });
        }
    }
}

async fn run_turn_inner(
    clients: &StreamingClients,
    request: &TurnRequest,
    reporter: &StepReporter,
    any_steps: &mut bool,
) -> Result<String, AppError> {
    if let Some(request_id) = &request.request_id {
        if let Some(paused) = clients.paused_workflow_cache.take(request_id) {
            return run_clarification_resume(clients, request, &paused, reporter, any_steps).await;
        }
    }

    run_main_branch(clients, request, reporter, any_steps).await
}

async fn run_clarification_resume(
    clients: &StreamingClients,
    request: &TurnRequest,
    paused: &crate::models::ClarificationRequest,
    reporter: &StepReporter,
    any_steps: &mut bool,
) -> Result<String, AppError> {
    let thread_id = request.thread_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut overrides = HashMap::new();
    overrides.insert(paused.parameter_name.clone(), Value::String(request.message.clone()));

    let pipeline_request = Nl2SqlRequest {
        user_query: paused.original_question.clone(),
        is_refinement: true,
        previous_context: Some(PreviousContext::Template {
            template_json: paused.template_json.clone(),
            base_params: paused.extracted_parameters.clone(),
            overrides,
        }),
    };

    *any_steps = true;
    let outcome =
        timed_step(reporter, "query_processing", || pipeline::process_query(&pipeline_request, &clients.pipeline))
            .await?;

    let mut context = clients.session_cache.get(&thread_id).unwrap_or_default();
    handle_outcome(clients, &thread_id, outcome, &mut context, reporter).await?;
    Ok(thread_id)
}

async fn run_main_branch(
    clients: &StreamingClients,
    request: &TurnRequest,
    reporter: &StepReporter,
    any_steps: &mut bool,
) -> Result<String, AppError> {
    let thread_id = request.thread_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut context = clients.session_cache.get(&thread_id).unwrap_or_default();

    *any_steps = true;
    let classification: ClassificationResult =
        timed_step(reporter, "intent_analysis", || session::classify_intent(clients.llm.as_ref(), &context, &request.message))
            .await?;

    if classification.intent == Intent::Conversation {
        let reply = session::handle_conversation(clients.llm.as_ref(), &request.message).await?;
        stream_text(reporter, &reply).await;
        clients.session_cache.put(&thread_id, context);
        return Ok(thread_id);
    }

    let pipeline_request = session::build_request(&context, &classification);
    let outcome =
        timed_step(reporter, "query_processing", || pipeline::process_query(&pipeline_request, &clients.pipeline))
            .await?;

    handle_outcome(clients, &thread_id, outcome, &mut context, reporter).await?;
    Ok(thread_id)
}

async fn handle_outcome(
    clients: &StreamingClients,
    thread_id: &str,
    outcome: PipelineOutcome,
    context: &mut SessionContext,
    reporter: &StepReporter,
) -> Result<(), AppError> {
    match outcome {
        PipelineOutcome::Clarification(clarification) => {
            let request_id = Uuid::new_v4().to_string();
            let frame = ClarificationFrame {
                request_id: request_id.clone(),
                parameter_name: clarification.parameter_name.clone(),
                prompt: clarification.prompt.clone(),
                allowed_values: clarification.allowed_values.clone(),
            };
            clients.paused_workflow_cache.store(&request_id, *clarification);
            reporter.send(StreamEvent::NeedsClarification { clarification: frame, thread_id: thread_id.to_string() });
        }
        PipelineOutcome::Response(mut response) => {
            session::update_context(context, &response);
            session::enrich_with_suggestions(&mut response, context);
            let rendered = session::render_response(&response, thread_id);
            reporter.send(StreamEvent::ToolCall(Box::new(rendered.tool_call)));
        }
    }

    clients.session_cache.put(thread_id, context.clone());
    Ok(())
}

/// Streams `text` in small chunks with a short delay between them, so a
/// conversational reply renders progressively instead of appearing all
/// at once.
async fn stream_text(reporter: &StepReporter, text: &str) {
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(TEXT_CHUNK_CHARS) {
        reporter.send(StreamEvent::Text(chunk.iter().collect()));
        tokio::time::sleep(TEXT_CHUNK_DELAY).await;
    }
}
