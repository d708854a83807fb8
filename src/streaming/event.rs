//! SSE event shapes (C10 §4.10). Each variant serializes to the exact
//! flat JSON object the spec enumerates — deliberately not a single
//! tagged enum, since the field sets differ per event kind.

use serde_json::{json, Value};

use crate::session::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Started,
    Completed,
}

pub struct ClarificationFrame {
    pub request_id: String,
    pub parameter_name: String,
    pub prompt: String,
    pub allowed_values: Vec<String>,
}

pub enum StreamEvent {
    Step { step: String, status: StepStatus, duration_ms: Option<u64> },
    ToolCall(Box<ToolCall>),
    NeedsClarification { clarification: ClarificationFrame, thread_id: String },
    Text(String),
    StepsComplete,
    Done { thread_id: String },
    Error { message: String, correlation_id: String },
}

impl StreamEvent {
    pub fn to_json(&self) -> Value {
        match self {
            StreamEvent::Step { step, status: StepStatus::Started, .. } => {
                json!({"step": step, "status": "started"})
            }
            StreamEvent::Step { step, status: StepStatus::Completed, duration_ms } => {
                json!({"step": step, "status": "completed", "duration_ms": duration_ms.unwrap_or_default()})
            }
            StreamEvent::ToolCall(tool_call) => json!({ "tool_call": tool_call.as_ref() }),
            StreamEvent::NeedsClarification { clarification, thread_id } => json!({
                "needs_clarification": true,
                "clarification": {
                    "request_id": clarification.request_id,
                    "parameter_name": clarification.parameter_name,
                    "prompt": clarification.prompt,
                    "allowed_values": clarification.allowed_values,
                },
                "thread_id": thread_id,
            }),
            StreamEvent::Text(text) => json!({"text": text}),
            StreamEvent::StepsComplete => json!({"steps_complete": true}),
            StreamEvent::Done { thread_id } => json!({"done": true, "thread_id": thread_id}),
            StreamEvent::Error { message, correlation_id } => {
                json!({"error": message, "done": true, "correlation_id": correlation_id})
            }
        }
    }
}
