//! Streaming orchestrator + caches (C10): turns one chat message into an
//! SSE event stream, backed by the session and paused-workflow caches.

mod event;
mod orchestrator;
mod reporter;

pub use event::StreamEvent;
pub use orchestrator::{run_turn, StreamingClients, TurnRequest};
pub use reporter::StepReporter;
