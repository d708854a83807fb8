//! Step reporter (C10 §9 design note): an explicit channel the
//! orchestrator hands each stage, replacing an implicit ContextVar-style
//! reporter the caller would otherwise have to thread through every
//! function signature.

use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use super::event::{StepStatus, StreamEvent};

#[derive(Clone)]
pub struct StepReporter {
    tx: UnboundedSender<StreamEvent>,
}

impl StepReporter {
    pub fn new(tx: UnboundedSender<StreamEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: StreamEvent) {
        let _ = self.tx.send(event); // receiver dropped means the client disconnected
    }

    pub fn start(&self, step: &str) {
        self.send(StreamEvent::Step { step: step.to_string(), status: StepStatus::Started, duration_ms: None });
    }

    pub fn complete(&self, step: &str, started_at: Instant) {
        let duration_ms = started_at.elapsed().as_millis() as u64;
        self.send(StreamEvent::Step {
            step: step.to_string(),
            status: StepStatus::Completed,
            duration_ms: Some(duration_ms),
        });
    }
}

/// Times a step, reporting its start and completion around `f`.
pub async fn timed_step<T, F, Fut>(reporter: &StepReporter, step: &str, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    reporter.start(step);
    let started_at = Instant::now();
    let result = f().await;
    reporter.complete(step, started_at);
    result
}
