//! SSE streaming endpoint (§6.1): `GET /api/chat/stream`.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::StreamExt;
use serde::Deserialize;

use crate::streaming::{run_turn, StreamingClients, TurnRequest};

#[derive(Debug, Deserialize)]
pub struct ChatStreamParams {
    pub message: String,
    pub thread_id: Option<String>,
    /// Only used when a new session is created; ignored otherwise.
    #[allow(dead_code)]
    pub title: Option<String>,
    pub request_id: Option<String>,
}

pub async fn chat_stream(
    State(clients): State<StreamingClients>,
    Query(params): Query<ChatStreamParams>,
) -> impl IntoResponse {
    let turn = TurnRequest {
        message: params.message,
        thread_id: params.thread_id,
        request_id: params.request_id,
    };

    let events = run_turn(clients, turn)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json().to_string())));

    let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(axum::http::header::CACHE_CONTROL, axum::http::HeaderValue::from_static("no-cache"));
    headers.insert(axum::http::header::CONNECTION, axum::http::HeaderValue::from_static("keep-alive"));
    response
}
