//! Thread lifecycle endpoints (§6.2) — out of core. Auth and ownership
//! enforcement are explicitly out of scope; these exist only so the
//! routes are listed, not to back a real thread store.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ThreadPatch {
    #[allow(dead_code)]
    pub title: Option<String>,
    #[allow(dead_code)]
    pub status: Option<String>,
}

pub async fn get_thread(Path(_id): Path<String>) -> impl IntoResponse {
    StatusCode::NOT_IMPLEMENTED
}

pub async fn patch_thread(Path(_id): Path<String>, Json(_body): Json<ThreadPatch>) -> impl IntoResponse {
    StatusCode::NOT_IMPLEMENTED
}

pub async fn delete_thread(Path(_id): Path<String>) -> impl IntoResponse {
    StatusCode::NOT_IMPLEMENTED
}

pub async fn list_thread_messages(Path(_id): Path<String>) -> impl IntoResponse {
    StatusCode::NOT_IMPLEMENTED
}
