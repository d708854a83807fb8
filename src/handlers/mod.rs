//! HTTP handlers: the one endpoint in core scope (the SSE chat stream)
//! plus stubs for the out-of-core thread lifecycle routes (§6.2).

pub mod stream;
pub mod threads;

pub use stream::chat_stream;
