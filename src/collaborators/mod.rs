//! External collaborator interfaces (§6.4) and their default
//! implementations. Everything in here talks to something outside the
//! process — the LLM provider, the vector-search service, the database.

pub mod llm_client;
pub mod sql_executor;
pub mod vector_search;

pub use llm_client::{AnthropicLlmClient, LlmChatClient};
pub use sql_executor::{ExecutionResult, PostgresSqlExecutor, SqlExecutor};
pub use vector_search::{HttpVectorSearchClient, VectorHit, VectorSearchClient};
