//! Supporting caches: database-sourced allowed values (C4), plus the
//! session and paused-workflow caches that back the streaming
//! orchestrator (C10).

pub mod allowed_values;
pub mod lru_ttl;
pub mod paused_workflow;
pub mod session_cache;

pub use allowed_values::{AllowedValuesProvider, AllowedValuesResult};
pub use lru_ttl::LruTtlCache;
pub use paused_workflow::PausedWorkflowCache;
pub use session_cache::SessionCache;
