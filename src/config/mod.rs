//! Environment-driven configuration, loaded once at startup.
//!
//! Mirrors the shape of a traditional `AppConfig::from_env()` loader:
//! fail fast on anything required, fall back to documented defaults
//! for everything else.

use std::env;
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()
                .context("DATABASE_PORT must be a valid port number")?,
            username: env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DATABASE_PASSWORD").context("DATABASE_PASSWORD is required")?,
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "nl2sql_gateway".to_string()),
            ssl_mode: env::var("DATABASE_SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
        })
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

/// Thresholds that tune routing decisions across the pipeline (§6.3).
#[derive(Debug, Clone, Copy)]
pub struct PipelineThresholds {
    pub template_confidence: f64,
    pub template_ambiguity_gap: f64,
    pub table_search_threshold: f64,
    pub dynamic_confidence_gate: f64,
}

impl PipelineThresholds {
    fn from_env() -> Result<Self> {
        Ok(Self {
            template_confidence: parse_env_f64("QUERY_TEMPLATE_CONFIDENCE_THRESHOLD", 0.80)?,
            template_ambiguity_gap: parse_env_f64("QUERY_TEMPLATE_AMBIGUITY_GAP", 0.03)?,
            table_search_threshold: parse_env_f64("TABLE_SEARCH_THRESHOLD", 0.03)?,
            dynamic_confidence_gate: parse_env_f64("DYNAMIC_CONFIDENCE_THRESHOLD", 0.70)?,
        })
    }
}

fn parse_env_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(raw) => raw.parse::<f64>().with_context(|| format!("{key} must be a number")),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(raw) => raw.parse::<u64>().with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}

/// Cache sizing and TTLs (§3 Lifecycles, §6.3). Session and paused-workflow
/// TTLs are hardcoded per spec; only their caps are configurable.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub allowed_values_ttl: Duration,
    pub allowed_values_max_entries: usize,
    pub paused_workflow_max_entries: usize,
    pub session_ttl: Duration,
    pub session_max_entries: usize,
    pub paused_workflow_ttl: Duration,
}

impl CacheConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            allowed_values_ttl: Duration::from_secs(parse_env_u64("ALLOWED_VALUES_TTL_SECONDS", 600)?),
            allowed_values_max_entries: parse_env_u64("ALLOWED_VALUES_MAX_CACHE_ENTRIES", 500)? as usize,
            paused_workflow_max_entries: parse_env_u64("MAX_WORKFLOW_CACHE_SIZE", 100)? as usize,
            session_ttl: Duration::from_secs(30 * 60),
            session_max_entries: parse_env_u64("MAX_SESSION_CACHE_SIZE", 1000)? as usize,
            paused_workflow_ttl: Duration::from_secs(5 * 60),
        })
    }
}

/// Loaded once at startup from a JSON file: a non-empty array of
/// fully-qualified table names the query validator will accept.
#[derive(Debug, Clone)]
pub struct AllowedTables(Vec<String>);

impl AllowedTables {
    fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("failed to read allowed-tables config at {path}"))?;
        let tables: Vec<String> =
            serde_json::from_str(&raw).with_context(|| format!("allowed-tables config at {path} is not a JSON array of strings"))?;
        if tables.is_empty() {
            anyhow::bail!("allowed-tables config at {path} must be a non-empty array");
        }
        Ok(Self(tables))
    }

    pub fn as_set(&self) -> std::collections::HashSet<String> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is required")?,
            base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            model: env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct VectorSearchConfig {
    pub template_index_url: String,
    pub table_index_url: String,
}

impl VectorSearchConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            template_index_url: env::var("TEMPLATE_SEARCH_URL").context("TEMPLATE_SEARCH_URL is required")?,
            table_index_url: env::var("TABLE_SEARCH_URL").context("TABLE_SEARCH_URL is required")?,
        })
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub database_pool: PgPool,
    pub llm: LlmConfig,
    pub vector_search: VectorSearchConfig,
    pub allowed_tables: std::collections::HashSet<String>,
    pub thresholds: PipelineThresholds,
    pub cache: CacheConfig,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig::from_env()?;
        let database_pool = PgPool::connect(&database.connection_string())
            .await
            .context("failed to connect to database")?;

        let allowed_tables_path =
            env::var("ALLOWED_TABLES_CONFIG_PATH").unwrap_or_else(|_| "config/allowed_tables.json".to_string());
        let allowed_tables = AllowedTables::load(&allowed_tables_path)?.as_set();

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        Ok(Self {
            database,
            database_pool,
            llm: LlmConfig::from_env()?,
            vector_search: VectorSearchConfig::from_env()?,
            allowed_tables,
            thresholds: PipelineThresholds::from_env()?,
            cache: CacheConfig::from_env()?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cors_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
