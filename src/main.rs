use anyhow::Result;
use nl2sql_gateway::{create_app, init_tracing};
use nl2sql_gateway::config::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().await?;
    let addr = config.server_address();
    let app = create_app(config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "nl2sql gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
