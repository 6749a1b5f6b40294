use scrawl::prelude::*;

#[tokio::main]
async fn main() -> Result<(), ScrawlError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrawl=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let server = ScrawlServer::builder()
        .config(config)
        .build(WordList::builtin())
        .await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
