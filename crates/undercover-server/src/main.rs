use tracing_subscriber::EnvFilter;
use undercover_server::UndercoverServerBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("UNDERCOVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:6002".to_string());

    let server = UndercoverServerBuilder::new().bind(&addr).build().await?;
    tracing::info!(%addr, "undercover server ready");
    server.run().await?;
    Ok(())
}
