use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".parse().expect("valid default filter"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    partbot::cli::run().await
}
