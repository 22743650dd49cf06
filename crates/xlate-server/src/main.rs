use clap::Parser;
use xlate_server::bootstrap::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::parse();
    start_server(config).await
}
