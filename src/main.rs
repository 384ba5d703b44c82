use bonehealth::server::{run_server, ServerConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bonehealth", version, about = "Osteoporosis risk prediction server")]
struct Args {
    /// Host to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long)]
    port: Option<u16>,

    /// Path to the training dataset CSV
    #[arg(long)]
    data_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_path) = args.data_path {
        config.data_path = data_path;
    }

    run_server(config).await
}
