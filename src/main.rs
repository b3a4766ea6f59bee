mod cli;
mod client;
mod server;
mod ui;
mod wire;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.server {
        if let Err(e) = server::run(cli.port).await {
            tracing::error!(error = %e, "server failed");
            eprintln!("chat: {e}");
            std::process::exit(1);
        }
    } else if let Err(e) = client::run(&cli.host, cli.port).await {
        tracing::error!(error = %e, "client failed");
        eprintln!("chat: {e}");
        std::process::exit(1);
    }
}
