use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use quire_server::config::ServerConfig;
use quire_server::error::QuireServerError;
use quire_server::{AppState, TelemetryConfig, telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "quire-server")]
#[command(about = "Quire relay - live Markdown sync and document storage")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "QUIRE_CONFIG", default_value = "quire.toml")]
    config: PathBuf,

    /// Override `core.listen_addr`
    #[arg(long, env = "QUIRE_LISTEN")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .context_lines(2)
                .build(),
        )
    }))?;
    dotenvy::dotenv().ok();

    telemetry::init(TelemetryConfig::from_env("quire-server"));

    let args = Args::parse();
    run(args).await?;
    Ok(())
}

async fn run(args: Args) -> Result<(), QuireServerError> {
    let mut config = ServerConfig::load(&args.config).await?;
    if let Some(listen) = args.listen {
        config.core.listen_addr = listen;
    }
    info!(config = %args.config.display(), addr = %config.core.listen_addr, "loaded configuration");

    let state = AppState::new(&config);
    quire_server::run(state, config.core.listen_addr).await?;
    Ok(())
}
