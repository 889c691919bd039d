mod routes;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use routes::{create_router, AppState};
use tubescribe::Config;

#[derive(Parser)]
#[command(
    name = "tubescribe-server",
    about = "HTTP API for transcribing YouTube videos into timestamped subtitles"
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tubescribe=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.scratch_root)?;

    let state = AppState::new(config);
    let router = create_router(state);

    let listener = TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    tracing::info!(host = %cli.host, port = cli.port, "server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
