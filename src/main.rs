use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use driftwood::config::AppConfig;
use driftwood::handlers;
use driftwood::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server bind address
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Database file path
    #[arg(short = 'd', long, default_value = "driftwood.db")]
    database: String,

    /// Root directory for uploaded media
    #[arg(long, default_value = "uploads")]
    upload_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driftwood=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting Driftwood server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", args.database);
    info!("Upload directory: {}", args.upload_dir.display());

    let config = AppConfig::load(args.upload_dir);
    let state = AppState::new(&args.database, config).await?;
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("Listening on {}:{}", args.host, args.port);
    axum::serve(listener, app).await?;
    Ok(())
}
