use clap::Parser;
use irke_town_protocol::GridConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "irke-town-server")]
#[command(about = "Local HTTP engine for the IRKE town builder")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:39333")]
    addr: SocketAddr,

    /// SQLite file holding saved towns (default: ~/.irke-town/irke-town.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Grid width in cells
    #[arg(long, default_value_t = 50)]
    grid_width: i32,

    /// Grid height in cells
    #[arg(long, default_value_t = 50)]
    grid_height: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        cli.grid_width > 0 && cli.grid_height > 0,
        "grid must be at least 1x1"
    );
    let db_path = cli.db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".irke-town")
            .join("irke-town.db")
    });
    let grid = GridConfig {
        width: cli.grid_width,
        height: cli.grid_height,
        ..GridConfig::default()
    };

    irke_town_server::serve(cli.addr, db_path, grid).await
}
