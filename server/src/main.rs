use clap::Parser;
use log::{error, info};
use server::config::GameConfig;
use server::network::Server;
use std::path::PathBuf;

/// Main-method of the application.
/// Loads the configuration, applies command-line overrides, then runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "3000")]
        port: u16,
        /// JSON configuration file
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Grid width in sectors
        #[clap(long)]
        width: Option<u32>,
        /// Grid height in sectors
        #[clap(long)]
        height: Option<u32>,
        /// Number of trading posts to place
        #[clap(long)]
        posts: Option<usize>,
        /// Seed for universe generation
        #[clap(long)]
        seed: Option<u64>,
        /// Game time speed-up relative to wall time
        #[clap(long)]
        time_acceleration: Option<f64>,
        /// Maximum concurrent connections
        #[clap(long)]
        max_clients: Option<usize>,
    }

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GameConfig::from_file(path)?,
        None => GameConfig::default(),
    };

    if let Some(width) = args.width {
        config.universe.width = width;
    }
    if let Some(height) = args.height {
        config.universe.height = height;
    }
    if let Some(posts) = args.posts {
        config.universe.trading_post_count = posts;
    }
    if args.seed.is_some() {
        config.universe.seed = args.seed;
    }
    if let Some(acceleration) = args.time_acceleration {
        config.time_acceleration = acceleration;
    }
    if let Some(max_clients) = args.max_clients {
        config.server.max_clients = max_clients;
    }
    config.validate()?;

    info!(
        "Starting server: {}x{} grid, {} trading posts, time x{}",
        config.universe.width,
        config.universe.height,
        config.universe.trading_post_count,
        config.time_acceleration
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
