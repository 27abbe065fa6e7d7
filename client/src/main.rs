use clap::Parser;
use client::network::Client;
use log::{info, warn};
use shared::WireCodec;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Sector to travel to, one hop per request
    #[arg(short = 'g', long)]
    goto: Option<u32>,

    /// Trade once after arriving
    #[arg(short = 't', long)]
    trade: bool,

    /// Ask the server for bincode frames instead of JSON
    #[arg(long)]
    bincode: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let codec = if args.bincode {
        WireCodec::Bincode
    } else {
        WireCodec::Json
    };

    info!("Connecting to: {}", args.server);
    let mut client = Client::connect(&args.server, codec).await?;
    client.join().await?;

    if let Some(target) = args.goto {
        client.travel_to(target).await?;
    }

    if args.trade {
        if client.world.trading_post_here() {
            client.trade().await?;
        } else {
            warn!("No trading post in this sector, skipping trade");
        }
    }

    if let Some(player) = &client.world.player {
        info!(
            "{} in sector {}: {} credits, {} energy, {} earned this session",
            player.name,
            player.current_sector,
            player.credits,
            player.energy,
            client.world.total_profit
        );
    }

    client.close().await?;
    Ok(())
}
