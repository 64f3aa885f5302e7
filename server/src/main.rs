use clap::Parser;
use log::{info, warn};
use server::config;
use server::network::Server;
use server::players::PlayerRegistry;
use server::simulation::{SaveConfig, Simulation};
use server::snapshot;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game configuration (JSON)
    #[arg(short = 'c', long)]
    config_file: PathBuf,

    /// Tick period in milliseconds; without it the game only advances on client tick requests
    #[arg(short = 't', long)]
    tick_period: Option<u64>,

    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Spawn dogs at random points on the roads
    #[arg(long)]
    randomize_spawn_points: bool,

    /// File to restore the game from at startup and save it to on shutdown
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Game time in milliseconds between automatic saves
    #[arg(long, requires = "state_file")]
    save_state_period: Option<u64>,

    /// Maximum number of concurrent players
    #[arg(short = 'm', long, default_value = "64")]
    max_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut game = config::load_game(&args.config_file, args.randomize_spawn_points)?;
    info!(
        "Loaded {} maps from {}",
        game.maps().len(),
        args.config_file.display()
    );

    let mut players = PlayerRegistry::new(args.max_players);
    if let Some(state_file) = &args.state_file {
        if state_file.exists() {
            let saved = snapshot::load_from_file(state_file)?;
            snapshot::restore(saved, &mut game, &mut players)?;
            info!(
                "Restored {} players from {}",
                players.len(),
                state_file.display()
            );
        } else {
            warn!("State file {} not found, starting fresh", state_file.display());
        }
    }

    let save = args.state_file.map(|state_file| SaveConfig {
        state_file,
        period: args.save_state_period.map(Duration::from_millis),
    });
    let tick_period = args.tick_period.map(Duration::from_millis);
    let simulation = Simulation::new(game, players, tick_period.is_some(), save);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, simulation, tick_period).await?;

    match tick_period {
        Some(period) => info!("Ticking every {}ms", period.as_millis()),
        None => info!("Automatic ticking disabled; waiting for tick requests"),
    }

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
