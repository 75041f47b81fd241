//! Command-line configuration for the authority process

use clap::Parser;
use log::info;
use shared::board::PlacementPolicy;
use shared::color::ColorPolicy;
use shared::{GameError, SessionConfig};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    pub tick_rate: u32,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "16")]
    pub max_clients: usize,

    /// Initial board width in tiles
    #[arg(long, default_value = "10")]
    pub width: i32,

    /// Initial board height in tiles
    #[arg(long, default_value = "10")]
    pub height: i32,

    /// Gap between tiles in world units
    #[arg(long, default_value = "0.1")]
    pub tile_gap: f32,

    /// Tile edge length in world units
    #[arg(long, default_value = "1.0")]
    pub tile_scale: f32,

    /// Seconds between action point grants
    #[arg(short, long, default_value = "10")]
    pub action_point_secs: f32,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    pub client_timeout_secs: u64,

    /// Spawn placement policy
    #[arg(long, default_value = "random")]
    pub placement: String,

    /// Tank color policy
    #[arg(long, default_value = "random")]
    pub colors: String,

    /// Seed for placement and colors
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    /// How often every client receives a full snapshot
    pub snapshot_interval: Duration,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> Result<Self, GameError> {
        let placement: PlacementPolicy = args.placement.parse()?;
        let color: ColorPolicy = args.colors.parse()?;
        let seed = args.seed.unwrap_or_else(rand::random);
        info!("Session seed {}", seed);

        Ok(Self {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_duration: Duration::from_secs_f32(1.0 / args.tick_rate.max(1) as f32),
            max_clients: args.max_clients,
            client_timeout: Duration::from_secs(args.client_timeout_secs),
            snapshot_interval: Duration::from_secs(1),
            session: SessionConfig {
                board_width: args.width,
                board_height: args.height,
                tile_scale: args.tile_scale,
                tile_gap: args.tile_gap,
                action_point_period: Duration::from_secs_f32(args.action_point_secs.max(0.1)),
                placement,
                color,
                seed: Some(seed),
            },
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_duration: Duration::from_millis(33),
            max_clients: 16,
            client_timeout: Duration::from_secs(5),
            snapshot_interval: Duration::from_secs(1),
            session: SessionConfig::default(),
        }
    }
}
