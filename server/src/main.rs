use clap::Parser;
use log::info;
use server::config::{Args, ServerConfig};
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::from_args(args)?;

    info!("Starting server...");
    info!(
        "Board {}x{}, action point every {:.1}s, up to {} players",
        config.session.board_width,
        config.session.board_height,
        config.session.action_point_period.as_secs_f32(),
        config.max_clients
    );

    let mut server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
