//! # Tank Game Authority
//!
//! The authoritative process for the turn-based tank game. It owns the only
//! writable copy of the session, applies requests from connected players and
//! streams every resulting state change back to them.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! All canonical writes happen here. Clients send requests; the session
//! validates each one against its permission rules and either applies it or
//! reports why it was refused.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connection establishment and player registration
//! - Host designation (the oldest connection runs lobby requests)
//! - Disconnection and timeout handling, which kill the player's tank
//!
//! ### State Broadcasting
//! Every state event published by the session is broadcast as it happens.
//! A full snapshot is sent on connect and at a fixed interval so observers
//! that lost a datagram converge again.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Command-line arguments and the derived server and session settings.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, host order, request sequencing and timeouts.
//!
//! ### Network Module (`network`)
//! UDP socket handling and the main loop driving the session timer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server uses an event-driven architecture with internal async tasks that handle:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Processes outgoing packet queue and broadcasts
//! - **Timeout Checker**: Monitors client health and removes inactive connections
//! - **Main Loop**: Applies requests, advances the action-point timer and flushes events

pub mod client_manager;
pub mod config;
pub mod network;
