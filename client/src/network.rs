use crate::display;
use crate::input::{parse_command, Command, InputManager, HELP};
use crate::mirror::Mirror;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::protocol::{MAX_PACKET_SIZE, PROTOCOL_VERSION};
use shared::{GridPosition, Packet, Request, StateEvent};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    screen_name: String,
    client_id: Option<u32>,
    connected: bool,

    mirror: Mirror,
    input_manager: InputManager,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        screen_name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            screen_name: screen_name.to_string(),
            client_id: None,
            connected: false,
            mirror: Mirror::new(),
            input_manager: InputManager::new(),
        })
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            screen_name: self.screen_name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_request(&mut self, request: Request) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            println!("Not connected yet");
            return Ok(());
        }

        let packet = self.input_manager.package(request);
        self.send_packet(&packet).await
    }

    /// Applies an event to the mirror and returns its game info line
    ///
    /// The line is formatted first so it can still name a player the event
    /// removes.
    fn apply_event(&mut self, event: &StateEvent) -> Option<String> {
        debug!("Event: {:?}", event);
        let line = display::event_line(&self.mirror, event);
        self.mirror.apply_event(event);
        line
    }

    /// Applies one packet from the server; returns false once disconnected
    fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { client_id, is_host } => {
                if self.client_id.is_none() {
                    info!("Connected! Client ID: {}", client_id);
                } else if is_host {
                    println!("You are now the host");
                }
                self.client_id = Some(client_id);
                self.connected = true;
                self.mirror.set_identity(client_id, is_host);
            }

            Packet::Snapshot(snapshot) => {
                self.mirror.apply_snapshot(snapshot);
            }

            Packet::Event(event) => {
                if let Some(line) = self.apply_event(&event) {
                    println!("{}", line);
                }
            }

            Packet::Rejected { sequence, reason } => match self.input_manager.rejected(sequence) {
                Some(request) => println!("{:?} refused: {}", request, reason),
                None => println!("Request {} refused: {}", sequence, reason),
            },

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                return false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
        true
    }

    /// Runs one console command; returns false when the player quits
    async fn handle_line(&mut self, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                return Ok(true);
            }
        };

        match command {
            Command::Send(request) => self.send_request(request).await?,
            Command::AttackTile { x, y } => {
                match self.mirror.tank_at(GridPosition::new(x, y)) {
                    Some(target) => {
                        let target = target.id;
                        self.send_request(Request::Attack { target }).await?;
                    }
                    None => println!("No tank at {}", display::position_text(GridPosition::new(x, y))),
                }
            }
            Command::Status => print!("{}", display::status_text(&self.mirror)),
            Command::Roster => print!("{}", display::roster_text(&self.mirror.roster())),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Forwards console lines from stdin to the main loop
    fn spawn_console_reader() -> mpsc::UnboundedReceiver<String> {
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading console: {}", e);
                        break;
                    }
                }
            }
        });

        line_rx
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;
        println!("{}", HELP);

        let mut lines = Self::spawn_console_reader();
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut timer_interval = interval(Duration::from_millis(100));
        let mut last_timer_tick = Instant::now();

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet) {
                                        break;
                                    }
                                },
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.recv() => {
                    let Some(line) = line else {
                        break;
                    };
                    match self.handle_line(&line).await {
                        Ok(true) => {},
                        Ok(false) => break,
                        Err(e) => error!("Error sending request: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = timer_interval.tick() => {
                    let now = Instant::now();
                    self.mirror.advance(now.duration_since(last_timer_tick));
                    last_timer_tick = now;
                },
            }
        }

        if self.connected {
            self.send_packet(&Packet::Disconnect).await?;
        }
        info!("Client stopped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    async fn test_client() -> Client {
        assert_ok!(Client::new("127.0.0.1:9", "tester").await)
    }

    #[tokio::test]
    async fn test_connected_sets_identity() {
        let mut client = test_client().await;
        client.handle_packet(Packet::Connected {
            client_id: 3,
            is_host: false,
        });

        assert!(client.connected);
        assert_eq!(client.mirror().client_id(), Some(3));
        assert!(!client.mirror().is_host());
    }

    #[tokio::test]
    async fn test_disconnected_clears_connection() {
        let mut client = test_client().await;
        client.handle_packet(Packet::Connected {
            client_id: 3,
            is_host: true,
        });
        assert!(!client.handle_packet(Packet::Disconnected {
            reason: "Server full".into(),
        }));

        assert!(!client.connected);
        assert_eq!(client.client_id, None);
    }

    #[tokio::test]
    async fn test_events_reach_the_mirror() {
        let mut client = test_client().await;
        client.handle_packet(Packet::Event(StateEvent::BoardResized {
            width: 7,
            height: 9,
        }));
        assert_eq!(client.mirror().board_size(), (7, 9));
    }

    #[tokio::test]
    async fn test_leaving_player_is_named() {
        let mut client = test_client().await;
        client.apply_event(&StateEvent::PlayerJoined {
            player: 3,
            name: "zed".into(),
        });

        let line = client.apply_event(&StateEvent::PlayerLeft { player: 3 });
        assert_eq!(line.as_deref(), Some("zed left"));
        assert!(client.mirror().player(3).is_none());
    }

    #[tokio::test]
    async fn test_requests_wait_for_connection() {
        let mut client = test_client().await;
        assert!(assert_ok!(client.handle_line("start").await));
        assert!(assert_ok!(client.handle_line("nonsense").await));
        assert!(!assert_ok!(client.handle_line("quit").await));
    }
}
