//! Server network layer handling UDP communications and the session loop

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::protocol::{MAX_PACKET_SIZE, PROTOCOL_VERSION};
use shared::{Caller, ClientId, GameError, Packet, Request, Session, StateEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Rejections after which a client is sent a fresh snapshot
const RESYNC_AFTER_REJECTIONS: u32 = 5;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: ClientId },
    Shutdown,
}

/// Messages sent from the session loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ClientId>,
    },
}

/// Runs one player request against the session
///
/// Lobby requests from the host run with authority. Everything else runs on
/// behalf of the requesting client and is validated by the session.
pub fn apply_request(
    session: &mut Session,
    client_id: ClientId,
    is_host: bool,
    request: Request,
) -> shared::Result<()> {
    let lobby_caller = if is_host {
        Caller::Authority
    } else {
        Caller::Client(client_id)
    };

    match request {
        Request::SetName(name) => {
            session.set_player_name(Caller::Client(client_id), client_id, &name)?;
        }
        Request::StartGame => {
            session.start_game(lobby_caller)?;
        }
        Request::ResizeBoard { axis, delta } => {
            session.change_board_size(lobby_caller, axis, delta)?;
        }
        Request::Move { x, y } => session.request_move(client_id, x, y)?,
        Request::UpgradeRange => {
            if !session.request_upgrade_range(client_id)? {
                debug!("Client {} has no action point to spend on range", client_id);
            }
        }
        Request::Attack { target } => {
            session.request_attack(client_id, target)?;
        }
    }
    Ok(())
}

/// Authority process coordinating the session and every connection
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    session: Session,
    host: Option<ClientId>,
    tick_duration: Duration,
    snapshot_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
    events_rx: mpsc::UnboundedReceiver<StateEvent>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut session = Session::new(config.session.clone());
        session.subscribe(None, move |event: &StateEvent| {
            if events_tx.send(event.clone()).is_err() {
                debug!("Event queue closed, dropping {:?}", event);
            }
        });

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            session,
            host: None,
            tick_duration: config.tick_duration,
            snapshot_interval: config.snapshot_interval,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sender that can stop a running server with [`ServerMessage::Shutdown`]
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        if data.len() > MAX_PACKET_SIZE {
            warn!("Packet of {} bytes exceeds the datagram limit", data.len());
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<ClientId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn client_at(&self, addr: SocketAddr) -> Option<ClientId> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Processes incoming packets and applies them to the session
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                screen_name,
            } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Refusing {}: protocol version {} but server speaks {}",
                        addr, client_version, PROTOCOL_VERSION
                    );
                    let reason = format!(
                        "Protocol version mismatch (server {}, client {})",
                        PROTOCOL_VERSION, client_version
                    );
                    self.send_packet(Packet::Disconnected { reason }, addr);
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = self.client_at(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.disconnect_client(existing_id).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                let Some(client_id) = client_id else {
                    let reason = "Server full".to_string();
                    self.send_packet(Packet::Disconnected { reason }, addr);
                    return;
                };

                if let Err(e) = self.session.add_player(Caller::Authority, client_id) {
                    error!("Failed to add player {}: {}", client_id, e);
                }
                let screen_name = screen_name.trim();
                if !screen_name.is_empty() {
                    if let Err(e) = self.session.set_player_name(
                        Caller::Client(client_id),
                        client_id,
                        screen_name,
                    ) {
                        warn!("Could not name player {}: {}", client_id, e);
                    }
                }

                let is_host = {
                    let clients = self.clients.read().await;
                    clients.is_host(client_id)
                };
                if is_host {
                    info!("Client {} is the host", client_id);
                    self.host = Some(client_id);
                }

                self.send_packet(Packet::Connected { client_id, is_host }, addr);
                self.send_packet(Packet::Snapshot(self.session.snapshot()), addr);
            }

            Packet::Request { sequence, request } => {
                let Some(client_id) = self.client_at(addr).await else {
                    debug!("Request from unknown address {}", addr);
                    return;
                };

                let (accepted, is_host) = {
                    let mut clients = self.clients.write().await;
                    (
                        clients.accept_request(client_id, sequence),
                        clients.is_host(client_id),
                    )
                };
                if !accepted {
                    debug!("Dropping stale request {} from client {}", sequence, client_id);
                    return;
                }

                debug!("Client {} request {}: {:?}", client_id, sequence, request);
                if let Err(e) = apply_request(&mut self.session, client_id, is_host, request) {
                    self.reject(client_id, sequence, e, addr).await;
                }
            }

            Packet::Heartbeat => {
                if let Some(client_id) = self.client_at(addr).await {
                    let mut clients = self.clients.write().await;
                    clients.touch(client_id);
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.client_at(addr).await {
                    self.disconnect_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn reject(&mut self, client_id: ClientId, sequence: u32, error: GameError, addr: SocketAddr) {
        let rejections = {
            let mut clients = self.clients.write().await;
            clients.record_rejection(client_id)
        };
        warn!(
            "Rejected request {} from client {}: {}",
            sequence, client_id, error
        );

        if rejections % RESYNC_AFTER_REJECTIONS == 0 {
            warn!(
                "Client {} has had {} requests rejected, resending snapshot",
                client_id, rejections
            );
            self.send_packet(Packet::Snapshot(self.session.snapshot()), addr);
        }

        let reason = error.to_string();
        self.send_packet(Packet::Rejected { sequence, reason }, addr);
    }

    async fn disconnect_client(&mut self, client_id: ClientId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        self.remove_player(client_id);
        self.flush_events();
        self.announce_host_change().await;
    }

    fn remove_player(&mut self, client_id: ClientId) {
        match self.session.remove_player(Caller::Authority, client_id) {
            Ok(()) | Err(GameError::UnknownPlayer(_)) => {}
            Err(e) => error!("Failed to remove player {}: {}", client_id, e),
        }
    }

    /// Tells the oldest remaining client that it now hosts the lobby
    async fn announce_host_change(&mut self) {
        let host = {
            let clients = self.clients.read().await;
            clients
                .host()
                .and_then(|id| clients.addr_of(id).map(|addr| (id, addr)))
        };

        let host_id = host.map(|(id, _)| id);
        if host_id == self.host {
            return;
        }
        self.host = host_id;

        if let Some((client_id, addr)) = host {
            info!("Client {} is now the host", client_id);
            self.send_packet(
                Packet::Connected {
                    client_id,
                    is_host: true,
                },
                addr,
            );
        }
    }

    /// Broadcasts every state event the session published since the last flush
    fn flush_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            if let StateEvent::Notice { text, .. } = &event {
                info!("{}", text);
            }
            self.broadcast_packet(Packet::Event(event), None);
        }
    }

    /// Broadcasts a full snapshot so observers that lost events converge
    async fn broadcast_snapshot(&self) {
        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };

        if client_count == 0 {
            return;
        }

        self.broadcast_packet(Packet::Snapshot(self.session.snapshot()), None);
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let mut snapshot_interval = interval(self.snapshot_interval);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.remove_player(client_id);
                            self.flush_events();
                            self.announce_host_change().await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                    self.flush_events();
                },

                // Advance the action-point timer
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;

                    if let Err(e) = self.session.tick(Caller::Authority, elapsed) {
                        error!("Session tick failed: {}", e);
                    }
                    self.flush_events();
                },

                _ = snapshot_interval.tick() => {
                    self.broadcast_snapshot().await;
                },
            }
        }

        Ok(())
    }
}
