//! Connection roster for the authority
//!
//! This module tracks the transport side of every player:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Which connection is the lobby host
//! - Request sequencing so duplicated or stale datagrams are applied once
//! - Rejection counting to spot clients whose replica has drifted
//!
//! Game state itself lives in the session; the manager only knows addresses,
//! ids and activity timestamps.

use log::info;
use shared::protocol::MAX_PLAYERS;
use shared::ClientId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client as seen by the transport
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest request sequence number accepted so far
    pub last_sequence: u32,
    /// Requests from this client the session refused
    pub rejected_requests: u32,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_sequence: 0,
            rejected_requests: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Accepts a request sequence number if it is newer than any seen before
    ///
    /// Datagrams may be duplicated or reordered; only strictly increasing
    /// sequence numbers are applied.
    pub fn accept_sequence(&mut self, sequence: u32) -> bool {
        self.touch();
        if sequence <= self.last_sequence {
            return false;
        }
        self.last_sequence = sequence;
        true
    }

    /// Returns true if no packets have been received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Connections are remembered in join order; the oldest connection still
/// present is the host, whose lobby requests run with authority.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ClientId, Client>,
    /// Client ids in the order they connected
    join_order: Vec<ClientId>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is dropped
    timeout: Duration,
}

impl ClientManager {
    /// Creates a manager holding at most `max_clients`, capped at [`MAX_PLAYERS`]
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            join_order: Vec::new(),
            next_client_id: 1,
            max_clients: max_clients.min(MAX_PLAYERS),
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        self.join_order.push(client_id);

        Some(client_id)
    }

    /// Removes a client; returns false if it was already gone
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            self.join_order.retain(|id| id != client_id);
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: ClientId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// The oldest connection still present
    pub fn host(&self) -> Option<ClientId> {
        self.join_order.first().copied()
    }

    pub fn is_host(&self, client_id: ClientId) -> bool {
        self.host() == Some(client_id)
    }

    pub fn touch(&mut self, client_id: ClientId) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    /// Returns true if the request should be applied
    pub fn accept_request(&mut self, client_id: ClientId, sequence: u32) -> bool {
        self.clients
            .get_mut(&client_id)
            .map_or(false, |client| client.accept_sequence(sequence))
    }

    /// Counts a refused request and returns the client's running total
    pub fn record_rejection(&mut self, client_id: ClientId) -> u32 {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.rejected_requests += 1;
                client.rejected_requests
            }
            None => 0,
        }
    }

    /// Removes clients that have gone quiet and returns their ids
    pub fn check_timeouts(&mut self) -> Vec<ClientId> {
        let timeout = self.timeout;
        let timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_secs(5))
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(1, test_addr());

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.last_sequence, 0);
        assert_eq!(client.rejected_requests, 0);
    }

    #[test]
    fn test_capacity_is_capped() {
        let mut manager = manager(1000);
        for port in 0..MAX_PLAYERS as u16 {
            let addr: SocketAddr = format!("127.0.0.1:{}", 20000 + port).parse().unwrap();
            assert!(manager.add_client(addr).is_some());
        }

        let extra: SocketAddr = "127.0.0.1:30000".parse().unwrap();
        assert_eq!(manager.add_client(extra), None);
        assert_eq!(manager.len(), MAX_PLAYERS);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_sequence_filtering() {
        let mut client = Client::new(1, test_addr());

        assert!(client.accept_sequence(1));
        assert!(client.accept_sequence(3));
        assert!(!client.accept_sequence(3));
        assert!(!client.accept_sequence(2));
        assert!(client.accept_sequence(4));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = manager(3);

        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), Some(2));
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = manager(2);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        assert_eq!(manager.addr_of(client_id1), Some(test_addr()));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_host_passes_to_next_oldest() {
        let mut manager = manager(3);
        assert_eq!(manager.host(), None);

        let first = manager.add_client(test_addr()).unwrap();
        let second = manager.add_client(test_addr2()).unwrap();
        assert!(manager.is_host(first));
        assert!(!manager.is_host(second));

        manager.remove_client(&first);
        assert_eq!(manager.host(), Some(second));
    }

    #[test]
    fn test_accept_request_for_unknown_client() {
        let mut manager = manager(2);
        assert!(!manager.accept_request(42, 1));
        assert_eq!(manager.record_rejection(42), 0);
    }

    #[test]
    fn test_rejections_accumulate() {
        let mut manager = manager(2);
        let id = manager.add_client(test_addr()).unwrap();

        assert_eq!(manager.record_rejection(id), 1);
        assert_eq!(manager.record_rejection(id), 2);
    }

    #[test]
    fn test_check_timeouts_removes_quiet_clients() {
        let mut manager = ClientManager::new(4, Duration::from_millis(50));
        let quiet = manager.add_client(test_addr()).unwrap();
        let chatty = manager.add_client(test_addr2()).unwrap();

        manager.clients.get_mut(&quiet).unwrap().last_seen =
            Instant::now() - Duration::from_secs(1);

        assert_eq!(manager.check_timeouts(), vec![quiet]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.host(), Some(chatty));
    }
}
