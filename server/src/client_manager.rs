//! Connection registry for the game server
//!
//! This module tracks every open WebSocket connection, including:
//! - Connection lifecycle (connecting, active, removed)
//! - The wire codec each client negotiated at handshake
//! - Capacity limits on concurrent connections
//! - Delivery of addressed session messages to the right clients
//!
//! The registry never touches game state. It only knows how to reach a
//! connection; which player a connection controls is the session's business.

use crate::session::{Outbound, Recipient};
use log::{debug, info, warn};
use shared::{ConnectionId, Frame, WireCodec};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake done, player not created yet
    Connecting,
    /// Player joined, receives broadcasts
    Active,
}

/// A connected client and the channel feeding its writer task
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Codec used for frames sent to this client
    pub codec: WireCodec,
    pub state: ConnectionState,
    pub connected_at: Instant,
    /// Last time a request arrived from this client
    pub last_seen: Instant,
    pub messages_received: u64,
    outbound: UnboundedSender<Frame>,
}

impl Client {
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        codec: WireCodec,
        outbound: UnboundedSender<Frame>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            codec,
            state: ConnectionState::Connecting,
            connected_at: now,
            last_seen: now,
            messages_received: 0,
            outbound,
        }
    }

    /// Queues a frame for the writer task
    ///
    /// Returns false if the writer is gone. The reader side of the same
    /// connection reports the disconnect, so nothing else is done here.
    pub fn send(&self, frame: Frame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    /// True when nothing, not even a pong, has arrived within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }
}

/// Manages all open connections and fans out session messages
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ConnectionId, Client>,
    /// Next available connection ID
    next_client_id: ConnectionId,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Connection IDs start from 1 and are never reused while the server runs.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        codec: WireCodec,
        outbound: UnboundedSender<Frame>,
    ) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            warn!("Rejecting connection from {}: server full", addr);
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {} ({:?})", client_id, addr, codec);
        self.clients
            .insert(client_id, Client::new(client_id, addr, codec, outbound));

        Some(client_id)
    }

    /// Marks a connection as joined so it starts receiving broadcasts
    pub fn mark_active(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.state = ConnectionState::Active;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, client_id: ConnectionId) -> bool {
        self.clients
            .get(&client_id)
            .map(|client| client.state == ConnectionState::Active)
            .unwrap_or(false)
    }

    /// Updates activity bookkeeping. Returns false for unknown connections.
    pub fn record_message(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                client.messages_received += 1;
                true
            }
            None => false,
        }
    }

    /// Notes that a frame of any kind arrived. Returns false for unknown
    /// connections.
    pub fn record_activity(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes connections that have been silent for longer than `timeout`
    ///
    /// Returns the removed ids so their players can be cleaned up.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ConnectionId> {
        let mut timed_out: Vec<ConnectionId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();
        timed_out.sort_unstable();

        for client_id in &timed_out {
            warn!("Client {} timed out after {:?} of silence", client_id, timeout);
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Removes a connection
    ///
    /// Returns true if the client was found and removed, false if it was
    /// already gone.
    pub fn remove_client(&mut self, client_id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {:?} ({} messages)",
                client.id,
                client.connected_at.elapsed(),
                client.messages_received
            );
            true
        } else {
            false
        }
    }

    pub fn get(&self, client_id: ConnectionId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Resolves a recipient to the active connections it covers
    pub fn recipients(&self, recipient: &Recipient) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = match recipient {
            Recipient::Connection(id) => vec![*id],
            Recipient::All => self.clients.keys().copied().collect(),
            Recipient::AllExcept(excluded) => self
                .clients
                .keys()
                .copied()
                .filter(|id| id != excluded)
                .collect(),
            Recipient::Connections(ids) => ids.clone(),
        };

        ids.retain(|id| self.is_active(*id));
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Encodes and queues one session message
    ///
    /// The message is encoded at most once per codec in use. Returns the
    /// number of clients it was queued for.
    pub fn deliver(&self, outbound: &Outbound) -> usize {
        let mut encoded: HashMap<WireCodec, Frame> = HashMap::new();
        let mut delivered = 0;

        for client_id in self.recipients(&outbound.recipient) {
            let Some(client) = self.clients.get(&client_id) else {
                continue;
            };

            if !encoded.contains_key(&client.codec) {
                match client.codec.encode(&outbound.message) {
                    Ok(frame) => {
                        encoded.insert(client.codec, frame);
                    }
                    Err(e) => {
                        warn!(
                            "Failed to encode {} for {:?}: {}",
                            outbound.message.event_name(),
                            client.codec,
                            e
                        );
                        continue;
                    }
                }
            }

            if let Some(frame) = encoded.get(&client.codec) {
                if client.send(frame.clone()) {
                    delivered += 1;
                } else {
                    debug!("Client {} writer closed, dropping {}", client_id, outbound.message.event_name());
                }
            }
        }

        delivered
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
