//! Server network layer: WebSocket transport and the single-writer event loop
//!
//! Each connection gets a reader task and a writer task. Neither touches game
//! state; readers decode requests into `NetworkEvent`s for the main loop, and
//! writers drain a per-connection channel of encoded frames. The main loop
//! owns the `GameSession` and processes one event at a time, so every request
//! sees and leaves a consistent world.
//!
//! Any inbound frame, pongs included, counts as a sign of life. Connections
//! silent for `missed_heartbeats` heartbeat periods are dropped by the main
//! loop, which closes their outbound channel and with it the socket.

use crate::client_manager::ClientManager;
use crate::clock::SystemClock;
use crate::config::{GameConfig, ServerConfig};
use crate::session::{GameSession, Outbound};
use crate::session_log::LogSink;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_frame, ClientMessage, ConnectionId, Frame, ServerMessage, WireCodec};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_tungstenite::tungstenite::handshake::server::{
    Callback, ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::Message;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    ClientConnected {
        addr: SocketAddr,
        codec: WireCodec,
        outbound: mpsc::UnboundedSender<Frame>,
        /// Receives the assigned id, or None when the server is full
        assigned: oneshot::Sender<Option<ConnectionId>>,
    },
    MessageReceived {
        client_id: ConnectionId,
        message: ClientMessage,
    },
    /// Control or unreadable frame: no request, but the peer is alive
    ClientActivity {
        client_id: ConnectionId,
    },
    ClientDisconnected {
        client_id: ConnectionId,
    },
}

/// Main server coordinating connections and the game session
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    session: GameSession,
    settings: ServerConfig,

    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    /// Binds `addr` and generates a universe from `config`.
    pub async fn new(addr: &str, config: GameConfig) -> Result<Self, ServerError> {
        let clock = SystemClock::new(config.time_acceleration);
        let settings = config.server.clone();
        let session = GameSession::generate(config, Box::new(clock), Box::new(LogSink))?;
        Self::with_session(addr, session, settings).await
    }

    /// Binds `addr` around an already built session.
    pub async fn with_session(
        addr: &str,
        session: GameSession,
        settings: ServerConfig,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(settings.max_clients),
            session,
            settings,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts TCP connections and upgrades them
    fn spawn_acceptor(&self, listener: TcpListener) {
        let events = self.event_tx.clone();
        let heartbeat = self.settings.heartbeat_interval();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted TCP connection from {}", addr);
                        tokio::spawn(handle_connection(stream, addr, events.clone(), heartbeat));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Applies one network event to the session and queues the results
    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::ClientConnected {
                addr,
                codec,
                outbound,
                assigned,
            } => {
                let client_id = self.clients.add_client(addr, codec, outbound);

                if assigned.send(client_id).is_err() {
                    // Connection task ended before hearing back
                    if let Some(client_id) = client_id {
                        self.clients.remove_client(&client_id);
                    }
                    return;
                }

                if let Some(client_id) = client_id {
                    self.clients.mark_active(client_id);
                    let outbound = self.session.handle_connect(client_id);
                    self.dispatch(outbound);
                }
            }

            NetworkEvent::MessageReceived { client_id, message } => {
                if !self.clients.record_message(client_id) {
                    warn!("Message from unregistered client {}", client_id);
                    return;
                }

                debug!("Client {} sent {:?}", client_id, message);
                let outbound = self.session.handle_message(client_id, message);
                self.dispatch(outbound);
            }

            NetworkEvent::ClientActivity { client_id } => {
                self.clients.record_activity(client_id);
            }

            NetworkEvent::ClientDisconnected { client_id } => {
                if self.clients.remove_client(&client_id) {
                    let outbound = self.session.handle_disconnect(client_id);
                    self.dispatch(outbound);
                }
            }
        }
    }

    /// Drops connections that stopped answering heartbeats
    fn sweep_idle_clients(&mut self, timeout: Duration) {
        for client_id in self.clients.check_timeouts(timeout) {
            let outbound = self.session.handle_disconnect(client_id);
            self.dispatch(outbound);
        }
    }

    fn dispatch(&self, outbound: Vec<Outbound>) {
        for message in &outbound {
            let delivered = self.clients.deliver(message);
            debug!(
                "Queued {} for {} client(s)",
                message.message.event_name(),
                delivered
            );
        }
    }

    fn log_status(&self) {
        let world = self.session.world();
        info!(
            "Status: {} connections, {} players, game time {}",
            self.clients.len(),
            world.player_count(),
            self.session.now()
        );
        for player in world.players() {
            let idle = self
                .clients
                .get(player.connection_id)
                .map(|client| client.idle_for())
                .unwrap_or_default();
            debug!(
                "  {} in sector {} with {} credits, {} energy, idle {:?}",
                player.name, player.current_sector, player.credits, player.energy, idle
            );
        }
    }

    /// Main server loop
    ///
    /// Runs until the event channel closes, which cannot happen while the
    /// server itself holds a sender; callers stop it by dropping the future.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = self.listener.take().ok_or("server is already running")?;
        self.spawn_acceptor(listener);

        let mut status_interval = interval(Duration::from_secs(self.settings.status_interval_secs));
        status_interval.tick().await;
        let mut sweep_interval = interval(self.settings.heartbeat_interval());
        sweep_interval.tick().await;
        let client_timeout = self.settings.client_timeout();

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = sweep_interval.tick() => {
                    self.sweep_idle_clients(client_timeout);
                },

                _ = status_interval.tick() => {
                    self.log_status();
                },
            }
        }

        Ok(())
    }
}

/// Reads the `codec` query parameter during the WebSocket handshake
struct CodecNegotiation<'a> {
    codec: &'a mut WireCodec,
}

impl Callback for CodecNegotiation<'_> {
    fn on_request(self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        *self.codec = WireCodec::from_query(request.uri().query());
        Ok(response)
    }
}

pub(crate) fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
    }
}

/// Drives one connection from handshake to disconnect
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<NetworkEvent>,
    heartbeat: Duration,
) {
    let mut codec = WireCodec::default();
    let ws_stream = match accept_hdr_async(stream, CodecNegotiation { codec: &mut codec }).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Frame>();
    // The client manager holds the only strong sender, so removing the
    // client closes the channel and stops the writer
    let replies = frame_tx.downgrade();
    let (assigned_tx, assigned_rx) = oneshot::channel();

    let connected = NetworkEvent::ClientConnected {
        addr,
        codec,
        outbound: frame_tx,
        assigned: assigned_tx,
    };
    if events.send(connected).is_err() {
        error!("Main loop gone, dropping connection from {}", addr);
        return;
    }

    let client_id = match assigned_rx.await {
        Ok(Some(client_id)) => client_id,
        _ => {
            if let Ok(frame) = codec.encode(&ServerMessage::error("Server full")) {
                let _ = ws_sender.send(frame_to_message(frame)).await;
            }
            let _ = ws_sender.close().await;
            return;
        }
    };

    // Writer: queued frames plus periodic pings
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = interval(heartbeat);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    if let Err(e) = ws_sender.send(frame_to_message(frame)).await {
                        debug!("Send to client {} failed: {}", client_id, e);
                        break;
                    }
                },

                _ = ping_interval.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        debug!("Heartbeat to client {} failed", client_id);
                        break;
                    }
                },
            }
        }

        let _ = ws_sender.close().await;
    });

    let reader = read_requests(client_id, codec, &mut ws_receiver, &events, &replies);
    let writer_done = tokio::select! {
        _ = reader => false,
        result = &mut writer => {
            if result.is_err() {
                debug!("Writer task for client {} panicked", client_id);
            }
            true
        },
    };

    // Ignored by the main loop when the client was already swept
    let _ = events.send(NetworkEvent::ClientDisconnected { client_id });

    if !writer_done {
        match tokio::time::timeout(heartbeat, &mut writer).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("Writer task for client {} panicked", client_id),
            Err(_) => {
                debug!("Writer for client {} did not finish, aborting", client_id);
                writer.abort();
            }
        }
    }
}

/// Decodes requests until the socket closes or the main loop goes away
async fn read_requests(
    client_id: ConnectionId,
    codec: WireCodec,
    ws_receiver: &mut SplitStream<WebSocketStream<TcpStream>>,
    events: &mpsc::UnboundedSender<NetworkEvent>,
    replies: &mpsc::WeakUnboundedSender<Frame>,
) {
    while let Some(result) = ws_receiver.next().await {
        let frame = match result {
            Ok(Message::Text(text)) => Frame::Text(text.to_string()),
            Ok(Message::Binary(bytes)) => Frame::Binary(bytes.to_vec()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                if events.send(NetworkEvent::ClientActivity { client_id }).is_err() {
                    break;
                }
                continue;
            }
            Err(e) => {
                debug!("Client {} read error: {}", client_id, e);
                break;
            }
        };

        let event = match decode_frame::<ClientMessage>(&frame) {
            Ok(message) => NetworkEvent::MessageReceived { client_id, message },
            Err(e) => {
                warn!("Malformed request from client {}: {}", client_id, e);
                let reply = ServerMessage::error(format!("Malformed request: {}", e));
                if let (Ok(frame), Some(sender)) = (codec.encode(&reply), replies.upgrade()) {
                    let _ = sender.send(frame);
                }
                NetworkEvent::ClientActivity { client_id }
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}
