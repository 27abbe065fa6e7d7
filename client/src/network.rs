use crate::game::ClientWorld;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use shared::{decode_frame, ClientMessage, Frame, PlayerUpdateType, SectorId, ServerMessage, WireCodec};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Appends the codec query parameter the server reads at handshake.
pub fn server_url(base: &str, codec: WireCodec) -> String {
    match codec {
        WireCodec::Json => base.to_string(),
        WireCodec::Bincode => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{}{}codec=bincode", base, separator)
        }
    }
}

/// A WebSocket connection speaking the game protocol.
pub struct Connection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    codec: WireCodec,
}

impl Connection {
    pub async fn connect(url: &str, codec: WireCodec) -> Result<Self, ClientError> {
        let url = server_url(url, codec);
        let (ws, _) = connect_async(url.as_str()).await?;
        info!("Connected to {} ({:?})", url, codec);
        Ok(Self { ws, codec })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let frame = self.codec.encode(message)?;
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        };
        self.ws.send(message).await?;
        Ok(())
    }

    /// Next server event, or None once the server closes the connection.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(result) = self.ws.next().await {
            let frame = match result? {
                Message::Text(text) => Frame::Text(text.to_string()),
                Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
                Message::Close(_) => return Ok(None),
                _ => continue,
            };
            return Ok(Some(decode_frame(&frame)?));
        }
        Ok(None)
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Headless client: a connection plus the local cache it keeps current.
pub struct Client {
    connection: Connection,
    pub world: ClientWorld,
    response_timeout: Duration,
}

impl Client {
    pub async fn connect(url: &str, codec: WireCodec) -> Result<Self, ClientError> {
        Ok(Self {
            connection: Connection::connect(url, codec).await?,
            world: ClientWorld::new(),
            response_timeout: Duration::from_secs(10),
        })
    }

    /// Receives events, applying each to the cache, until `done` accepts
    /// one. A server `error` ends the wait with that error.
    async fn wait_for<F>(&mut self, done: F) -> Result<ServerMessage, ClientError>
    where
        F: Fn(&ClientWorld, &ServerMessage) -> bool,
    {
        loop {
            let message = timeout(self.response_timeout, self.connection.recv())
                .await
                .map_err(|_| "timed out waiting for the server")??
                .ok_or("server closed the connection")?;

            self.world.apply(&message);
            debug!("Received {}", message.event_name());

            if let ServerMessage::Error { message } = &message {
                return Err(message.clone().into());
            }
            if done(&self.world, &message) {
                return Ok(message);
            }
        }
    }

    pub async fn join(&mut self) -> Result<(), ClientError> {
        self.wait_for(|_, message| matches!(message, ServerMessage::PlayerJoined(_)))
            .await?;
        Ok(())
    }

    /// Takes one hop toward `target`. Returns the sector arrived in.
    pub async fn step_toward(&mut self, target: SectorId) -> Result<SectorId, ClientError> {
        let request = self
            .world
            .next_hop_request(target)
            .ok_or_else(|| format!("no route to sector {}", target))?;
        self.connection.send(&request).await?;

        self.wait_for(|world, message| match message {
            ServerMessage::PlayerUpdate(data) => {
                data.update_type == PlayerUpdateType::Moved && world.player_id == Some(data.player.id)
            }
            _ => false,
        })
        .await?;

        self.world
            .current_sector()
            .ok_or_else(|| "no player after move".into())
    }

    /// Walks hop by hop until `target` is reached.
    pub async fn travel_to(&mut self, target: SectorId) -> Result<(), ClientError> {
        while self.world.current_sector() != Some(target) {
            let sector = self.step_toward(target).await?;
            info!("Arrived in sector {}", sector);
        }
        Ok(())
    }

    /// Trades at the current sector and returns the credited profit.
    pub async fn trade(&mut self) -> Result<u64, ClientError> {
        self.connection.send(&ClientMessage::Trade).await?;
        match self
            .wait_for(|_, message| matches!(message, ServerMessage::TradeResult(_)))
            .await?
        {
            ServerMessage::TradeResult(data) => {
                info!(
                    "Traded at {} for {} credits (efficiency now {:.2})",
                    data.trading_post_name, data.profit, data.new_efficiency
                );
                Ok(data.profit)
            }
            other => Err(format!("unexpected {}", other.event_name()).into()),
        }
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        self.connection.send(message).await
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.connection.close().await
    }
}
