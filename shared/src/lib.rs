pub mod pathfinding;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type SectorId = u32;
pub type PlayerId = Uuid;
pub type ConnectionId = u32;

pub const STARTING_SECTOR: SectorId = 1;
pub const PLAYER_NAME_RANGE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipType {
    Scout,
    Trader,
    Freighter,
}

impl ShipType {
    pub const ALL: [ShipType; 3] = [ShipType::Scout, ShipType::Trader, ShipType::Freighter];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingPostType {
    Mining,
    Agricultural,
    Industrial,
    Commercial,
    Starport,
}

impl TradingPostType {
    pub const ALL: [TradingPostType; 5] = [
        TradingPostType::Mining,
        TradingPostType::Agricultural,
        TradingPostType::Industrial,
        TradingPostType::Commercial,
        TradingPostType::Starport,
    ];

    /// Posts that sell cargo hold expansions.
    pub fn sells_cargo_upgrades(self) -> bool {
        matches!(self, TradingPostType::Starport | TradingPostType::Commercial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Move,
    Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerUpdateType {
    Joined,
    Left,
    Moved,
    Upgraded,
}

// ── Static catalogs ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPostInfo {
    pub name: String,
    pub base_profit: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipInfo {
    pub name: String,
    pub cargo_capacity: u32,
    pub energy_efficiency: f64,
    pub trade_multiplier: f64,
    pub price: u64,
    pub max_cargo_upgrades: u32,
}

/// Equipment that adds to a ship's trade multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipUpgrade {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trade_multiplier_bonus: f64,
    pub price: u64,
    pub required_ship: ShipType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalogs {
    pub trading_posts: BTreeMap<TradingPostType, TradingPostInfo>,
    pub ship_types: BTreeMap<ShipType, ShipInfo>,
    pub ship_upgrades: BTreeMap<String, ShipUpgrade>,
}

impl Catalogs {
    pub fn ship(&self, ship: ShipType) -> Option<&ShipInfo> {
        self.ship_types.get(&ship)
    }

    pub fn trading_post(&self, post_type: TradingPostType) -> Option<&TradingPostInfo> {
        self.trading_posts.get(&post_type)
    }

    pub fn upgrade(&self, upgrade_id: &str) -> Option<&ShipUpgrade> {
        self.ship_upgrades.get(upgrade_id)
    }
}

// ── World entities ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPost {
    #[serde(rename = "type")]
    pub post_type: TradingPostType,
    pub name: String,
    pub base_profit: u32,
    pub trade_efficiency: f64,
    pub last_regen_time: u64,
    pub description: String,
}

impl TradingPost {
    pub fn new(post_type: TradingPostType, info: &TradingPostInfo, now: u64) -> Self {
        Self {
            post_type,
            name: info.name.clone(),
            base_profit: info.base_profit,
            trade_efficiency: 1.0,
            last_regen_time: now,
            description: info.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub connections: Vec<SectorId>,
    pub players: Vec<PlayerId>,
    pub trading_post: Option<TradingPost>,
}

impl Sector {
    pub fn new(id: SectorId, x: u32, y: u32, connections: Vec<SectorId>) -> Self {
        Self {
            id,
            name: format!("Sector {}", id),
            x,
            y,
            connections,
            players: Vec::new(),
            trading_post: None,
        }
    }

    pub fn is_connected_to(&self, other: SectorId) -> bool {
        self.connections.contains(&other)
    }

    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains(player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub connection_id: ConnectionId,
    pub name: String,
    pub current_sector: SectorId,
    pub credits: u64,
    pub ship: ShipType,
    pub ship_upgrades: Vec<String>,
    pub cargo_upgrades: u32,
    pub energy: u32,
    pub last_energy_update: u64,
}

impl Player {
    pub fn new(
        id: PlayerId,
        connection_id: ConnectionId,
        name: String,
        credits: u64,
        energy: u32,
        now: u64,
    ) -> Self {
        Self {
            id,
            connection_id,
            name,
            current_sector: STARTING_SECTOR,
            credits,
            ship: ShipType::Scout,
            ship_upgrades: Vec::new(),
            cargo_upgrades: 0,
            energy,
            last_energy_update: now,
        }
    }

    pub fn owns_upgrade(&self, upgrade_id: &str) -> bool {
        self.ship_upgrades.iter().any(|id| id == upgrade_id)
    }
}

// ── Client → server ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    MoveTo { target_sector_id: SectorId },
    Trade,
    #[serde(rename_all = "camelCase")]
    UpgradeShip { ship_type: ShipType },
    BuyCargoUpgrade,
    #[serde(rename_all = "camelCase")]
    BuyUpgrade { upgrade_id: String },
}

// ── Server → client ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedData {
    pub player_id: PlayerId,
    pub player: Player,
    pub sectors: BTreeMap<SectorId, Sector>,
    pub trading_posts: BTreeMap<TradingPostType, TradingPostInfo>,
    pub ship_types: BTreeMap<ShipType, ShipInfo>,
    pub ship_upgrades: BTreeMap<String, ShipUpgrade>,
}

impl PlayerJoinedData {
    /// Catalogs are sent as top-level fields next to the player.
    pub fn new(player: Player, sectors: BTreeMap<SectorId, Sector>, catalogs: Catalogs) -> Self {
        Self {
            player_id: player.id,
            player,
            sectors,
            trading_posts: catalogs.trading_posts,
            ship_types: catalogs.ship_types,
            ship_upgrades: catalogs.ship_upgrades,
        }
    }

    pub fn catalogs(&self) -> Catalogs {
        Catalogs {
            trading_posts: self.trading_posts.clone(),
            ship_types: self.ship_types.clone(),
            ship_upgrades: self.ship_upgrades.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateData {
    #[serde(rename = "type")]
    pub update_type: PlayerUpdateType,
    pub player: Player,
    pub sectors: BTreeMap<SectorId, Sector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResultData {
    pub profit: u64,
    pub new_efficiency: f64,
    pub player: Player,
    pub trading_post_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTradedData {
    pub player_name: String,
    pub profit: u64,
    pub trading_post_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipUpgradeResultData {
    pub success: bool,
    pub new_ship: ShipType,
    pub player: Player,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoUpgradeResultData {
    pub success: bool,
    pub cost: u64,
    pub new_cargo_capacity: u32,
    pub player: Player,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePurchaseResultData {
    pub success: bool,
    pub upgrade: ShipUpgrade,
    pub player: Player,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    PlayerJoined(PlayerJoinedData),
    PlayerUpdate(PlayerUpdateData),
    TradeResult(TradeResultData),
    PlayerTraded(PlayerTradedData),
    ShipUpgradeResult(ShipUpgradeResultData),
    CargoUpgradeResult(CargoUpgradeResultData),
    UpgradePurchaseResult(UpgradePurchaseResultData),
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Event name as seen by browser clients.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::PlayerJoined(_) => "playerJoined",
            ServerMessage::PlayerUpdate(_) => "playerUpdate",
            ServerMessage::TradeResult(_) => "tradeResult",
            ServerMessage::PlayerTraded(_) => "playerTraded",
            ServerMessage::ShipUpgradeResult(_) => "shipUpgradeResult",
            ServerMessage::CargoUpgradeResult(_) => "cargoUpgradeResult",
            ServerMessage::UpgradePurchaseResult(_) => "upgradePurchaseResult",
            ServerMessage::Error { .. } => "error",
        }
    }
}

// ── Wire codec ────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode codec: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Frame payload independent of the transport's message type.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Encoding a connection uses for outbound frames.
///
/// Browser clients speak JSON over text frames; native clients may ask for
/// the compact bincode form over binary frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireCodec {
    #[default]
    Json,
    Bincode,
}

impl WireCodec {
    /// Picks the codec from a handshake query string such as `codec=bincode`.
    pub fn from_query(query: Option<&str>) -> Self {
        let requested = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "codec")
            .map(|(_, value)| value);

        match requested {
            Some(value) if value.eq_ignore_ascii_case("bincode") => WireCodec::Bincode,
            _ => WireCodec::Json,
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Frame, CodecError> {
        match self {
            WireCodec::Json => Ok(Frame::Text(serde_json::to_string(value)?)),
            WireCodec::Bincode => Ok(Frame::Binary(bincode::serialize(value)?)),
        }
    }
}

/// Decodes a frame of either kind, regardless of the negotiated codec.
pub fn decode_frame<T: for<'de> Deserialize<'de>>(frame: &Frame) -> Result<T, CodecError> {
    match frame {
        Frame::Text(text) => Ok(serde_json::from_str(text)?),
        Frame::Binary(bytes) => Ok(bincode::deserialize(bytes)?),
    }
}
