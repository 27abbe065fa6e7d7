use log::{debug, info, warn};
use shared::pathfinding::find_path;
use shared::{
    Catalogs, ClientMessage, Player, PlayerId, PlayerUpdateType, Sector, SectorId, ServerMessage,
};
use std::collections::BTreeMap;

/// Local view of the universe, rebuilt from server events.
///
/// The server is authoritative; this cache never predicts. It only applies
/// what arrives and answers questions about it.
#[derive(Debug, Default)]
pub struct ClientWorld {
    pub player_id: Option<PlayerId>,
    pub player: Option<Player>,
    pub sectors: BTreeMap<SectorId, Sector>,
    pub catalogs: Option<Catalogs>,
    pub last_error: Option<String>,
    /// Credits earned from trades since joining
    pub total_profit: u64,
}

impl ClientWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_joined(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn current_sector(&self) -> Option<SectorId> {
        self.player.as_ref().map(|player| player.current_sector)
    }

    pub fn trading_post_here(&self) -> bool {
        self.current_sector()
            .and_then(|id| self.sectors.get(&id))
            .map(|sector| sector.trading_post.is_some())
            .unwrap_or(false)
    }

    fn is_me(&self, player: &Player) -> bool {
        self.player_id == Some(player.id)
    }

    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::PlayerJoined(data) => {
                info!(
                    "Joined as {} in sector {} ({} sectors)",
                    data.player.name,
                    data.player.current_sector,
                    data.sectors.len()
                );
                self.player_id = Some(data.player_id);
                self.player = Some(data.player.clone());
                self.sectors = data.sectors.clone();
                self.catalogs = Some(data.catalogs());
            }
            ServerMessage::PlayerUpdate(data) => {
                self.sectors = data.sectors.clone();
                if self.is_me(&data.player) {
                    self.player = Some(data.player.clone());
                } else if data.update_type != PlayerUpdateType::Moved {
                    debug!("{} {:?}", data.player.name, data.update_type);
                }
            }
            ServerMessage::TradeResult(data) => {
                self.total_profit += data.profit;
                self.player = Some(data.player.clone());
                if let Some(post) = self
                    .sectors
                    .get_mut(&data.player.current_sector)
                    .and_then(|sector| sector.trading_post.as_mut())
                {
                    post.trade_efficiency = data.new_efficiency;
                }
            }
            ServerMessage::PlayerTraded(data) => {
                debug!(
                    "{} earned {} at {}",
                    data.player_name, data.profit, data.trading_post_name
                );
            }
            ServerMessage::ShipUpgradeResult(data) => {
                self.player = Some(data.player.clone());
            }
            ServerMessage::CargoUpgradeResult(data) => {
                self.player = Some(data.player.clone());
            }
            ServerMessage::UpgradePurchaseResult(data) => {
                self.player = Some(data.player.clone());
            }
            ServerMessage::Error { message } => {
                warn!("Server error: {}", message);
                self.last_error = Some(message.clone());
            }
        }
    }

    /// Shortest route from the current sector over the cached map.
    pub fn route_to(&self, target: SectorId) -> Option<Vec<SectorId>> {
        find_path(&self.sectors, self.current_sector()?, target)
    }

    /// The `moveTo` for the next step toward `target`, or None when already
    /// there or unreachable.
    pub fn next_hop_request(&self, target: SectorId) -> Option<ClientMessage> {
        let route = self.route_to(target)?;
        let hop = *route.get(1)?;
        Some(ClientMessage::MoveTo {
            target_sector_id: hop,
        })
    }
}
