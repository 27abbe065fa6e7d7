//! Request handling for connected players.
//!
//! `GameSession` is the only writer of the [`World`]. Every client request is
//! validated against a working copy of the requesting player; the copy is
//! written back only once every check has passed, so a rejected request never
//! leaves partial changes behind. Handlers return addressed [`Outbound`]
//! messages and leave delivery to the network layer.

use crate::clock::Clock;
use crate::config::GameConfig;
use crate::economy::{cargo_upgrade_cost, effective_cargo_capacity, execute_trade, payout};
use crate::energy::{consume_energy, update_energy};
use crate::error::{ActionError, WorldError};
use crate::session_log::{EventKind, EventSink, SessionEvent};
use crate::world::World;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use shared::pathfinding::next_hop;
use shared::{
    Action, CargoUpgradeResultData, ClientMessage, ConnectionId, Player, PlayerId,
    PlayerJoinedData, PlayerTradedData, PlayerUpdateData, PlayerUpdateType, SectorId,
    ServerMessage, ShipInfo, ShipType, ShipUpgradeResultData, TradeResultData, TradingPostType,
    UpgradePurchaseResultData, PLAYER_NAME_RANGE,
};
use uuid::Uuid;

/// Who should receive an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Connection(ConnectionId),
    All,
    AllExcept(ConnectionId),
    Connections(Vec<ConnectionId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to(connection_id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            recipient: Recipient::Connection(connection_id),
            message,
        }
    }

    pub fn all(message: ServerMessage) -> Self {
        Self {
            recipient: Recipient::All,
            message,
        }
    }

    pub fn all_except(connection_id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            recipient: Recipient::AllExcept(connection_id),
            message,
        }
    }

    pub fn connections(connection_ids: Vec<ConnectionId>, message: ServerMessage) -> Self {
        Self {
            recipient: Recipient::Connections(connection_ids),
            message,
        }
    }
}

type HandlerResult = Result<Vec<Outbound>, ActionError>;

pub struct GameSession {
    world: World,
    clock: Box<dyn Clock>,
    rng: StdRng,
    sink: Box<dyn EventSink>,
}

impl GameSession {
    pub fn new(world: World, clock: Box<dyn Clock>, rng: StdRng, sink: Box<dyn EventSink>) -> Self {
        Self {
            world,
            clock,
            rng,
            sink,
        }
    }

    /// Generates a fresh universe from `config`. A configured seed makes the
    /// layout and player names reproducible.
    pub fn generate(
        config: GameConfig,
        clock: Box<dyn Clock>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, WorldError> {
        let mut rng = match config.universe.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let now = clock.now();
        let world = World::generate(config, now, &mut rng)?;
        let trading_posts = world
            .sectors()
            .values()
            .filter(|sector| sector.trading_post.is_some())
            .count();

        let mut session = Self::new(world, clock, rng, sink);
        session.record(
            now,
            EventKind::System,
            None,
            json!({
                "event": "universeGenerated",
                "sectors": session.world.sectors().len(),
                "tradingPosts": trading_posts,
            }),
        );
        Ok(session)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Creates the player for a new connection.
    pub fn handle_connect(&mut self, connection_id: ConnectionId) -> Vec<Outbound> {
        if let Some(existing) = self.world.find_player_by_connection(connection_id) {
            warn!(
                "Connection {} already controls player {}, ignoring connect",
                connection_id, existing
            );
            return Vec::new();
        }

        let now = self.clock.now();
        let config = self.world.config();
        let name = format!("Player{}", self.rng.gen_range(0..PLAYER_NAME_RANGE));
        let player = Player::new(
            Uuid::new_v4(),
            connection_id,
            name,
            config.economy.starting_credits,
            config.energy.max_energy,
            now,
        );
        let player_id = player.id;
        self.world.add_player(player);

        let Some(player) = self.world.player(&player_id).cloned() else {
            warn!("Player {} vanished right after joining", player_id);
            return Vec::new();
        };

        self.record(
            now,
            EventKind::State,
            Some(player_id),
            json!({ "event": "joined", "name": player.name, "sector": player.current_sector }),
        );

        let sectors = self.world.sector_snapshot(now);
        let joined = ServerMessage::PlayerJoined(PlayerJoinedData::new(
            player.clone(),
            sectors.clone(),
            self.world.catalogs().clone(),
        ));
        let update = ServerMessage::PlayerUpdate(PlayerUpdateData {
            update_type: PlayerUpdateType::Joined,
            player,
            sectors,
        });

        vec![
            Outbound::to(connection_id, joined),
            Outbound::all_except(connection_id, update),
        ]
    }

    /// Applies one client request. Validation failures become an `error`
    /// event for the requester and change nothing.
    pub fn handle_message(
        &mut self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Vec<Outbound> {
        let Some(mut player) = self
            .world
            .find_player_by_connection(connection_id)
            .and_then(|id| self.world.player(&id))
            .cloned()
        else {
            warn!("Ignoring {:?} from unknown connection {}", message, connection_id);
            return Vec::new();
        };

        let now = self.clock.now();
        let player_id = player.id;
        // Results echo the player back, so bring energy up to date first
        update_energy(&mut player, now, &self.world.config().energy);

        let result = match message {
            ClientMessage::MoveTo { target_sector_id } => {
                self.move_to(player, target_sector_id, now)
            }
            ClientMessage::Trade => self.trade(connection_id, player, now),
            ClientMessage::UpgradeShip { ship_type } => {
                self.upgrade_ship(connection_id, player, ship_type, now)
            }
            ClientMessage::BuyCargoUpgrade => self.buy_cargo_upgrade(connection_id, player, now),
            ClientMessage::BuyUpgrade { upgrade_id } => {
                self.buy_upgrade(connection_id, player, &upgrade_id, now)
            }
        };

        match result {
            Ok(outbound) => outbound,
            Err(e) => {
                debug!("Rejected request from connection {}: {}", connection_id, e);
                self.record(
                    now,
                    EventKind::Action,
                    Some(player_id),
                    json!({ "event": "rejected", "reason": e.to_string() }),
                );
                vec![Outbound::to(connection_id, ServerMessage::error(e.to_string()))]
            }
        }
    }

    /// Removes the connection's player and tells everyone else.
    pub fn handle_disconnect(&mut self, connection_id: ConnectionId) -> Vec<Outbound> {
        let Some(mut player) = self
            .world
            .find_player_by_connection(connection_id)
            .and_then(|id| self.world.remove_player(&id))
        else {
            debug!("Connection {} closed without a player", connection_id);
            return Vec::new();
        };

        let now = self.clock.now();
        update_energy(&mut player, now, &self.world.config().energy);
        self.record(
            now,
            EventKind::State,
            Some(player.id),
            json!({ "event": "left", "name": player.name, "credits": player.credits }),
        );

        let sectors = self.world.sector_snapshot(now);
        vec![Outbound::all_except(
            connection_id,
            ServerMessage::PlayerUpdate(PlayerUpdateData {
                update_type: PlayerUpdateType::Left,
                player,
                sectors,
            }),
        )]
    }

    fn move_to(&mut self, mut player: Player, target: SectorId, now: u64) -> HandlerResult {
        if target == player.current_sector {
            return Ok(Vec::new());
        }
        if self.world.sector(target).is_none() {
            return Err(ActionError::InvalidSector(target));
        }

        let origin = player.current_sector;
        let adjacent = self
            .world
            .sector(origin)
            .map(|sector| sector.is_connected_to(target))
            .unwrap_or(false);
        let hop = if adjacent {
            target
        } else {
            next_hop(self.world.sectors(), origin, target).ok_or(ActionError::NoPath(target))?
        };

        let ship = self.ship_info(player.ship)?;
        let spent = consume_energy(&mut player, Action::Move, &ship, now, &self.world.config().energy)?;

        let player_id = player.id;
        self.commit(player);
        if !self.world.relocate_player(&player_id, hop) {
            warn!("Failed to relocate player {} to sector {}", player_id, hop);
            return Ok(Vec::new());
        }

        self.record(
            now,
            EventKind::Navigation,
            Some(player_id),
            json!({ "from": origin, "to": hop, "target": target, "energySpent": spent }),
        );

        let Some(player) = self.world.player(&player_id).cloned() else {
            return Ok(Vec::new());
        };
        let sectors = self.world.sector_snapshot(now);
        Ok(vec![Outbound::all(ServerMessage::PlayerUpdate(PlayerUpdateData {
            update_type: PlayerUpdateType::Moved,
            player,
            sectors,
        }))])
    }

    fn trade(&mut self, connection_id: ConnectionId, mut player: Player, now: u64) -> HandlerResult {
        let sector_id = player.current_sector;
        if self.post_type_at(sector_id).is_none() {
            return Err(ActionError::NoTradingPost);
        }

        let ship = self.ship_info(player.ship)?;
        consume_energy(&mut player, Action::Trade, &ship, now, &self.world.config().energy)?;

        let economy = self.world.config().economy.clone();
        let Some(post) = self.world.trading_post_mut(sector_id) else {
            return Err(ActionError::NoTradingPost);
        };
        let outcome = execute_trade(post, now, &economy);
        let trading_post_name = post.name.clone();

        let earned = payout(outcome.profit, &player, &ship, self.world.catalogs(), &economy);
        player.credits = player.credits.saturating_add(earned);
        self.commit(player.clone());

        self.record(
            now,
            EventKind::Trading,
            Some(player.id),
            json!({
                "sector": sector_id,
                "tradingPost": trading_post_name,
                "baseProfit": outcome.profit,
                "payout": earned,
                "newEfficiency": outcome.new_efficiency,
                "credits": player.credits,
            }),
        );

        let mates = self.world.sector_mates(sector_id, &player.id);
        let player_name = player.name.clone();

        let mut outbound = vec![Outbound::to(
            connection_id,
            ServerMessage::TradeResult(TradeResultData {
                profit: earned,
                new_efficiency: outcome.new_efficiency,
                player,
                trading_post_name: trading_post_name.clone(),
            }),
        )];
        if !mates.is_empty() {
            outbound.push(Outbound::connections(
                mates,
                ServerMessage::PlayerTraded(PlayerTradedData {
                    player_name,
                    profit: earned,
                    trading_post_name,
                }),
            ));
        }
        Ok(outbound)
    }

    fn upgrade_ship(
        &mut self,
        connection_id: ConnectionId,
        mut player: Player,
        ship_type: ShipType,
        now: u64,
    ) -> HandlerResult {
        if self.post_type_at(player.current_sector) != Some(TradingPostType::Starport) {
            return Err(ActionError::NotAtStarport);
        }
        if player.ship == ship_type {
            return Err(ActionError::ShipAlreadyOwned(ship_type));
        }
        let ship = self.ship_info(ship_type)?;
        if player.credits < ship.price {
            return Err(ActionError::InsufficientCredits {
                required: ship.price,
                available: player.credits,
            });
        }

        let previous = player.ship;
        player.credits -= ship.price;
        player.ship = ship_type;
        player.cargo_upgrades = player.cargo_upgrades.min(ship.max_cargo_upgrades);
        self.commit(player.clone());

        info!("{} switched from {:?} to {:?}", player.name, previous, ship_type);
        self.record(
            now,
            EventKind::Action,
            Some(player.id),
            json!({ "event": "shipUpgrade", "from": previous, "to": ship_type, "price": ship.price }),
        );

        let mut outbound = vec![Outbound::to(
            connection_id,
            ServerMessage::ShipUpgradeResult(ShipUpgradeResultData {
                success: true,
                new_ship: ship_type,
                player: player.clone(),
                message: Some(format!("Purchased {} for {} credits", ship.name, ship.price)),
            }),
        )];
        outbound.extend(self.upgraded_notice(&player, now));
        Ok(outbound)
    }

    fn buy_cargo_upgrade(
        &mut self,
        connection_id: ConnectionId,
        mut player: Player,
        now: u64,
    ) -> HandlerResult {
        let sells_cargo = self
            .post_type_at(player.current_sector)
            .map(TradingPostType::sells_cargo_upgrades)
            .unwrap_or(false);
        if !sells_cargo {
            return Err(ActionError::NotAtCargoOutfitter);
        }

        let ship = self.ship_info(player.ship)?;
        if player.cargo_upgrades >= ship.max_cargo_upgrades {
            return Err(ActionError::MaxCargoUpgrades);
        }

        let economy = &self.world.config().economy;
        let cost = cargo_upgrade_cost(player.cargo_upgrades, economy);
        if player.credits < cost {
            return Err(ActionError::InsufficientCredits {
                required: cost,
                available: player.credits,
            });
        }

        player.credits -= cost;
        player.cargo_upgrades += 1;
        let new_cargo_capacity = effective_cargo_capacity(&player, &ship, economy);
        self.commit(player.clone());

        self.record(
            now,
            EventKind::Action,
            Some(player.id),
            json!({ "event": "cargoUpgrade", "cost": cost, "capacity": new_cargo_capacity }),
        );

        let mut outbound = vec![Outbound::to(
            connection_id,
            ServerMessage::CargoUpgradeResult(CargoUpgradeResultData {
                success: true,
                cost,
                new_cargo_capacity,
                player: player.clone(),
                message: Some(format!("Cargo hold expanded to {} units", new_cargo_capacity)),
            }),
        )];
        outbound.extend(self.upgraded_notice(&player, now));
        Ok(outbound)
    }

    fn buy_upgrade(
        &mut self,
        connection_id: ConnectionId,
        mut player: Player,
        upgrade_id: &str,
        now: u64,
    ) -> HandlerResult {
        if self.post_type_at(player.current_sector) != Some(TradingPostType::Starport) {
            return Err(ActionError::NotAtStarport);
        }
        let upgrade = self
            .world
            .catalogs()
            .upgrade(upgrade_id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownUpgrade(upgrade_id.to_string()))?;
        if player.ship != upgrade.required_ship {
            return Err(ActionError::WrongShipForUpgrade {
                upgrade: upgrade.id,
                required: upgrade.required_ship,
            });
        }
        if player.owns_upgrade(&upgrade.id) {
            return Err(ActionError::UpgradeAlreadyOwned(upgrade.id));
        }
        if player.credits < upgrade.price {
            return Err(ActionError::InsufficientCredits {
                required: upgrade.price,
                available: player.credits,
            });
        }

        player.credits -= upgrade.price;
        player.ship_upgrades.push(upgrade.id.clone());
        self.commit(player.clone());

        self.record(
            now,
            EventKind::Action,
            Some(player.id),
            json!({ "event": "equipmentPurchase", "upgrade": upgrade.id, "price": upgrade.price }),
        );

        let message = Some(format!("Installed {}", upgrade.name));
        let mut outbound = vec![Outbound::to(
            connection_id,
            ServerMessage::UpgradePurchaseResult(UpgradePurchaseResultData {
                success: true,
                upgrade,
                player: player.clone(),
                message,
            }),
        )];
        outbound.extend(self.upgraded_notice(&player, now));
        Ok(outbound)
    }

    /// `playerUpdate{upgraded}` for everyone else in the player's sector.
    fn upgraded_notice(&mut self, player: &Player, now: u64) -> Option<Outbound> {
        let mates = self.world.sector_mates(player.current_sector, &player.id);
        if mates.is_empty() {
            return None;
        }

        let sectors = self.world.sector_snapshot(now);
        Some(Outbound::connections(
            mates,
            ServerMessage::PlayerUpdate(PlayerUpdateData {
                update_type: PlayerUpdateType::Upgraded,
                player: player.clone(),
                sectors,
            }),
        ))
    }

    fn post_type_at(&self, sector_id: SectorId) -> Option<TradingPostType> {
        self.world
            .sector(sector_id)?
            .trading_post
            .as_ref()
            .map(|post| post.post_type)
    }

    fn ship_info(&self, ship: ShipType) -> Result<ShipInfo, ActionError> {
        self.world
            .catalogs()
            .ship(ship)
            .cloned()
            .ok_or(ActionError::UnknownShip(ship))
    }

    /// Writes a validated working copy back. Occupancy is owned by the world,
    /// so the stored sector is kept.
    fn commit(&mut self, mut player: Player) {
        let player_id: PlayerId = player.id;
        match self.world.player_mut(&player_id) {
            Some(stored) => {
                player.current_sector = stored.current_sector;
                *stored = player;
            }
            None => warn!("Player {} missing from registry on commit", player_id),
        }
    }

    fn record(
        &mut self,
        now: u64,
        kind: EventKind,
        player_id: Option<PlayerId>,
        data: serde_json::Value,
    ) {
        self.sink.record(SessionEvent::new(now, kind, player_id, data));
    }
}
