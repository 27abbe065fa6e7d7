use crate::config::GameConfig;
use crate::economy::{place_trading_posts, standard_catalogs, update_efficiency};
use crate::error::WorldError;
use crate::galaxy::generate_sectors;
use log::{info, warn};
use rand::Rng;
use shared::{Catalogs, ConnectionId, Player, PlayerId, Sector, SectorId, TradingPost, STARTING_SECTOR};
use std::collections::{BTreeMap, HashMap};

/// Authoritative world state: the sector graph, connected players and the
/// static catalogs.
///
/// Only the session handler mutates it. Sector occupancy and
/// `Player::current_sector` are kept in step by `add_player`,
/// `remove_player` and `relocate_player`.
#[derive(Debug)]
pub struct World {
    pub(crate) sectors: BTreeMap<SectorId, Sector>,
    pub(crate) players: HashMap<PlayerId, Player>,
    pub(crate) catalogs: Catalogs,
    pub(crate) config: GameConfig,
}

impl World {
    /// Builds the grid and scatters trading posts over it.
    pub fn generate<R: Rng>(config: GameConfig, now: u64, rng: &mut R) -> Result<Self, WorldError> {
        let universe = &config.universe;
        let mut sectors = generate_sectors(universe.width, universe.height)?;
        let catalogs = standard_catalogs();

        let placed = place_trading_posts(
            &mut sectors,
            &catalogs,
            universe.trading_post_count,
            universe.placement_attempts_per_post,
            now,
            rng,
        );

        info!(
            "Generated {}x{} universe: {} sectors, {} trading posts",
            universe.width,
            universe.height,
            sectors.len(),
            placed
        );

        Self::from_parts(sectors, catalogs, config)
    }

    /// Wraps an existing sector map. The starting sector must exist.
    pub fn from_parts(
        sectors: BTreeMap<SectorId, Sector>,
        catalogs: Catalogs,
        config: GameConfig,
    ) -> Result<Self, WorldError> {
        if !sectors.contains_key(&STARTING_SECTOR) {
            return Err(WorldError::MissingStartingSector(STARTING_SECTOR));
        }

        Ok(Self {
            sectors,
            players: HashMap::new(),
            catalogs,
            config,
        })
    }

    pub fn sectors(&self) -> &BTreeMap<SectorId, Sector> {
        &self.sectors
    }

    pub fn sector(&self, sector_id: SectorId) -> Option<&Sector> {
        self.sectors.get(&sector_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn find_player_by_connection(&self, connection_id: ConnectionId) -> Option<PlayerId> {
        self.players
            .values()
            .find(|player| player.connection_id == connection_id)
            .map(|player| player.id)
    }

    /// Registers a player and places it in its current sector, falling back to
    /// the starting sector if that one does not exist.
    pub fn add_player(&mut self, mut player: Player) {
        if !self.sectors.contains_key(&player.current_sector) {
            warn!(
                "Player {} placed in unknown sector {}, using sector {}",
                player.id, player.current_sector, STARTING_SECTOR
            );
            player.current_sector = STARTING_SECTOR;
        }

        if let Some(sector) = self.sectors.get_mut(&player.current_sector) {
            if !sector.has_player(&player.id) {
                sector.players.push(player.id);
            }
        }

        info!("Added player {} ({}) in sector {}", player.name, player.id, player.current_sector);
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Player> {
        let player = self.players.remove(player_id)?;
        if let Some(sector) = self.sectors.get_mut(&player.current_sector) {
            sector.players.retain(|id| id != player_id);
        }
        info!("Removed player {} ({})", player.name, player.id);
        Some(player)
    }

    pub(crate) fn player_mut(&mut self, player_id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(player_id)
    }

    /// Moves occupancy from the player's current sector to `target`.
    /// Returns false without changes if either is unknown.
    pub(crate) fn relocate_player(&mut self, player_id: &PlayerId, target: SectorId) -> bool {
        if !self.sectors.contains_key(&target) {
            return false;
        }
        let Some(player) = self.players.get_mut(player_id) else {
            return false;
        };

        let origin = player.current_sector;
        player.current_sector = target;

        if let Some(sector) = self.sectors.get_mut(&origin) {
            sector.players.retain(|id| id != player_id);
        }
        if let Some(sector) = self.sectors.get_mut(&target) {
            if !sector.has_player(player_id) {
                sector.players.push(*player_id);
            }
        }
        true
    }

    pub(crate) fn trading_post_mut(&mut self, sector_id: SectorId) -> Option<&mut TradingPost> {
        self.sectors.get_mut(&sector_id)?.trading_post.as_mut()
    }

    /// Brings every post's efficiency up to `now`.
    pub fn refresh_trading_posts(&mut self, now: u64) {
        let economy = &self.config.economy;
        for post in self
            .sectors
            .values_mut()
            .filter_map(|sector| sector.trading_post.as_mut())
        {
            update_efficiency(post, now, economy);
        }
    }

    /// Full sector map with current efficiencies, as sent to clients.
    pub fn sector_snapshot(&mut self, now: u64) -> BTreeMap<SectorId, Sector> {
        self.refresh_trading_posts(now);
        self.sectors.clone()
    }

    /// Connections of everyone in `sector_id` except `exclude`.
    pub fn sector_mates(&self, sector_id: SectorId, exclude: &PlayerId) -> Vec<ConnectionId> {
        let Some(sector) = self.sectors.get(&sector_id) else {
            return Vec::new();
        };

        sector
            .players
            .iter()
            .filter(|id| *id != exclude)
            .filter_map(|id| self.players.get(id))
            .map(|player| player.connection_id)
            .collect()
    }

    /// Every player sits in exactly one sector, the one it points at.
    pub fn occupancy_consistent(&self) -> bool {
        let listed: usize = self.sectors.values().map(|sector| sector.players.len()).sum();
        if listed != self.players.len() {
            return false;
        }

        self.players.values().all(|player| {
            self.sectors
                .get(&player.current_sector)
                .map(|sector| sector.players.iter().filter(|id| **id == player.id).count() == 1)
                .unwrap_or(false)
        })
    }
}
