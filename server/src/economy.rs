//! Static economy data and the trading-post efficiency model.
//!
//! A trading post pays `base_profit x efficiency` per trade. Each trade
//! multiplies efficiency by the decay factor (never below the floor) and
//! efficiency climbs back linearly, reaching full recovery after
//! `full_regen_duration_ms` of game time. Repeatedly farming one post quickly
//! becomes worthless, which pushes players to travel.

use crate::config::EconomyConfig;
use log::{debug, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use shared::{
    Catalogs, Player, Sector, SectorId, ShipInfo, ShipType, ShipUpgrade, TradingPost,
    TradingPostInfo, TradingPostType,
};
use std::collections::BTreeMap;

/// The catalogs every generated universe uses.
pub fn standard_catalogs() -> Catalogs {
    let post = |name: &str, base_profit: u32, description: &str| TradingPostInfo {
        name: name.to_string(),
        base_profit,
        description: description.to_string(),
    };

    let trading_posts = BTreeMap::from([
        (
            TradingPostType::Mining,
            post("Mining Station", 50, "Ore haulers swap rumors of fresh veins"),
        ),
        (
            TradingPostType::Agricultural,
            post("Agricultural Port", 75, "Harvest schedules and crop futures"),
        ),
        (
            TradingPostType::Industrial,
            post("Industrial Complex", 100, "Factory quotas and supply shortages"),
        ),
        (
            TradingPostType::Commercial,
            post("Commercial Hub", 150, "Brokers trading price intelligence"),
        ),
        (
            TradingPostType::Starport,
            post("StarPort", 200, "Shipyards, outfitters and the richest contracts"),
        ),
    ]);

    let ship = |name: &str,
                cargo_capacity: u32,
                energy_efficiency: f64,
                trade_multiplier: f64,
                price: u64,
                max_cargo_upgrades: u32| ShipInfo {
        name: name.to_string(),
        cargo_capacity,
        energy_efficiency,
        trade_multiplier,
        price,
        max_cargo_upgrades,
    };

    let ship_types = BTreeMap::from([
        (ShipType::Scout, ship("Scout Ship", 10, 0.8, 1.0, 0, 3)),
        (ShipType::Trader, ship("Trader Vessel", 30, 1.0, 1.5, 5000, 5)),
        (ShipType::Freighter, ship("Heavy Freighter", 50, 1.5, 2.0, 15000, 8)),
    ]);

    let upgrades = [
        ShipUpgrade {
            id: "market-uplink".to_string(),
            name: "Market Uplink".to_string(),
            description: "Live price feeds for light hulls".to_string(),
            trade_multiplier_bonus: 0.25,
            price: 2500,
            required_ship: ShipType::Scout,
        },
        ShipUpgrade {
            id: "negotiation-suite".to_string(),
            name: "Negotiation Suite".to_string(),
            description: "Contract analysis for mid-size traders".to_string(),
            trade_multiplier_bonus: 0.3,
            price: 6000,
            required_ship: ShipType::Trader,
        },
        ShipUpgrade {
            id: "bulk-contracts".to_string(),
            name: "Bulk Contract License".to_string(),
            description: "Wholesale rates for heavy haulers".to_string(),
            trade_multiplier_bonus: 0.5,
            price: 12000,
            required_ship: ShipType::Freighter,
        },
    ];
    let ship_upgrades = upgrades
        .into_iter()
        .map(|upgrade| (upgrade.id.clone(), upgrade))
        .collect();

    Catalogs {
        trading_posts,
        ship_types,
        ship_upgrades,
    }
}

/// Relative odds of each post type once every type has one instance.
pub fn placement_weight(post_type: TradingPostType) -> u32 {
    match post_type {
        TradingPostType::Mining => 2,
        TradingPostType::Agricultural => 2,
        TradingPostType::Industrial => 3,
        TradingPostType::Commercial => 4,
        TradingPostType::Starport => 3,
    }
}

/// Scatters up to `target` trading posts over distinct sectors.
///
/// One post of every type is placed first, the rest are drawn by
/// `placement_weight`. All draws share a budget of
/// `target * attempts_per_post`; when it runs out the universe is left with
/// fewer posts instead of spinning on a saturated map. Returns the number
/// placed.
pub fn place_trading_posts<R: Rng>(
    sectors: &mut BTreeMap<SectorId, Sector>,
    catalogs: &Catalogs,
    target: usize,
    attempts_per_post: usize,
    now: u64,
    rng: &mut R,
) -> usize {
    let sector_ids: Vec<SectorId> = sectors.keys().copied().collect();
    if sector_ids.is_empty() || target == 0 {
        return 0;
    }

    let mut budget = target.saturating_mul(attempts_per_post.max(1));
    let mut placed = 0;

    for post_type in TradingPostType::ALL {
        if placed >= target {
            break;
        }
        while budget > 0 {
            budget -= 1;
            let sector_id = sector_ids[rng.gen_range(0..sector_ids.len())];
            if try_place(sectors, sector_id, post_type, catalogs, now) {
                placed += 1;
                break;
            }
        }
    }

    let weights: Vec<u32> = TradingPostType::ALL
        .iter()
        .map(|post_type| placement_weight(*post_type))
        .collect();
    let distribution = match WeightedIndex::new(&weights) {
        Ok(distribution) => distribution,
        Err(e) => {
            warn!("Invalid trading post weights: {}", e);
            return placed;
        }
    };

    while placed < target && budget > 0 {
        budget -= 1;
        let sector_id = sector_ids[rng.gen_range(0..sector_ids.len())];
        let post_type = TradingPostType::ALL[distribution.sample(rng)];
        if try_place(sectors, sector_id, post_type, catalogs, now) {
            placed += 1;
        }
    }

    if placed < target {
        warn!(
            "Placed {} of {} trading posts before running out of attempts",
            placed, target
        );
    } else {
        debug!("Placed {} trading posts", placed);
    }

    placed
}

fn try_place(
    sectors: &mut BTreeMap<SectorId, Sector>,
    sector_id: SectorId,
    post_type: TradingPostType,
    catalogs: &Catalogs,
    now: u64,
) -> bool {
    let Some(info) = catalogs.trading_post(post_type) else {
        return false;
    };
    let Some(sector) = sectors.get_mut(&sector_id) else {
        return false;
    };
    if sector.trading_post.is_some() {
        return false;
    }

    sector.name = format!("{} - {}", sector.name, info.name);
    sector.trading_post = Some(TradingPost::new(post_type, info, now));
    true
}

/// Applies linear regeneration up to `now`.
pub fn update_efficiency(post: &mut TradingPost, now: u64, config: &EconomyConfig) {
    let elapsed = now.saturating_sub(post.last_regen_time);
    let progress = (elapsed as f64 / config.full_regen_duration_ms as f64).min(1.0);

    post.trade_efficiency = (post.trade_efficiency + progress)
        .min(1.0)
        .max(config.min_efficiency);
    post.last_regen_time = post.last_regen_time.max(now);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeOutcome {
    /// Post profit before ship multipliers.
    pub profit: u64,
    pub new_efficiency: f64,
}

/// Regenerates, pays out at the current efficiency, then decays.
pub fn execute_trade(post: &mut TradingPost, now: u64, config: &EconomyConfig) -> TradeOutcome {
    update_efficiency(post, now, config);

    let profit = (post.base_profit as f64 * post.trade_efficiency).round() as u64;
    post.trade_efficiency = (post.trade_efficiency * config.decay_factor).max(config.min_efficiency);

    TradeOutcome {
        profit,
        new_efficiency: post.trade_efficiency,
    }
}

/// Ship multiplier plus owned equipment built for the current hull.
pub fn trade_multiplier(player: &Player, ship: &ShipInfo, catalogs: &Catalogs) -> f64 {
    let bonus: f64 = player
        .ship_upgrades
        .iter()
        .filter_map(|id| catalogs.upgrade(id))
        .filter(|upgrade| upgrade.required_ship == player.ship)
        .map(|upgrade| upgrade.trade_multiplier_bonus)
        .sum();

    ship.trade_multiplier + bonus
}

pub fn effective_cargo_capacity(player: &Player, ship: &ShipInfo, config: &EconomyConfig) -> u32 {
    ship.cargo_capacity + player.cargo_upgrades * config.cargo_capacity_per_upgrade
}

/// `1 + (effective - base capacity) x bonus per unit`.
pub fn cargo_bonus(player: &Player, ship: &ShipInfo, config: &EconomyConfig) -> f64 {
    let extra = effective_cargo_capacity(player, ship, config) - ship.cargo_capacity;
    1.0 + extra as f64 * config.cargo_bonus_per_unit
}

/// Credits the player actually receives for a trade.
pub fn payout(
    profit: u64,
    player: &Player,
    ship: &ShipInfo,
    catalogs: &Catalogs,
    config: &EconomyConfig,
) -> u64 {
    let multiplier = trade_multiplier(player, ship, catalogs) * cargo_bonus(player, ship, config);
    (profit as f64 * multiplier).round() as u64
}

/// Price of the next cargo hold upgrade after `owned` previous ones.
pub fn cargo_upgrade_cost(owned: u32, config: &EconomyConfig) -> u64 {
    let exponent = i32::try_from(owned).unwrap_or(i32::MAX);
    (config.cargo_upgrade_base_cost as f64 * config.cargo_upgrade_cost_multiplier.powi(exponent))
        .round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::generate_sectors;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn post(post_type: TradingPostType, now: u64) -> TradingPost {
        let catalogs = standard_catalogs();
        TradingPost::new(post_type, catalogs.trading_post(post_type).unwrap(), now)
    }

    fn scout_player() -> Player {
        Player::new(Uuid::new_v4(), 1, "Player7".to_string(), 1000, 2400, 0)
    }

    #[test]
    fn test_catalogs_cover_every_type() {
        let catalogs = standard_catalogs();
        for post_type in TradingPostType::ALL {
            assert!(catalogs.trading_post(post_type).is_some());
        }
        for ship in ShipType::ALL {
            assert!(catalogs.ship(ship).is_some());
        }
        for upgrade in catalogs.ship_upgrades.values() {
            assert!(catalogs.ship(upgrade.required_ship).is_some());
        }
    }

    #[test]
    fn test_base_profits_rise_with_post_value() {
        let catalogs = standard_catalogs();
        let profits: Vec<u32> = TradingPostType::ALL
            .iter()
            .map(|t| catalogs.trading_post(*t).unwrap().base_profit)
            .collect();
        assert_eq!(profits, vec![50, 75, 100, 150, 200]);
    }

    #[test]
    fn test_two_trades_decay() {
        let config = EconomyConfig::default();
        let mut post = post(TradingPostType::Industrial, 0);

        let first = execute_trade(&mut post, 0, &config);
        assert_eq!(first.profit, 100);
        assert_approx_eq!(first.new_efficiency, 0.85);

        let second = execute_trade(&mut post, 0, &config);
        assert_eq!(second.profit, 85);
        assert_approx_eq!(second.new_efficiency, 0.7225);
    }

    #[test]
    fn test_repeated_trades_are_non_increasing_and_floored() {
        let config = EconomyConfig::default();
        let mut post = post(TradingPostType::Starport, 0);
        let floor = (200.0 * config.min_efficiency).round() as u64;

        let mut last = u64::MAX;
        for _ in 0..60 {
            let outcome = execute_trade(&mut post, 0, &config);
            assert!(outcome.profit <= last);
            assert!(outcome.profit >= floor);
            assert!(outcome.new_efficiency >= config.min_efficiency);
            last = outcome.profit;
        }
        assert_eq!(last, floor);
        assert_approx_eq!(post.trade_efficiency, config.min_efficiency);
    }

    #[test]
    fn test_full_regen_from_floor() {
        let config = EconomyConfig::default();
        let mut post = post(TradingPostType::Mining, 0);
        post.trade_efficiency = config.min_efficiency;

        update_efficiency(&mut post, config.full_regen_duration_ms, &config);
        assert_approx_eq!(post.trade_efficiency, 1.0);
        assert_eq!(post.last_regen_time, config.full_regen_duration_ms);
    }

    #[test]
    fn test_partial_regen_is_linear() {
        let config = EconomyConfig::default();
        let mut post = post(TradingPostType::Mining, 0);
        post.trade_efficiency = 0.2;

        update_efficiency(&mut post, config.full_regen_duration_ms / 4, &config);
        assert_approx_eq!(post.trade_efficiency, 0.45);

        // Split updates add up to the same result as one update
        update_efficiency(&mut post, config.full_regen_duration_ms / 2, &config);
        assert_approx_eq!(post.trade_efficiency, 0.7);
    }

    #[test]
    fn test_efficiency_never_exceeds_one() {
        let config = EconomyConfig::default();
        let mut post = post(TradingPostType::Commercial, 0);
        update_efficiency(&mut post, config.full_regen_duration_ms * 10, &config);
        assert_approx_eq!(post.trade_efficiency, 1.0);
    }

    #[test]
    fn test_payout_multipliers() {
        let config = EconomyConfig::default();
        let catalogs = standard_catalogs();
        let mut player = scout_player();
        let scout = catalogs.ship(ShipType::Scout).unwrap().clone();

        assert_eq!(payout(100, &player, &scout, &catalogs, &config), 100);

        // Two cargo upgrades: +10 capacity, 1 + 10 * 0.02 = 1.2
        player.cargo_upgrades = 2;
        assert_eq!(effective_cargo_capacity(&player, &scout, &config), 20);
        assert_approx_eq!(cargo_bonus(&player, &scout, &config), 1.2);
        assert_eq!(payout(100, &player, &scout, &catalogs, &config), 120);

        // Market uplink adds 0.25 to the scout multiplier
        player.ship_upgrades.push("market-uplink".to_string());
        assert_approx_eq!(trade_multiplier(&player, &scout, &catalogs), 1.25);
        assert_eq!(payout(100, &player, &scout, &catalogs, &config), 150);
    }

    #[test]
    fn test_upgrades_for_other_hulls_do_not_count() {
        let catalogs = standard_catalogs();
        let mut player = scout_player();
        player.ship = ShipType::Trader;
        player.ship_upgrades.push("market-uplink".to_string());

        let trader = catalogs.ship(ShipType::Trader).unwrap();
        assert_approx_eq!(trade_multiplier(&player, trader, &catalogs), 1.5);
    }

    #[test]
    fn test_cargo_upgrade_cost_grows_geometrically() {
        let config = EconomyConfig::default();
        assert_eq!(cargo_upgrade_cost(0, &config), 1000);
        assert_eq!(cargo_upgrade_cost(1, &config), 1500);
        assert_eq!(cargo_upgrade_cost(2, &config), 2250);
        assert_eq!(cargo_upgrade_cost(3, &config), 3375);
    }

    #[test]
    fn test_placement_guarantees_every_type() {
        let catalogs = standard_catalogs();
        let mut sectors = generate_sectors(10, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let placed = place_trading_posts(&mut sectors, &catalogs, 12, 20, 0, &mut rng);
        assert_eq!(placed, 12);

        let posts: Vec<&TradingPost> = sectors
            .values()
            .filter_map(|s| s.trading_post.as_ref())
            .collect();
        assert_eq!(posts.len(), 12);
        for post_type in TradingPostType::ALL {
            assert!(posts.iter().any(|p| p.post_type == post_type));
        }
        for post in posts {
            assert_approx_eq!(post.trade_efficiency, 1.0);
        }
    }

    #[test]
    fn test_placement_renames_sectors() {
        let catalogs = standard_catalogs();
        let mut sectors = generate_sectors(4, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        place_trading_posts(&mut sectors, &catalogs, 5, 20, 0, &mut rng);

        for sector in sectors.values() {
            match &sector.trading_post {
                Some(post) => {
                    assert_eq!(sector.name, format!("Sector {} - {}", sector.id, post.name))
                }
                None => assert_eq!(sector.name, format!("Sector {}", sector.id)),
            }
        }
    }

    #[test]
    fn test_placement_underfills_saturated_map() {
        let catalogs = standard_catalogs();
        let mut sectors = generate_sectors(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let placed = place_trading_posts(&mut sectors, &catalogs, 50, 20, 0, &mut rng);
        assert_eq!(placed, 4);
        assert!(sectors.values().all(|s| s.trading_post.is_some()));
    }

    #[test]
    fn test_placement_is_reproducible_with_seed() {
        let catalogs = standard_catalogs();
        let mut a = generate_sectors(8, 8).unwrap();
        let mut b = generate_sectors(8, 8).unwrap();

        place_trading_posts(&mut a, &catalogs, 10, 20, 0, &mut StdRng::seed_from_u64(99));
        place_trading_posts(&mut b, &catalogs, 10, 20, 0, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
