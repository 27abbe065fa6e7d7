//! Per-player energy: lazy regeneration and the action gate.
//!
//! Energy is never ticked. It is recomputed from `last_energy_update` whenever
//! it is about to be read, one point per `regen_interval_ms` of game time.

use crate::config::EnergyConfig;
use crate::error::ActionError;
use shared::{Action, Player, ShipInfo};

/// Regenerated `(energy, last_update)` at `now`.
///
/// The timestamp only moves when at least one whole point was earned, so
/// partial progress toward the next point is kept across calls that land
/// inside the same interval.
pub fn regenerate(energy: u32, last_update: u64, now: u64, config: &EnergyConfig) -> (u32, u64) {
    let elapsed = now.saturating_sub(last_update);
    let earned = elapsed / config.regen_interval_ms.max(1);
    if earned == 0 {
        return (energy.min(config.max_energy), last_update);
    }

    let earned = u32::try_from(earned).unwrap_or(u32::MAX);
    (energy.saturating_add(earned).min(config.max_energy), now)
}

pub fn update_energy(player: &mut Player, now: u64, config: &EnergyConfig) {
    let (energy, last_update) = regenerate(player.energy, player.last_energy_update, now, config);
    player.energy = energy;
    player.last_energy_update = last_update;
}

/// Energy an action costs for the given hull.
pub fn energy_cost(action: Action, ship: &ShipInfo, config: &EnergyConfig) -> u32 {
    let scaled = config.base_cost(action) as f64 * ship.energy_efficiency;
    scaled.ceil().max(0.0) as u32
}

/// Charges the player for `action`, returning the amount spent.
///
/// On failure the player is left exactly as it was, including the
/// regeneration bookkeeping.
pub fn consume_energy(
    player: &mut Player,
    action: Action,
    ship: &ShipInfo,
    now: u64,
    config: &EnergyConfig,
) -> Result<u32, ActionError> {
    let (energy, last_update) = regenerate(player.energy, player.last_energy_update, now, config);
    let cost = energy_cost(action, ship, config);

    if energy < cost {
        return Err(ActionError::InsufficientEnergy {
            action,
            required: cost,
            available: energy,
        });
    }

    player.energy = energy - cost;
    player.last_energy_update = last_update;
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::standard_catalogs;
    use shared::ShipType;
    use uuid::Uuid;

    fn player_with_energy(energy: u32, last_update: u64) -> Player {
        let mut player = Player::new(Uuid::new_v4(), 1, "Player1".to_string(), 1000, 0, 0);
        player.energy = energy;
        player.last_energy_update = last_update;
        player
    }

    fn ship(ship: ShipType) -> ShipInfo {
        standard_catalogs().ship(ship).cloned().unwrap()
    }

    #[test]
    fn test_costs_scale_with_ship_efficiency() {
        let config = EnergyConfig::default();
        assert_eq!(energy_cost(Action::Move, &ship(ShipType::Scout), &config), 8);
        assert_eq!(energy_cost(Action::Trade, &ship(ShipType::Scout), &config), 4);
        assert_eq!(energy_cost(Action::Move, &ship(ShipType::Trader), &config), 10);
        assert_eq!(energy_cost(Action::Move, &ship(ShipType::Freighter), &config), 15);
        assert_eq!(energy_cost(Action::Trade, &ship(ShipType::Freighter), &config), 8);
    }

    #[test]
    fn test_fractional_costs_round_up() {
        let config = EnergyConfig::default();
        let mut hull = ship(ShipType::Scout);

        hull.energy_efficiency = 0.75;
        assert_eq!(energy_cost(Action::Move, &hull, &config), 8);

        hull.energy_efficiency = 0.33;
        assert_eq!(energy_cost(Action::Move, &hull, &config), 4);
        assert_eq!(energy_cost(Action::Trade, &hull, &config), 2);
    }

    #[test]
    fn test_regeneration_whole_points_only() {
        let config = EnergyConfig::default();

        // Less than one interval: nothing earned, timestamp kept
        assert_eq!(regenerate(100, 0, 35_999, &config), (100, 0));

        // Two and a half intervals: two points, timestamp reset
        assert_eq!(regenerate(100, 0, 90_000, &config), (102, 90_000));
    }

    #[test]
    fn test_regeneration_caps_at_max() {
        let config = EnergyConfig::default();
        let (energy, _) = regenerate(2399, 0, 36_000 * 50, &config);
        assert_eq!(energy, config.max_energy);
    }

    #[test]
    fn test_clock_going_backwards_is_harmless() {
        let config = EnergyConfig::default();
        assert_eq!(regenerate(10, 5_000, 1_000, &config), (10, 5_000));
    }

    #[test]
    fn test_update_energy_mutates_player() {
        let config = EnergyConfig::default();
        let mut player = player_with_energy(0, 0);
        update_energy(&mut player, 36_000 * 3, &config);
        assert_eq!(player.energy, 3);
        assert_eq!(player.last_energy_update, 36_000 * 3);
    }

    #[test]
    fn test_consume_success() {
        let config = EnergyConfig::default();
        let mut player = player_with_energy(2400, 0);

        let spent = consume_energy(&mut player, Action::Move, &ship(ShipType::Scout), 10, &config);
        assert_eq!(spent, Ok(8));
        assert_eq!(player.energy, 2392);
    }

    #[test]
    fn test_consume_failure_leaves_player_untouched() {
        let config = EnergyConfig::default();
        let mut player = player_with_energy(3, 0);
        let before = player.clone();

        // One point would be earned, still short of the cost of 8
        let result = consume_energy(
            &mut player,
            Action::Move,
            &ship(ShipType::Scout),
            36_000,
            &config,
        );

        assert_eq!(
            result,
            Err(ActionError::InsufficientEnergy {
                action: Action::Move,
                required: 8,
                available: 4,
            })
        );
        assert_eq!(player, before);
    }

    #[test]
    fn test_consume_uses_regenerated_energy() {
        let config = EnergyConfig::default();
        let mut player = player_with_energy(6, 0);

        let result = consume_energy(
            &mut player,
            Action::Move,
            &ship(ShipType::Scout),
            36_000 * 2,
            &config,
        );
        assert_eq!(result, Ok(8));
        assert_eq!(player.energy, 0);
        assert_eq!(player.last_energy_update, 72_000);
    }

    #[test]
    fn test_energy_stays_in_bounds_over_many_actions() {
        let config = EnergyConfig::default();
        let scout = ship(ShipType::Scout);
        let mut player = player_with_energy(config.max_energy, 0);
        let mut now = 0;

        for step in 0..2_000u64 {
            now += (step % 7) * 10_000;
            let action = if step % 3 == 0 { Action::Trade } else { Action::Move };
            let _ = consume_energy(&mut player, action, &scout, now, &config);
            assert!(player.energy <= config.max_energy);
        }
    }
}
