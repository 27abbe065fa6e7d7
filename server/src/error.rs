//! Error taxonomy for the authoritative core.
//!
//! `ActionError` covers everything a client can get wrong: it is turned into a
//! requester-scoped `error` event and never mutates the world. `WorldError`
//! covers startup conditions the server cannot recover from.

use shared::{Action, SectorId, ShipType};
use thiserror::Error;

fn action_verb(action: &Action) -> &'static str {
    match action {
        Action::Move => "move",
        Action::Trade => "trade",
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Invalid move: sector {0} does not exist")]
    InvalidSector(SectorId),

    #[error("No path to sector {0}")]
    NoPath(SectorId),

    #[error(
        "Not enough energy to {} (need {required}, have {available})",
        action_verb(.action)
    )]
    InsufficientEnergy {
        action: Action,
        required: u32,
        available: u32,
    },

    #[error("There is no trading post in this sector")]
    NoTradingPost,

    #[error("Ship upgrades are only available at a StarPort")]
    NotAtStarport,

    #[error("Cargo upgrades are only available at a StarPort or Commercial Hub")]
    NotAtCargoOutfitter,

    #[error("You already own a {0:?}")]
    ShipAlreadyOwned(ShipType),

    #[error("Not enough credits (need {required}, have {available})")]
    InsufficientCredits { required: u64, available: u64 },

    #[error("Maximum cargo upgrades reached")]
    MaxCargoUpgrades,

    #[error("Unknown ship type {0:?}")]
    UnknownShip(ShipType),

    #[error("Unknown upgrade '{0}'")]
    UnknownUpgrade(String),

    #[error("Upgrade '{upgrade}' requires a {required:?}")]
    WrongShipForUpgrade { upgrade: String, required: ShipType },

    #[error("You already own upgrade '{0}'")]
    UpgradeAlreadyOwned(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("grid dimensions must be at least 1x1 (got {width}x{height})")]
    InvalidGrid { width: u32, height: u32 },

    #[error("starting sector {0} is missing from the sector map")]
    MissingStartingSector(SectorId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_message_names_action() {
        let err = ActionError::InsufficientEnergy {
            action: Action::Move,
            required: 8,
            available: 3,
        };
        assert_eq!(err.to_string(), "Not enough energy to move (need 8, have 3)");
    }

    #[test]
    fn test_cargo_limit_message() {
        assert_eq!(
            ActionError::MaxCargoUpgrades.to_string(),
            "Maximum cargo upgrades reached"
        );
    }

    #[test]
    fn test_invalid_grid_message() {
        let err = WorldError::InvalidGrid {
            width: 0,
            height: 4,
        };
        assert!(err.to_string().contains("0x4"));
    }
}
