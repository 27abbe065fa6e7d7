//! Sector graph generation.
//!
//! The universe is a `width x height` grid. Sector ids are 1-based and laid
//! out column by column (`id = x * height + y + 1`), and every sector links to
//! its orthogonal neighbors. Topology is fully determined by the dimensions;
//! only trading-post placement (see `economy`) is random.

use crate::error::WorldError;
use shared::{Sector, SectorId};
use std::collections::BTreeMap;

pub fn sector_id(x: u32, y: u32, height: u32) -> SectorId {
    x * height + y + 1
}

/// Builds the grid of sectors with symmetric orthogonal connections.
///
/// Connections are listed left, right, up, down. Pathfinding visits
/// neighbors in that order.
pub fn generate_sectors(width: u32, height: u32) -> Result<BTreeMap<SectorId, Sector>, WorldError> {
    if width == 0 || height == 0 || width.checked_mul(height).is_none() {
        return Err(WorldError::InvalidGrid { width, height });
    }

    let mut sectors = BTreeMap::new();

    for x in 0..width {
        for y in 0..height {
            let id = sector_id(x, y, height);
            let mut connections = Vec::with_capacity(4);

            if x > 0 {
                connections.push(sector_id(x - 1, y, height));
            }
            if x + 1 < width {
                connections.push(sector_id(x + 1, y, height));
            }
            if y > 0 {
                connections.push(sector_id(x, y - 1, height));
            }
            if y + 1 < height {
                connections.push(sector_id(x, y + 1, height));
            }

            sectors.insert(id, Sector::new(id, x, y, connections));
        }
    }

    Ok(sectors)
}
