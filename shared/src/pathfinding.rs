//! Breadth-first search over the sector connection graph.
//!
//! The server uses it to resolve `moveTo` requests for sectors that are not
//! adjacent, advancing a player by the first hop only. Clients run the same
//! search over their cached map to plan one request per hop.

use crate::{Sector, SectorId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Shortest path from `start` to `target`, both inclusive.
///
/// Returns `Some(vec![start])` when already there and `None` when either
/// sector is unknown or the target cannot be reached. Neighbors are expanded
/// in connection-list order, so results are stable for a given map.
pub fn find_path(
    sectors: &BTreeMap<SectorId, Sector>,
    start: SectorId,
    target: SectorId,
) -> Option<Vec<SectorId>> {
    if !sectors.contains_key(&start) || !sectors.contains_key(&target) {
        return None;
    }
    if start == target {
        return Some(vec![start]);
    }

    let mut parents: HashMap<SectorId, SectorId> = HashMap::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let Some(sector) = sectors.get(&current) else {
            continue;
        };

        for &next in &sector.connections {
            if !visited.insert(next) {
                continue;
            }
            parents.insert(next, current);

            if next == target {
                return Some(reconstruct(&parents, start, target));
            }
            queue.push_back(next);
        }
    }

    None
}

/// First sector to step into on the way to `target`.
pub fn next_hop(
    sectors: &BTreeMap<SectorId, Sector>,
    start: SectorId,
    target: SectorId,
) -> Option<SectorId> {
    find_path(sectors, start, target).and_then(|path| path.get(1).copied())
}

/// Every sector reachable from `start`, including itself.
pub fn reachable_from(sectors: &BTreeMap<SectorId, Sector>, start: SectorId) -> HashSet<SectorId> {
    let mut visited = HashSet::new();
    if !sectors.contains_key(&start) {
        return visited;
    }

    let mut queue = VecDeque::from([start]);
    visited.insert(start);

    while let Some(current) = queue.pop_front() {
        if let Some(sector) = sectors.get(&current) {
            for &next in &sector.connections {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    visited
}

fn reconstruct(
    parents: &HashMap<SectorId, SectorId>,
    start: SectorId,
    target: SectorId,
) -> Vec<SectorId> {
    let mut path = vec![target];
    let mut current = target;
    while current != start {
        match parents.get(&current) {
            Some(&parent) => {
                path.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 - 2 - 3    4 - 5   (two islands)
    fn islands() -> BTreeMap<SectorId, Sector> {
        let mut sectors = BTreeMap::new();
        sectors.insert(1, Sector::new(1, 0, 0, vec![2]));
        sectors.insert(2, Sector::new(2, 1, 0, vec![1, 3]));
        sectors.insert(3, Sector::new(3, 2, 0, vec![2]));
        sectors.insert(4, Sector::new(4, 4, 0, vec![5]));
        sectors.insert(5, Sector::new(5, 5, 0, vec![4]));
        sectors
    }

    #[test]
    fn test_same_sector() {
        let sectors = islands();
        assert_eq!(find_path(&sectors, 2, 2), Some(vec![2]));
        assert_eq!(next_hop(&sectors, 2, 2), None);
    }

    #[test]
    fn test_adjacent_sector() {
        let sectors = islands();
        assert_eq!(find_path(&sectors, 1, 2), Some(vec![1, 2]));
        assert_eq!(next_hop(&sectors, 1, 2), Some(2));
    }

    #[test]
    fn test_multi_hop() {
        let sectors = islands();
        assert_eq!(find_path(&sectors, 1, 3), Some(vec![1, 2, 3]));
        assert_eq!(find_path(&sectors, 3, 1), Some(vec![3, 2, 1]));
    }

    #[test]
    fn test_unreachable_and_unknown() {
        let sectors = islands();
        assert_eq!(find_path(&sectors, 1, 5), None);
        assert_eq!(find_path(&sectors, 1, 99), None);
        assert_eq!(find_path(&sectors, 99, 1), None);
        assert_eq!(next_hop(&sectors, 1, 4), None);
    }

    #[test]
    fn test_reachable_from() {
        let sectors = islands();
        let reachable = reachable_from(&sectors, 1);
        assert_eq!(reachable.len(), 3);
        assert!(!reachable.contains(&4));
        assert!(reachable_from(&sectors, 42).is_empty());
    }
}
