//! `StatementSchedule`: builds per-tier rotating payment epochs and
//! resolves height -> payee.

use crate::registry::InfinityNodeRegistry;
use crate::types::{InfinityNode, StatementMap, Tier};

pub struct StatementSchedule {
    maps: std::sync::Mutex<[StatementMap; 3]>,
}

impl Default for StatementSchedule {
    fn default() -> Self {
        Self { maps: std::sync::Mutex::new([StatementMap::new(), StatementMap::new(), StatementMap::new()]) }
    }
}

fn tier_index(tier: Tier) -> usize {
    match tier {
        Tier::T1 => 0,
        Tier::T5 => 1,
        Tier::T10 => 2,
    }
}

impl StatementSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_for(&self, tier: Tier) -> StatementMap {
        self.maps.lock().unwrap()[tier_index(tier)].clone()
    }

    /// Seeds a tier's schedule from a persisted snapshot, bypassing the
    /// recompute-from-registry path used at startup without one.
    pub fn restore_map(&self, tier: Tier, map: StatementMap) {
        self.maps.lock().unwrap()[tier_index(tier)] = map;
    }

    /// Rebuilds the tier's statement map from `genesis_statement_height`
    /// to `tip`. At each probe height `h`, counts all nodes of this tier
    /// with `burn_height < h <= expire_height(h)`; `expire_height` is
    /// supplied by the caller since expiry depends on the tier's
    /// registry-cap-driven window, which this module doesn't itself own.
    pub fn deterministic_reward_statement(
        &self,
        registry: &InfinityNodeRegistry,
        tier: Tier,
        genesis_statement_height: u32,
        tip: u32,
        expire_height_at: impl Fn(u32) -> u32,
    ) {
        let mut statement = StatementMap::new();
        let mut h = genesis_statement_height;

        while h <= tip {
            let expire_height = expire_height_at(h);
            let count = registry
                .full_map()
                .values()
                .filter(|n: &&InfinityNode| n.tier == tier && n.burn_height < h && !n.is_expired(expire_height, h))
                .count() as u32;

            if count == 0 {
                break;
            }
            statement.insert(h, count);
            h += count;
        }

        self.maps.lock().unwrap()[tier_index(tier)] = statement;
    }

    /// Finds the greatest `statement_start <= height` such that
    /// `height - statement_start < statement_size`, then returns the
    /// ranked node whose rank equals `height - statement_start + 1`.
    pub fn deterministic_reward_at(
        &self,
        registry: &InfinityNodeRegistry,
        tier: Tier,
        height: u32,
        expire_height_at: impl Fn(u32) -> u32,
    ) -> Option<InfinityNode> {
        let maps = self.maps.lock().unwrap();
        let map = &maps[tier_index(tier)];

        let (&start, &size) = map.range(..=height).next_back()?;
        if height - start >= size {
            return None;
        }
        drop(maps);

        let expire_height = expire_height_at(start);
        let ranked = registry.calc_rank(start, tier, expire_height, false);
        let target_rank = height - start + 1;
        ranked.into_iter().find(|(rank, _)| *rank == target_rank).map(|(_, node)| node)
    }

    /// True when the active statement's end is within `INF_MATURED_LIMIT`
    /// of `tip`, signalling `CheckAndRemove` should re-extend the schedule.
    pub fn needs_extension(&self, tier: Tier, tip: u32, margin: u32) -> bool {
        let maps = self.maps.lock().unwrap();
        match maps[tier_index(tier)].iter().next_back() {
            Some((&start, &size)) => start + size >= tip || (start + size).saturating_sub(tip) < margin,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::make_node;

    #[test]
    fn statement_boundary_scenario() {
        let registry = InfinityNodeRegistry::new();
        registry.add(make_node(0, 50, Tier::T1), 1000);
        registry.add(make_node(1, 60, Tier::T1), 1000);
        registry.add(make_node(2, 70, Tier::T1), 1000);

        let schedule = StatementSchedule::new();
        schedule.deterministic_reward_statement(&registry, Tier::T1, 110, 120, |_| 10_000);

        let map = schedule.map_for(Tier::T1);
        assert_eq!(map.get(&110), Some(&3));
    }

    #[test]
    fn fourth_node_joins_next_statement() {
        let registry = InfinityNodeRegistry::new();
        registry.add(make_node(0, 50, Tier::T1), 1000);
        registry.add(make_node(1, 60, Tier::T1), 1000);
        registry.add(make_node(2, 70, Tier::T1), 1000);
        registry.add(make_node(3, 111, Tier::T1), 1000);

        let schedule = StatementSchedule::new();
        schedule.deterministic_reward_statement(&registry, Tier::T1, 110, 150, |_| 10_000);

        let map = schedule.map_for(Tier::T1);
        assert_eq!(map.get(&110), Some(&3));
        // the 4th node (born at 111) joins the next statement alongside the
        // three still-active nodes from the prior one.
        assert_eq!(map.get(&113), Some(&4));
    }
}
