//! `InfinityNodeRegistry`: maintains matured/non-matured node sets keyed by
//! burn outpoint, tier classification, and rank derivation.

use std::collections::HashMap;
use std::sync::Mutex;

use bitcoin::{OutPoint, ScriptBuf};

use crate::params::INF_MATURED_LIMIT;
use crate::types::{cmp_rank, InfinityNode, LastPaidMap, Tier};

/// `mapLastPaid` gets its own mutex, separate from the registry's main
/// lock, so the scanner committing a batch of events never blocks the
/// validator's read of recent payments.
#[derive(Default)]
pub struct InfinityNodeRegistry {
    inner: Mutex<Inner>,
    last_paid: Mutex<LastPaidMap>,
}

#[derive(Default)]
struct Inner {
    matured: HashMap<OutPoint, InfinityNode>,
    non_matured: HashMap<OutPoint, InfinityNode>,
}

impl InfinityNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` into the matured or non-matured map depending on
    /// whether its burn has aged past `INF_MATURED_LIMIT` relative to
    /// `tip_height`.
    pub fn add(&self, node: InfinityNode, tip_height: u32) {
        let mut inner = self.inner.lock().unwrap();
        if node.burn_height + INF_MATURED_LIMIT <= tip_height {
            inner.non_matured.remove(&node.burn_outpoint);
            inner.matured.insert(node.burn_outpoint, node);
        } else {
            inner.non_matured.insert(node.burn_outpoint, node);
        }
    }

    pub fn find(&self, outpoint: &OutPoint) -> Option<InfinityNode> {
        let inner = self.inner.lock().unwrap();
        inner
            .matured
            .get(outpoint)
            .or_else(|| inner.non_matured.get(outpoint))
            .cloned()
    }

    pub fn has(&self, outpoint: &OutPoint) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.matured.contains_key(outpoint) || inner.non_matured.contains_key(outpoint)
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().matured.len()
    }

    pub fn full_map(&self) -> HashMap<OutPoint, InfinityNode> {
        self.inner.lock().unwrap().matured.clone()
    }

    pub fn non_matured_map(&self) -> HashMap<OutPoint, InfinityNode> {
        self.inner.lock().unwrap().non_matured.clone()
    }

    /// Replaces the non-matured map wholesale, as `BlockScanner` does on
    /// every successful scan pass.
    pub fn replace_non_matured(&self, map: HashMap<OutPoint, InfinityNode>) {
        self.inner.lock().unwrap().non_matured = map;
    }

    /// Applies a metadata update to the matured node whose collateral
    /// address matches, provided `height` is newer than the node's last
    /// recorded `metadata_height`. Returns `false` if no matching node
    /// exists or the update is stale.
    pub fn update_metadata(
        &self,
        collateral: &ScriptBuf,
        node_address: String,
        service: String,
        height: u32,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(node) = inner
            .matured
            .values_mut()
            .find(|n| &n.collateral_address == collateral)
        else {
            return false;
        };
        if height <= node.metadata_height {
            return false;
        }
        node.node_address = Some(node_address);
        node.service = Some(service);
        node.metadata_height = height;
        true
    }

    /// Records that `script` was paid at `height`, keeping the maximum
    /// height per script as `mapLastPaid` does.
    pub fn update_last_paid(&self, script: ScriptBuf, height: u32) {
        let mut last_paid = self.last_paid.lock().unwrap();
        let entry = last_paid.entry(script).or_insert(0);
        if height > *entry {
            *entry = height;
        }
    }

    pub fn last_paid_height(&self, script: &ScriptBuf) -> Option<u32> {
        self.last_paid.lock().unwrap().get(script).copied()
    }

    pub fn last_paid_snapshot(&self) -> LastPaidMap {
        self.last_paid.lock().unwrap().clone()
    }

    /// Ranks all non-expired, matured nodes of `tier`, ascending by
    /// `(burn_height, burn_outpoint)`. Expiry is evaluated against
    /// `expire_height`, the tier's configured statement-window bound at
    /// `block_height`. If `persist`, ranks are written back into the
    /// registry.
    pub fn calc_rank(
        &self,
        block_height: u32,
        tier: Tier,
        expire_height: u32,
        persist: bool,
    ) -> Vec<(u32, InfinityNode)> {
        let mut inner = self.inner.lock().unwrap();
        let mut nodes: Vec<InfinityNode> = inner
            .matured
            .values()
            .filter(|n| n.tier == tier && n.burn_height < block_height && !n.is_expired(expire_height, block_height))
            .cloned()
            .collect();
        nodes.sort_by(cmp_rank);

        let ranked: Vec<(u32, InfinityNode)> = nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| (i as u32 + 1, node))
            .collect();

        if persist {
            for (rank, node) in &ranked {
                if let Some(stored) = inner.matured.get_mut(&node.burn_outpoint) {
                    stored.rank = *rank;
                }
            }
        }

        ranked
    }

    /// `burn_amount / ((720 / total_nodes) * payout_per_block)`: integer
    /// days-to-ROI. 720 is blocks-per-day at a 120-second target.
    pub fn get_roi(&self, burn_amount_sat: u64, total_nodes: u64, payout_per_block_sat: u64) -> u64 {
        if total_nodes == 0 || payout_per_block_sat == 0 {
            return 0;
        }
        let blocks_between_payouts = 720 / total_nodes.max(1);
        let denom = blocks_between_payouts * payout_per_block_sat;
        if denom == 0 {
            return 0;
        }
        burn_amount_sat / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::make_node;

    #[test]
    fn add_matured_vs_non_matured_split() {
        let registry = InfinityNodeRegistry::new();
        let matured = make_node(0, 10, Tier::T1);
        let fresh = make_node(1, 100, Tier::T1);

        registry.add(matured.clone(), 200);
        registry.add(fresh.clone(), 200);

        assert!(registry.full_map().contains_key(&matured.burn_outpoint));
        assert!(registry.non_matured_map().contains_key(&fresh.burn_outpoint));
    }

    #[test]
    fn calc_rank_orders_by_burn_height_then_outpoint() {
        let registry = InfinityNodeRegistry::new();
        let a = make_node(0, 50, Tier::T1);
        let b = make_node(1, 30, Tier::T1);
        let c = make_node(2, 30, Tier::T1);

        registry.add(a.clone(), 1000);
        registry.add(b.clone(), 1000);
        registry.add(c.clone(), 1000);

        let ranked = registry.calc_rank(1000, Tier::T1, 10_000, false);
        let heights: Vec<u32> = ranked.iter().map(|(_, n)| n.burn_height).collect();

        // b and c (height 30) both rank ahead of a (height 50).
        assert_eq!(heights, vec![30, 30, 50]);
        assert_eq!(ranked[2].1.burn_outpoint, a.burn_outpoint);
        assert_eq!(ranked[2].0, 3);
    }

    #[test]
    fn update_last_paid_keeps_maximum() {
        let registry = InfinityNodeRegistry::new();
        let script = ScriptBuf::new();
        registry.update_last_paid(script.clone(), 50);
        registry.update_last_paid(script.clone(), 10);
        assert_eq!(registry.last_paid_height(&script), Some(50));
    }

    #[test]
    fn roi_matches_formula() {
        let registry = InfinityNodeRegistry::new();
        // 100 nodes, 1 coin/block payout, burn 720 coins -> each node is paid
        // once every 7.2 blocks -> 720/100 = 7 blocks between payouts (integer
        // division) -> 7 sat/block * 720 burn = ROI of 720/7 = 102 days.
        let roi = registry.get_roi(720, 100, 1);
        assert_eq!(roi, 720 / 7);
    }
}
