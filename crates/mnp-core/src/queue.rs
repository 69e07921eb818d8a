//! `next_in_queue`: the "who gets paid next" computation shared by the
//! voter (building its own nomination) and the validator (falling back to
//! a local computation when no gossip tally exists yet for a height).

use crate::registry::InfinityNodeRegistry;
use crate::types::{InfinityNode, Tier};

/// Minimum blocks a node must wait between payouts before it is eligible
/// to be nominated again.
pub const MIN_PAYOUT_AGE_BLOCKS: u32 = 1;

/// Picks the eligible node of `tier` that was paid least recently (or
/// never), tie-broken by burn outpoint. "Eligible" means ranked (matured,
/// non-expired) and either never paid or last paid at least
/// `MIN_PAYOUT_AGE_BLOCKS` before `height`.
pub fn next_in_queue(
    registry: &InfinityNodeRegistry,
    tier: Tier,
    height: u32,
    expire_height: u32,
) -> Option<InfinityNode> {
    let ranked = registry.calc_rank(height, tier, expire_height, false);

    ranked
        .into_iter()
        .map(|(_, node)| node)
        .filter(|node| {
            match registry.last_paid_height(&node.script_pub_key) {
                Some(last) => height.saturating_sub(last) >= MIN_PAYOUT_AGE_BLOCKS,
                None => true,
            }
        })
        .min_by_key(|node| {
            let last_paid = registry.last_paid_height(&node.script_pub_key).unwrap_or(0);
            (last_paid, node.burn_outpoint.txid, node.burn_outpoint.vout)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::make_node;

    #[test]
    fn picks_oldest_paid_node() {
        let registry = InfinityNodeRegistry::new();
        let a = make_node(0, 10, Tier::T1);
        let b = make_node(1, 20, Tier::T1);
        registry.add(a.clone(), 1000);
        registry.add(b.clone(), 1000);

        registry.update_last_paid(a.script_pub_key.clone(), 900);
        registry.update_last_paid(b.script_pub_key.clone(), 500);

        let next = next_in_queue(&registry, Tier::T1, 1000, 10_000).unwrap();
        assert_eq!(next.burn_outpoint, b.burn_outpoint);
    }

    #[test]
    fn never_paid_node_is_eligible() {
        let registry = InfinityNodeRegistry::new();
        let a = make_node(0, 10, Tier::T1);
        registry.add(a.clone(), 1000);

        let next = next_in_queue(&registry, Tier::T1, 1000, 10_000).unwrap();
        assert_eq!(next.burn_outpoint, a.burn_outpoint);
    }
}
