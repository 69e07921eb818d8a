//! `GetMasternodePayment`: the per-height, per-tier coinbase reward owed
//! to a tier. The reference implementation defines this in consensus
//! tables this subsystem doesn't own; treated here as a black box with a
//! placeholder schedule so the rest of the crate has something concrete
//! to call and test against.

use bitcoin::Amount;

use crate::types::Tier;

/// Base reward per tier, before any height-dependent halving. Real
/// deployments would source this from the coin's consensus parameters;
/// this crate's scope ends at the boundary of that lookup.
fn base_reward(tier: Tier) -> Amount {
    match tier {
        Tier::T1 => Amount::from_sat(1_00_000_000),
        Tier::T5 => Amount::from_sat(5_00_000_000),
        Tier::T10 => Amount::from_sat(10_00_000_000),
    }
}

pub fn get_masternode_payment(_height: u32, tier: Tier) -> Amount {
    base_reward(tier)
}
