//! Per-network constants. All reads are pure lookups; nothing here mutates
//! after network selection at startup.

use crate::types::Tier;

/// A hash160 of a well-known burn/metadata/governance/notify address,
/// as pushed after `OP_RETURN` in a recognized `TX_BURN_DATA` output.
pub type AddressHash = [u8; 20];

/// Which of the four supported node families to configure for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Finalnet,
    Regtest,
}

impl Network {
    /// Stable identifier stamped into persisted snapshots, so a snapshot
    /// written under one network is never silently loaded under another.
    pub fn label(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Finalnet => "finalnet",
            Network::Regtest => "regtest",
        }
    }
}

/// Blocks a burn must age past before it participates in ranking or
/// statements.
pub const INF_MATURED_LIMIT: u32 = 55;

/// Votes required for a coinbase payee to be enforced at validation time.
pub const SIGNATURES_REQUIRED: u32 = 6;

/// Top-N operator rank eligible to vote / be voted for.
pub const SIGNATURES_TOTAL: u32 = 30;

#[derive(Debug, Clone)]
pub struct ChainParams {
    pub network: Network,

    /// Burn amount required per tier, in satoshi-equivalent smallest units.
    pub tier_burn: [u64; 3],

    /// Maximum concurrently-registered matured nodes per tier.
    pub tier_limit: [u32; 3],

    /// Height at which infinity-node scanning begins; disabled networks use
    /// a height far beyond any realistic tip.
    pub infinity_begin_height: u32,

    /// First statement start height for every tier.
    pub infinity_genesis_statement_height: u32,

    /// Height at which metadata updates begin being honored.
    pub infinity_update_meta_height: u32,

    /// Fixed value (in smallest units) of a burn-address governance/legacy
    /// vote output.
    pub vote_value: u64,

    pub burn_address_scripthash: AddressHash,
    pub metadata_address_scripthash: AddressHash,
    pub governance_address_scripthash: AddressHash,
    pub notify_address_scripthash: AddressHash,

    /// Maximum blocks a reorg can walk back before the registry must
    /// re-scan from `last_scan_height`.
    pub max_reorg_depth: u32,

    pub lwma_start_height: u32,
    pub lwma_window: u32,

    /// Height at which `paid_scan_depth` is capped at 800 rather than
    /// `max(tier_limit)`. Modeled as a chain-params field, per the Open
    /// Question decision recorded in DESIGN.md, instead of a literal in
    /// the scanner.
    pub paid_scan_depth_fork_height: u32,
    pub paid_scan_depth_after_fork: u32,
}

impl ChainParams {
    pub fn tier_burn(&self, tier: Tier) -> u64 {
        self.tier_burn[tier_index(tier)]
    }

    pub fn tier_limit(&self, tier: Tier) -> u32 {
        self.tier_limit[tier_index(tier)]
    }

    /// Classifies a burn value into a tier by the half-open range
    /// `(B_t - 1, B_t]`, matching the reference scanner's round-up
    /// (`nValue/COIN + 1`) before dividing into the tier table.
    pub fn classify_burn_value(&self, value_sat: u64) -> Option<Tier> {
        Tier::ALL.into_iter().find(|&t| {
            let burn = self.tier_burn(t);
            burn.saturating_sub(1) < value_sat && value_sat <= burn
        })
    }

    /// `paid_scan_depth`: capped at 800 after the fork height, otherwise
    /// `max(L_T1, L_T5, L_T10)`.
    pub fn paid_scan_depth(&self, tip_height: u32) -> u32 {
        if tip_height >= self.paid_scan_depth_fork_height {
            self.paid_scan_depth_after_fork
        } else {
            self.tier_limit.iter().copied().max().unwrap_or(0)
        }
    }

    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            tier_burn: [100_000 * SAT_PER_UNIT, 500_000 * SAT_PER_UNIT, 1_000_000 * SAT_PER_UNIT],
            tier_limit: [375, 375, 375],
            // disabled: the reference value (9_999_999_999) overflows u32, so we use the max
            infinity_begin_height: u32::MAX,
            infinity_genesis_statement_height: 250_000,
            infinity_update_meta_height: 25,
            vote_value: 100 * SAT_PER_UNIT,
            burn_address_scripthash: address_hash(b"burn-mainnet"),
            metadata_address_scripthash: address_hash(b"metadata-mainnet"),
            governance_address_scripthash: address_hash(b"governance-mainnet"),
            notify_address_scripthash: address_hash(b"notify-mainnet"),
            max_reorg_depth: 55,
            lwma_start_height: 0,
            lwma_window: 60,
            paid_scan_depth_fork_height: 350_000,
            paid_scan_depth_after_fork: 800,
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            tier_burn: [100_000 * SAT_PER_UNIT, 500_000 * SAT_PER_UNIT, 1_000_000 * SAT_PER_UNIT],
            tier_limit: [6, 6, 6],
            infinity_begin_height: 100,
            infinity_genesis_statement_height: 110,
            infinity_update_meta_height: 5,
            vote_value: 100 * SAT_PER_UNIT,
            burn_address_scripthash: address_hash(b"burn-testnet"),
            metadata_address_scripthash: address_hash(b"metadata-testnet"),
            governance_address_scripthash: address_hash(b"governance-testnet"),
            notify_address_scripthash: address_hash(b"notify-testnet"),
            max_reorg_depth: 5,
            lwma_start_height: 0,
            lwma_window: 60,
            paid_scan_depth_fork_height: 0,
            paid_scan_depth_after_fork: 800,
        }
    }

    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            tier_limit: [6, 6, 6],
            max_reorg_depth: 5,
            ..Self::testnet()
        }
    }

    pub fn finalnet() -> Self {
        // Finalnet tracks mainnet's tier economics but never disables
        // scanning, matching the "chosen at startup" tagged-config design
        // noted for ChainParams subclasses.
        Self {
            network: Network::Finalnet,
            infinity_begin_height: 0,
            ..Self::mainnet()
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Finalnet => Self::finalnet(),
            Network::Regtest => Self::regtest(),
        }
    }
}

fn tier_index(tier: Tier) -> usize {
    match tier {
        Tier::T1 => 0,
        Tier::T5 => 1,
        Tier::T10 => 2,
    }
}

/// Smallest-unit multiplier; the coin this subsystem was modeled on uses
/// 8 decimal places, same as `bitcoin::Amount`.
const SAT_PER_UNIT: u64 = 100_000_000;

/// Derives a deterministic placeholder hash160 for one of the four
/// well-known burn/metadata/governance/notify addresses. Real deployments
/// substitute the network's actual scripthash; this keeps `ChainParams`
/// self-contained and byte-stable across test runs without depending on
/// address decoding at startup.
fn address_hash(label: &[u8]) -> AddressHash {
    use bitcoin::hashes::{hash160, Hash};
    *hash160::Hash::hash(label).as_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regtest_matches_seed_scenario_constants() {
        let params = ChainParams::regtest();
        assert_eq!(params.infinity_genesis_statement_height, 110);
        assert_eq!(params.tier_limit(Tier::T1), 6);
    }

    #[test]
    fn classify_burn_value_boundary() {
        let params = ChainParams::mainnet();
        let t1 = params.tier_burn(Tier::T1);
        assert_eq!(params.classify_burn_value(t1), Some(Tier::T1));
        assert_eq!(params.classify_burn_value(t1 + 1), None);
        assert_eq!(params.classify_burn_value(t1 - 1), Some(Tier::T1));
        assert_eq!(params.classify_burn_value(t1 - SAT_PER_UNIT), None);
    }

    #[test]
    fn paid_scan_depth_switches_at_fork() {
        let params = ChainParams::mainnet();
        assert_eq!(params.paid_scan_depth(349_999), 375);
        assert_eq!(params.paid_scan_depth(350_000), 800);
    }
}
