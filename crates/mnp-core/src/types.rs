//! Core domain types shared across the scanner, registry, statement
//! schedule, vote store, and validator.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bitcoin::{OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

/// The three supported node sizes, distinguished by burn amount.
///
/// Internal ordering follows the reference implementation's map naming
/// (BIG=T10, MID=T5, LIL=T1), not numeric size, to keep statement storage
/// order consistent with the source this was modeled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// LIL
    T1,
    /// MID
    T5,
    /// BIG
    T10,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::T1, Tier::T5, Tier::T10];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::T1 => "T1",
            Tier::T5 => "T5",
            Tier::T10 => "T10",
        }
    }
}

/// A fully materialized infinity-node, derived from a matured burn
/// transaction plus any metadata updates applied since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfinityNode {
    pub burn_outpoint: OutPoint,
    pub tier: Tier,
    pub burn_height: u32,
    pub burn_value_sat: u64,
    pub script_pub_key: ScriptBuf,
    pub collateral_address: ScriptBuf,
    pub backup_address: Option<String>,
    pub node_address: Option<String>,
    pub service: Option<String>,
    pub metadata_height: u32,
    pub last_reward_height: u32,
    pub rank: u32,
}

impl InfinityNode {
    pub fn new(
        burn_outpoint: OutPoint,
        tier: Tier,
        burn_height: u32,
        burn_value_sat: u64,
        script_pub_key: ScriptBuf,
        collateral_address: ScriptBuf,
    ) -> Self {
        Self {
            burn_outpoint,
            tier,
            burn_height,
            burn_value_sat,
            script_pub_key,
            collateral_address,
            backup_address: None,
            node_address: None,
            service: None,
            metadata_height: 0,
            last_reward_height: 0,
            rank: 0,
        }
    }

    /// True once `height` has passed the node's `expire_height`, the
    /// tier-dependent deterministic age bound. `calc_rank` and
    /// `next_in_queue` both filter on this rather than duplicating the
    /// bound check inline.
    pub fn is_expired(&self, expire_height: u32, height: u32) -> bool {
        height > expire_height
    }
}

/// Ordering used by `calc_rank`: ascending burn height, tie-break by
/// outpoint (txid then vout).
pub fn node_rank_key(node: &InfinityNode) -> (u32, Txid, u32) {
    (node.burn_height, node.burn_outpoint.txid, node.burn_outpoint.vout)
}

pub fn cmp_rank(a: &InfinityNode, b: &InfinityNode) -> Ordering {
    node_rank_key(a).cmp(&node_rank_key(b))
}

/// An ordered `start_height -> size` map for one tier. `BTreeMap` gives
/// in-key-order iteration for free, matching the reference's `std::map`
/// usage for statement tables.
pub type StatementMap = BTreeMap<u32, u32>;

/// A gossip-received payment vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVote {
    pub operator_outpoint: OutPoint,
    pub target_height: u32,
    pub payee_script: ScriptBuf,
    pub signature: Vec<u8>,
}

impl PaymentVote {
    /// Message hash used as the vote's unique identity and as the tie-break
    /// key in `BlockPayeeTally`. Not a cryptographic commitment to
    /// anything beyond the vote's own fields, just enough for dedup and
    /// deterministic tie-breaking.
    pub fn hash(&self) -> VoteHash {
        use bitcoin::hashes::{sha256d, Hash};
        let mut buf = Vec::with_capacity(36 + 4 + self.payee_script.len() + self.signature.len());
        buf.extend_from_slice(self.operator_outpoint.txid.as_byte_array());
        buf.extend_from_slice(&self.operator_outpoint.vout.to_le_bytes());
        buf.extend_from_slice(&self.target_height.to_le_bytes());
        buf.extend_from_slice(self.payee_script.as_bytes());
        buf.extend_from_slice(&self.signature);
        VoteHash(sha256d::Hash::hash(&buf))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoteHash(pub bitcoin::hashes::sha256d::Hash);

impl std::fmt::Display for VoteHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-(payee, tier) vote accumulation at one candidate block height.
#[derive(Debug, Clone, Default)]
pub struct PayeeTally {
    pub tier: Option<Tier>,
    pub vote_hashes: Vec<VoteHash>,
}

impl PayeeTally {
    pub fn max_vote_hash(&self) -> Option<VoteHash> {
        self.vote_hashes.iter().copied().max()
    }
}

/// All payee tallies recorded for one candidate coinbase height.
#[derive(Debug, Clone, Default)]
pub struct BlockPayeeTally {
    pub by_payee: std::collections::HashMap<ScriptBuf, PayeeTally>,
}

impl BlockPayeeTally {
    /// Returns the payee with the most votes for `tier`; ties broken by the
    /// numerically greatest max vote-hash.
    pub fn best_payee(&self, tier: Tier) -> Option<(&ScriptBuf, &PayeeTally)> {
        self.by_payee
            .iter()
            .filter(|(_, t)| t.tier == Some(tier))
            .max_by(|(_, a), (_, b)| {
                a.vote_hashes
                    .len()
                    .cmp(&b.vote_hashes.len())
                    .then_with(|| a.max_vote_hash().cmp(&b.max_vote_hash()))
            })
    }
}

/// A governance proposal vote. `proposal_id` is always exactly 8 ASCII
/// characters, matching the on-chain payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceVote {
    pub proposal_id: String,
    pub voter_script: ScriptBuf,
    pub burn_height: u32,
    pub opinion: bool,
}

/// A burn transaction's worth of outputs the scanner recognized.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Burn {
        outpoint: OutPoint,
        height: u32,
        value_sat: u64,
        script: ScriptBuf,
        collateral_address: ScriptBuf,
        backup_address: Option<String>,
    },
    GovernanceVote(GovernanceVote),
    MetadataUpdate {
        collateral: ScriptBuf,
        node_address: String,
        service: String,
        height: u32,
    },
}

/// Tracks, per operator outpoint, the highest coinbase height at which
/// that script was observed being paid the exact tier reward.
pub type LastPaidMap = std::collections::HashMap<ScriptBuf, u32>;
