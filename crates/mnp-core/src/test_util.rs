//! Shared builders for unit tests across this crate's modules.

use bitcoin::hashes::Hash;
use bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, Txid};

use crate::types::{InfinityNode, Tier};

/// A deterministic, distinct outpoint per `seed`.
pub fn make_outpoint(seed: u8) -> OutPoint {
    let mut bytes = [0u8; 32];
    bytes[0] = seed;
    OutPoint::new(Txid::from_byte_array(bytes), 0)
}

/// A matured-eligible node with a distinct outpoint, given `burn_height`
/// and `tier`.
pub fn make_node(seed: u8, burn_height: u32, tier: Tier) -> InfinityNode {
    let outpoint = make_outpoint(seed);
    let mut script_bytes = vec![0x51]; // OP_TRUE, just a distinct marker
    script_bytes.push(seed);
    InfinityNode::new(
        outpoint,
        tier,
        burn_height,
        Amount::from_sat(1).to_sat(),
        ScriptBuf::from_bytes(script_bytes),
        ScriptBuf::new(),
    )
}

pub fn test_block_hash(seed: u8) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[0] = seed;
    BlockHash::from_byte_array(bytes)
}
