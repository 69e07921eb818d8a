//! Recognizes the `OP_RETURN`-style burn payloads the scanner cares about.
//! Classification delegates entirely to `bitcoin::Script`'s own
//! instruction iterator rather than re-implementing a script solver.

use bitcoin::blockdata::script::Instruction;
use bitcoin::Script;

use crate::params::ChainParams;
use crate::types::Tier;

/// The three destinations a `TX_BURN_DATA`-shaped output can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnDestination {
    BurnAddress,
    MetadataAddress,
    GovernanceAddress,
}

/// Decodes an `OP_RETURN` script into its destination tag plus whatever
/// push-data followed it. Returns `None` for scripts that are not
/// `OP_RETURN` or whose first push doesn't match a recognized address
/// scripthash.
pub fn classify_burn_script(
    params: &ChainParams,
    script: &Script,
) -> Option<(BurnDestination, Vec<Vec<u8>>)> {
    if !script.is_op_return() {
        return None;
    }

    let pushes: Vec<Vec<u8>> = script
        .instructions()
        .skip(1) // OP_RETURN itself
        .filter_map(|i| match i {
            Ok(Instruction::PushBytes(bytes)) => Some(bytes.as_bytes().to_vec()),
            _ => None,
        })
        .collect();

    let first = pushes.first()?;
    let destination = if first.as_slice() == params.burn_address_scripthash {
        BurnDestination::BurnAddress
    } else if first.as_slice() == params.metadata_address_scripthash {
        BurnDestination::MetadataAddress
    } else if first.as_slice() == params.governance_address_scripthash {
        BurnDestination::GovernanceAddress
    } else {
        return None;
    };

    Some((destination, pushes))
}

/// A decoded 8-char-proposal-id + opinion payload, used by both the legacy
/// burn-address vote path and the canonical governance-address path.
pub fn parse_vote_payload(payload: &[u8]) -> Option<(String, bool)> {
    if payload.len() != 9 {
        return None;
    }
    let proposal_id = std::str::from_utf8(&payload[..8]).ok()?.to_string();
    let opinion = match payload[8] {
        b'1' => true,
        b'0' => false,
        _ => return None,
    };
    Some((proposal_id, opinion))
}

/// Decodes a metadata payload of the form `"<node-address> <ip[:port]>"`.
pub fn parse_metadata_payload(payload: &[u8]) -> Option<(String, String)> {
    let text = std::str::from_utf8(payload).ok()?;
    let mut parts = text.splitn(2, ' ');
    let node_address = parts.next()?.to_string();
    let service = parts.next()?.to_string();
    if node_address.is_empty() || service.is_empty() {
        return None;
    }
    Some((node_address, service))
}

/// `tier = (floor(burn_value_sat / unit) + 1) / 100_000`; the `+1` rounds
/// a value just under a tier boundary up into that tier, matching the
/// reference scanner's `nValue/COIN + 1` before dividing into the tier
/// table. Cross-checked against the tier table rather than trusted on
/// its own, since the two derivations must always agree.
pub fn tier_from_burn_formula(params: &ChainParams, value_sat: u64) -> Option<Tier> {
    const UNIT: u64 = 100_000_000;
    let hundred_k_units = (value_sat / UNIT + 1) / 100_000;
    let by_formula = match hundred_k_units {
        1 => Some(Tier::T1),
        5 => Some(Tier::T5),
        10 => Some(Tier::T10),
        _ => None,
    }?;
    let by_table = params.classify_burn_value(value_sat)?;
    (by_formula == by_table).then_some(by_formula)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_payload_round_trip() {
        let mut payload = b"DEADBEEF".to_vec();
        payload.push(b'1');
        assert_eq!(parse_vote_payload(&payload), Some(("DEADBEEF".to_string(), true)));
    }

    #[test]
    fn vote_payload_rejects_wrong_length() {
        assert_eq!(parse_vote_payload(b"short"), None);
    }

    #[test]
    fn metadata_payload_splits_on_first_space() {
        let payload = b"node-1 1.1.1.1:9999";
        assert_eq!(
            parse_metadata_payload(payload),
            Some(("node-1".to_string(), "1.1.1.1:9999".to_string()))
        );
    }

    #[test]
    fn tier_formula_matches_table() {
        let params = ChainParams::mainnet();
        let t1_value = params.tier_burn(Tier::T1);
        assert_eq!(tier_from_burn_formula(&params, t1_value), Some(Tier::T1));
    }
}
