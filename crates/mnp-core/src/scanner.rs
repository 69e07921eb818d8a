//! `BlockScanner`: walks blockchain history, classifies outputs, and
//! produces burn/vote/metadata events for the registry and governance
//! store to absorb.

use bitcoin::{Block, OutPoint, ScriptBuf, Transaction};

use crate::cache::Cache;
use crate::chain_source::ChainSource;
use crate::error::ScanError;
use crate::params::ChainParams;
use crate::reward::get_masternode_payment;
use crate::script::{classify_burn_script, parse_metadata_payload, parse_vote_payload, BurnDestination};
use crate::types::{ScanEvent, Tier};

pub struct ScanOutcome {
    pub events: Vec<ScanEvent>,
    /// `(output_script, height)` pairs observed paying an exact tier
    /// reward in a coinbase within `paid_scan_depth`; caller folds these
    /// into the registry's `mapLastPaid`, keeping the max height per
    /// script.
    pub last_paid_observations: Vec<(ScriptBuf, u32)>,
    pub new_scan_height: u32,
}

/// Scans blocks `[low, tip]` descending, classifying every non-coinbase
/// output that parses as a recognized burn payload, and every coinbase
/// output within `paid_scan_depth` of `tip` that pays an exact tier
/// reward.
///
/// A missing previous transaction or undecodable destination aborts the
/// scan and returns `Err`; the caller leaves `last_scan_height` unchanged
/// and retries at the next tip update, per the scanner's failure policy.
pub async fn scan_range(
    chain: &dyn ChainSource,
    params: &ChainParams,
    cache: &Cache,
    tip: u32,
    low: u32,
) -> Result<ScanOutcome, ScanError> {
    let mut events = Vec::new();
    let mut last_paid_observations = Vec::new();
    let paid_scan_depth = params.paid_scan_depth(tip);
    let paid_scan_floor = tip.saturating_sub(paid_scan_depth);

    let mut height = tip;
    while height >= low {
        let block = chain.get_block_by_height(height).await.map_err(ScanError::TransientIo)?;

        for (tx_index, tx) in block.txdata.iter().enumerate() {
            let is_coinbase = tx_index == 0;

            if is_coinbase {
                if height >= paid_scan_floor {
                    collect_last_paid(tx, height, &mut last_paid_observations);
                }
                continue;
            }

            for (vout, out) in tx.output.iter().enumerate() {
                let Some((destination, pushes)) = classify_burn_script(params, &out.script_pubkey) else {
                    continue;
                };

                let outpoint = OutPoint::new(tx.compute_txid(), vout as u32);
                let value_sat = out.value.to_sat();

                let is_matured = height.saturating_add(crate::params::INF_MATURED_LIMIT) <= tip;

                match destination {
                    BurnDestination::BurnAddress => {
                        if value_sat == params.vote_value {
                            if let Some(payload) = pushes.get(1) {
                                if let Some((proposal_id, opinion)) = parse_vote_payload(payload) {
                                    if is_matured {
                                        events.push(ScanEvent::GovernanceVote(crate::types::GovernanceVote {
                                            proposal_id,
                                            voter_script: out.script_pubkey.clone(),
                                            burn_height: height,
                                            opinion,
                                        }));
                                    }
                                    continue;
                                }
                            }
                        }

                        if let Some(_tier) = params.classify_burn_value(value_sat) {
                            let collateral_address = resolve_collateral_address(chain, cache, tx).await?;
                            let backup_address = pushes.get(1).and_then(|b| String::from_utf8(b.clone()).ok());
                            events.push(ScanEvent::Burn {
                                outpoint,
                                height,
                                value_sat,
                                script: out.script_pubkey.clone(),
                                collateral_address,
                                backup_address,
                            });
                        }
                    }
                    BurnDestination::GovernanceAddress => {
                        if is_matured {
                            if let Some(payload) = pushes.get(1) {
                                if let Some((proposal_id, opinion)) = parse_vote_payload(payload) {
                                    events.push(ScanEvent::GovernanceVote(crate::types::GovernanceVote {
                                        proposal_id,
                                        voter_script: out.script_pubkey.clone(),
                                        burn_height: height,
                                        opinion,
                                    }));
                                }
                            }
                        }
                    }
                    BurnDestination::MetadataAddress => {
                        if params.classify_burn_value(value_sat) == Some(Tier::T1) {
                            if let Some(payload) = pushes.get(1) {
                                if let Some((node_address, service)) = parse_metadata_payload(payload) {
                                    let collateral_address = resolve_collateral_address(chain, cache, tx).await?;
                                    events.push(ScanEvent::MetadataUpdate {
                                        collateral: collateral_address,
                                        node_address,
                                        service,
                                        height,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        if height == 0 {
            break;
        }
        height -= 1;
    }

    Ok(ScanOutcome { events, last_paid_observations, new_scan_height: tip.saturating_sub(crate::params::INF_MATURED_LIMIT) })
}

/// Resolves the destination script of the output referenced by `vin[0]`,
/// the burn's collateral address. Repeated burns from the same previous
/// transaction (rare, but possible with batched collateral moves) hit the
/// cache instead of re-fetching.
async fn resolve_collateral_address(
    chain: &dyn ChainSource,
    cache: &Cache,
    tx: &Transaction,
) -> Result<ScriptBuf, ScanError> {
    let first_input = tx.input.first().ok_or(ScanError::MissingPrevTx(OutPoint::null()))?;
    let prev_outpoint = first_input.previous_output;

    if let Some(cached) = cache.get_prevout(&prev_outpoint) {
        return Ok(cached.script_pubkey);
    }

    let prev_tx = match cache.get_transaction(&prev_outpoint.txid) {
        Some(tx) => tx,
        None => {
            let tx = chain
                .get_transaction(&prev_outpoint.txid)
                .await
                .map_err(ScanError::TransientIo)?;
            cache.insert_transaction(prev_outpoint.txid, tx.clone());
            tx
        }
    };

    let txout = prev_tx
        .output
        .get(prev_outpoint.vout as usize)
        .cloned()
        .ok_or(ScanError::MissingPrevTx(prev_outpoint))?;
    cache.insert_prevout(prev_outpoint, txout.clone());
    Ok(txout.script_pubkey)
}

fn collect_last_paid(coinbase: &Transaction, height: u32, out: &mut Vec<(ScriptBuf, u32)>) {
    for output in &coinbase.output {
        for tier in Tier::ALL {
            if output.value == get_masternode_payment(height, tier) {
                out.push((output.script_pubkey.clone(), height));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_source::mock::MockChainSource;
    use bitcoin::absolute::LockTime;
    use bitcoin::blockdata::block::{Header, Version as BlockVersion};
    use bitcoin::hash_types::TxMerkleNode;
    use bitcoin::hashes::Hash;
    use bitcoin::pow::CompactTarget;
    use bitcoin::script::Builder;
    use bitcoin::transaction::Version as TxVersion;
    use bitcoin::{Amount, ScriptBuf, Sequence, TxIn, TxOut, Witness};

    fn empty_block(prev_blockhash: bitcoin::BlockHash, txdata: Vec<Transaction>) -> Block {
        Block {
            header: Header {
                version: BlockVersion::ONE,
                prev_blockhash,
                merkle_root: TxMerkleNode::from_byte_array([0u8; 32]),
                time: 0,
                bits: CompactTarget::from_consensus(0),
                nonce: 0,
            },
            txdata,
        }
    }

    fn coinbase_tx(outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: TxVersion::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: outputs,
        }
    }

    fn burn_output(params: &ChainParams, tier: Tier) -> TxOut {
        let script = Builder::new()
            .push_opcode(bitcoin::opcodes::all::OP_RETURN)
            .push_slice(&params.burn_address_scripthash)
            .into_script();
        TxOut { value: Amount::from_sat(params.tier_burn(tier)), script_pubkey: script }
    }

    fn governance_vote_output(params: &ChainParams) -> TxOut {
        let mut payload = b"DEADBEEF".to_vec();
        payload.push(b'1');
        let payload = bitcoin::script::PushBytesBuf::try_from(payload).unwrap();
        let script = Builder::new()
            .push_opcode(bitcoin::opcodes::all::OP_RETURN)
            .push_slice(&params.governance_address_scripthash)
            .push_slice(payload)
            .into_script();
        TxOut { value: Amount::from_sat(1), script_pubkey: script }
    }

    #[tokio::test]
    async fn scan_classifies_burn_output() {
        let params = ChainParams::regtest();
        let chain = MockChainSource::new();

        let prev_tx = coinbase_tx(vec![TxOut { value: Amount::from_sat(1), script_pubkey: ScriptBuf::new() }]);
        chain.insert_transaction(prev_tx.clone());

        let burn_tx = Transaction {
            version: TxVersion::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(prev_tx.compute_txid(), 0),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![burn_output(&params, Tier::T1)],
        };

        let block = empty_block(test_genesis_hash(), vec![coinbase_tx(vec![]), burn_tx]);
        let chain = chain.with_block(100, block).with_tip(100, test_genesis_hash());

        let cache = Cache::new();
        let outcome = scan_range(&chain, &params, &cache, 100, 100).await.unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(outcome.events[0], ScanEvent::Burn { .. }));
    }

    fn vote_tx(output: TxOut) -> Transaction {
        Transaction {
            version: TxVersion::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![output],
        }
    }

    /// Registers the vote block at `vote_height` and an empty block at every
    /// other height in `[vote_height, tip]`, since `scan_range` walks the
    /// whole range and errors on any height with no registered block.
    fn chain_with_vote_at(vote_height: u32, tip: u32, vote_block: Block) -> MockChainSource {
        let mut chain = MockChainSource::new();
        for height in vote_height..=tip {
            let block = if height == vote_height {
                vote_block.clone()
            } else {
                empty_block(test_genesis_hash(), vec![coinbase_tx(vec![])])
            };
            chain = chain.with_block(height, block);
        }
        chain.with_tip(tip, test_genesis_hash())
    }

    #[tokio::test]
    async fn immature_governance_vote_is_dropped() {
        let params = ChainParams::regtest();
        let vote_height = 100;
        let tip = vote_height + crate::params::INF_MATURED_LIMIT - 1;
        let block = empty_block(test_genesis_hash(), vec![coinbase_tx(vec![]), vote_tx(governance_vote_output(&params))]);
        let chain = chain_with_vote_at(vote_height, tip, block);

        let cache = Cache::new();
        let outcome = scan_range(&chain, &params, &cache, tip, vote_height).await.unwrap();
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn matured_governance_vote_is_emitted() {
        let params = ChainParams::regtest();
        let vote_height = 100;
        let tip = vote_height + crate::params::INF_MATURED_LIMIT;
        let block = empty_block(test_genesis_hash(), vec![coinbase_tx(vec![]), vote_tx(governance_vote_output(&params))]);
        let chain = chain_with_vote_at(vote_height, tip, block);

        let cache = Cache::new();
        let outcome = scan_range(&chain, &params, &cache, tip, vote_height).await.unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(outcome.events[0], ScanEvent::GovernanceVote(_)));
    }

    fn test_genesis_hash() -> bitcoin::BlockHash {
        bitcoin::BlockHash::from_byte_array([0u8; 32])
    }
}
