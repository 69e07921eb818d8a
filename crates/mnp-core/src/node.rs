//! Top-level context owning the registry, statement schedule, vote
//! store, and governance store as a single explicit lifetime, replacing
//! the reference implementation's `mnpayments`/`infnodeman`/`infnodersv`
//! global singletons.

use std::sync::Arc;

use bitcoin::OutPoint;

use crate::cache::Cache;
use crate::chain_source::ChainSource;
use crate::error::CoreError;
use crate::governance::GovernanceVotes;
use crate::params::ChainParams;
use crate::registry::InfinityNodeRegistry;
use crate::scanner::{scan_range, ScanOutcome};
use crate::statement::StatementSchedule;
use crate::types::{ScanEvent, Tier};
use crate::votes::PaymentVoteStore;

/// Owns every piece of mutable subsystem state. Constructed once at
/// startup and torn down (persisted) in the reverse order its pieces
/// were built, same as the singletons it replaces.
pub struct Node {
    pub chain: Arc<dyn ChainSource>,
    pub params: ChainParams,
    pub registry: InfinityNodeRegistry,
    pub statements: StatementSchedule,
    pub votes: PaymentVoteStore,
    pub governance: GovernanceVotes,
    pub cache: Cache,
    last_scan_height: std::sync::atomic::AtomicU32,
}

impl Node {
    pub fn new(chain: Arc<dyn ChainSource>, params: ChainParams) -> Self {
        Self {
            chain,
            params,
            registry: InfinityNodeRegistry::new(),
            statements: StatementSchedule::new(),
            votes: PaymentVoteStore::new(),
            governance: GovernanceVotes::new(),
            cache: Cache::new(),
            last_scan_height: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn last_scan_height(&self) -> u32 {
        self.last_scan_height.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Runs one scan pass from the current tip back to `last_scan_height`,
    /// applies the resulting events to the registry and governance store,
    /// and re-extends statements for any tier whose schedule ran low.
    ///
    /// On failure, `last_scan_height` is left untouched so the caller can
    /// retry at the next tip update.
    pub async fn scan_and_absorb(&self, tip_height: u32) -> Result<(), CoreError> {
        let low = self.last_scan_height();
        let outcome: ScanOutcome = scan_range(self.chain.as_ref(), &self.params, &self.cache, tip_height, low)
            .await
            .map_err(CoreError::Scan)?;

        // non-matured entries are recomputed fresh on every successful
        // scan; only bursts seen again in this pass get re-added.
        self.registry.replace_non_matured(std::collections::HashMap::new());

        for event in outcome.events {
            match event {
                ScanEvent::Burn { outpoint, height, value_sat, script, collateral_address, backup_address } => {
                    let Some(tier) = self.params.classify_burn_value(value_sat) else {
                        continue;
                    };
                    let mut node = crate::types::InfinityNode::new(
                        outpoint,
                        tier,
                        height,
                        value_sat,
                        script,
                        collateral_address,
                    );
                    node.backup_address = backup_address;
                    self.registry.add(node, tip_height);
                }
                ScanEvent::GovernanceVote(vote) => {
                    self.governance.add(vote);
                }
                ScanEvent::MetadataUpdate { collateral, node_address, service, height } => {
                    self.registry.update_metadata(&collateral, node_address, service, height);
                }
            }
        }

        for (script, height) in outcome.last_paid_observations {
            self.registry.update_last_paid(script, height);
        }

        for tier in Tier::ALL {
            self.extend_statement_if_needed(tier, tip_height);
        }

        self.last_scan_height
            .store(outcome.new_scan_height, std::sync::atomic::Ordering::Release);

        Ok(())
    }

    fn extend_statement_if_needed(&self, tier: Tier, tip: u32) {
        if self.statements.needs_extension(tier, tip, crate::params::INF_MATURED_LIMIT) {
            self.statements.deterministic_reward_statement(
                &self.registry,
                tier,
                self.params.infinity_genesis_statement_height,
                tip,
                |_h| u32::MAX,
            );
        }
    }

    /// Periodic housekeeping call for the vote store: drops stale votes
    /// and emptied tallies relative to `tip`.
    pub fn check_and_remove_votes(&self, tip: u32) {
        let limit = PaymentVoteStore::storage_limit(self.registry.count());
        self.votes.check_and_remove(tip, limit);
    }

    pub fn has_operator(&self, outpoint: &OutPoint) -> bool {
        self.registry.has(outpoint)
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
    use bitcoin::transaction::Version as TxVersion;
    use bitcoin::{Block, ScriptBuf, Sequence, Transaction, TxIn, Witness};

    fn empty_block_with_coinbase() -> Block {
        let coinbase = Transaction {
            version: TxVersion::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![],
        };
        Block {
            header: Header {
                version: BlockVersion::ONE,
                prev_blockhash: crate::test_util::test_block_hash(0),
                merkle_root: TxMerkleNode::from_byte_array([0u8; 32]),
                time: 0,
                bits: CompactTarget::from_consensus(0),
                nonce: 0,
            },
            txdata: vec![coinbase],
        }
    }

    #[tokio::test]
    async fn scan_and_absorb_is_noop_on_empty_chain() {
        let mock = MockChainSource::new()
            .with_tip(0, crate::test_util::test_block_hash(0))
            .with_block(0, empty_block_with_coinbase());
        let chain: Arc<dyn ChainSource> = Arc::new(mock);
        let node = Node::new(chain, ChainParams::regtest());

        let result = node.scan_and_absorb(0).await;
        assert!(result.is_ok());
        assert_eq!(node.registry.count(), 0);
    }
}
