//! `PaymentVoter`: when this process is an operator, computes the next
//! block's payee, signs and emits a vote.

use bitcoin::{BlockHash, OutPoint, ScriptBuf};

use crate::error::VoteRejectReason;
use crate::params::SIGNATURES_TOTAL;
use crate::queue::next_in_queue;
use crate::registry::InfinityNodeRegistry;
use crate::signer::{vote_message, MessageSigner};
use crate::types::{PaymentVote, Tier, VoteHash};
use crate::votes::PaymentVoteStore;

/// How far ahead of tip the voter nominates a payee for.
pub const VOTE_LOOKAHEAD: u32 = 10;

pub struct PaymentVoter<'a> {
    pub registry: &'a InfinityNodeRegistry,
    pub vote_store: &'a PaymentVoteStore,
    pub signer: &'a dyn MessageSigner,
    pub own_outpoint: OutPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterError {
    RankOutsideSignatureSet,
    UnknownOwnTier,
    NoEligibleOperator,
    VoteRejected(VoteRejectReason),
}

impl<'a> PaymentVoter<'a> {
    /// Call whenever tip advances by one: `process_block(tip + 10)`.
    ///
    /// 1. own rank at `height - 101` must be within `SIGNATURES_TOTAL`.
    /// 2. resolve own tier from the registry.
    /// 3. find the next eligible operator of that tier.
    /// 4. sign and store the vote.
    pub fn process_block(
        &self,
        height: u32,
        block_hash_at: impl FnOnce(u32) -> Option<BlockHash>,
    ) -> Result<VoteHash, VoterError> {
        let own_node = self
            .registry
            .find(&self.own_outpoint)
            .ok_or(VoterError::UnknownOwnTier)?;

        let anchor_height = height.saturating_sub(101);
        let expire_height = u32::MAX;
        let own_rank = self
            .registry
            .calc_rank(anchor_height, own_node.tier, expire_height, false)
            .into_iter()
            .find(|(_, node)| node.burn_outpoint == self.own_outpoint)
            .map(|(rank, _)| rank);

        match own_rank {
            Some(rank) if rank <= SIGNATURES_TOTAL => {}
            _ => return Err(VoterError::RankOutsideSignatureSet),
        }

        let winner = next_in_queue(self.registry, own_node.tier, height, expire_height)
            .ok_or(VoterError::NoEligibleOperator)?;

        let payee: ScriptBuf = winner.script_pub_key.clone();
        let message = vote_message(&self.own_outpoint, height, &payee);
        let signature = self.signer.sign(&message);

        let vote = PaymentVote {
            operator_outpoint: self.own_outpoint,
            target_height: height,
            payee_script: payee,
            signature,
        };

        let tip_for_window = height.saturating_sub(VOTE_LOOKAHEAD);
        let storage_limit = PaymentVoteStore::storage_limit(self.registry.count());
        self.vote_store
            .add_vote(vote, Some(own_node.tier), own_rank, tip_for_window, storage_limit, block_hash_at)
            .map_err(VoterError::VoteRejected)
    }

    /// For the top-`SIGNATURES_TOTAL` operators at `prev_h - 101`, records
    /// which failed to vote for `prev_h + 10`, and returns whether at
    /// least one vote exists per tier (used to decide whether a tier
    /// should be burned instead of paid in `fill_block_payments`).
    pub fn check_previous_block_votes(&self, prev_h: u32) -> [bool; 3] {
        let target_height = prev_h + VOTE_LOOKAHEAD;
        let mut tier_has_vote = [false; 3];

        for (i, tier) in Tier::ALL.into_iter().enumerate() {
            if self.vote_store.get_best_payee(target_height, tier).is_some() {
                tier_has_vote[i] = true;
            }
        }

        let anchor_height = prev_h.saturating_sub(101);
        for tier in Tier::ALL {
            let ranked = self.registry.calc_rank(anchor_height, tier, u32::MAX, false);
            for (rank, node) in ranked.into_iter().take(SIGNATURES_TOTAL as usize) {
                let _ = rank;
                if self.vote_store.can_vote(&node.burn_outpoint, target_height) {
                    self.vote_store.record_did_not_vote(node.burn_outpoint);
                }
            }
        }

        tier_has_vote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Secp256k1Signer;
    use crate::test_util::{make_node, test_block_hash};
    use bitcoin::secp256k1::SecretKey;

    #[test]
    fn rejects_vote_when_rank_outside_signature_set() {
        let registry = InfinityNodeRegistry::new();
        let me = make_node(0, 10, Tier::T1);
        registry.add(me.clone(), 1000);

        // pad the registry with 30 higher-priority (earlier-burned) nodes so
        // `me`'s rank falls outside the top 30.
        for i in 1..=30u8 {
            registry.add(make_node(i, 1, Tier::T1), 1000);
        }

        let vote_store = PaymentVoteStore::new();
        let secret_key = SecretKey::from_slice(&[0x22; 32]).unwrap();
        let signer = Secp256k1Signer::new(secret_key);

        let voter = PaymentVoter {
            registry: &registry,
            vote_store: &vote_store,
            signer: &signer,
            own_outpoint: me.burn_outpoint,
        };

        let result = voter.process_block(1101, |_| Some(test_block_hash(1)));
        assert_eq!(result, Err(VoterError::RankOutsideSignatureSet));
    }

    #[test]
    fn process_block_records_vote_for_top_ranked_operator() {
        let registry = InfinityNodeRegistry::new();
        let me = make_node(0, 10, Tier::T1);
        registry.add(me.clone(), 1000);
        registry.add(make_node(1, 20, Tier::T1), 1000);

        let vote_store = PaymentVoteStore::new();
        let secret_key = SecretKey::from_slice(&[0x33; 32]).unwrap();
        let signer = Secp256k1Signer::new(secret_key);

        let voter = PaymentVoter {
            registry: &registry,
            vote_store: &vote_store,
            signer: &signer,
            own_outpoint: me.burn_outpoint,
        };

        let result = voter.process_block(1101, |_| Some(test_block_hash(1)));
        assert!(result.is_ok());
        assert!(!vote_store.can_vote(&me.burn_outpoint, 1101));
    }
}
