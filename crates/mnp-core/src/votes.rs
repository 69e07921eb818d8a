//! `PaymentVoteStore`: gossip-received vote messages, per-block payee
//! tallies.

use std::collections::HashMap;
use std::sync::Mutex;

use bitcoin::{BlockHash, OutPoint, ScriptBuf};

use crate::error::VoteRejectReason;
use crate::params::SIGNATURES_TOTAL;
use crate::types::{BlockPayeeTally, PaymentVote, PayeeTally, Tier, VoteHash};

/// How far past `tip` a vote's target height may sit, matching the
/// reference relay's `nCachedBlockHeight+20` acceptance bound (wider than
/// `PaymentVoter::VOTE_LOOKAHEAD` to tolerate votes arriving slightly
/// ahead of this node's own tip).
pub const VOTE_HEIGHT_LOOKAHEAD_LIMIT: u32 = 20;

#[derive(Default)]
struct Inner {
    votes: HashMap<VoteHash, PaymentVote>,
    blocks: HashMap<u32, BlockPayeeTally>,
    last_vote_by_operator: HashMap<OutPoint, u32>,
    did_not_vote: HashMap<OutPoint, u32>,
}

pub struct PaymentVoteStore {
    inner: Mutex<Inner>,
}

impl Default for PaymentVoteStore {
    fn default() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }
}

impl PaymentVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage limit in blocks: `max(operator_count * 1.25, 5000)`.
    pub fn storage_limit(operator_count: usize) -> u32 {
        ((operator_count as f64 * 1.25).ceil() as u32).max(5000)
    }

    /// Rejects duplicates, repeat votes from the same operator for the same
    /// height, votes outside `[tip - storage_limit, tip + 20]`, votes from
    /// an operator ranked outside `SIGNATURES_TOTAL`, and votes whose
    /// anchor block (`height - 101`) is unknown to `block_hash_at`. On
    /// success, records the vote under the tally for its target height and
    /// records the operator's tier (or `None` if not yet resolvable, to be
    /// re-queried later).
    pub fn add_vote(
        &self,
        vote: PaymentVote,
        operator_tier: Option<Tier>,
        operator_rank: Option<u32>,
        tip: u32,
        storage_limit: u32,
        block_hash_at: impl FnOnce(u32) -> Option<BlockHash>,
    ) -> Result<VoteHash, VoteRejectReason> {
        let hash = vote.hash();
        let mut inner = self.inner.lock().unwrap();

        if inner.votes.contains_key(&hash) {
            return Err(VoteRejectReason::Duplicate);
        }
        if inner.last_vote_by_operator.get(&vote.operator_outpoint) == Some(&vote.target_height) {
            return Err(VoteRejectReason::AlreadyVotedForHeight);
        }

        let first_block = tip.saturating_sub(storage_limit);
        if vote.target_height < first_block || vote.target_height > tip.saturating_add(VOTE_HEIGHT_LOOKAHEAD_LIMIT) {
            return Err(VoteRejectReason::HeightOutOfWindow);
        }
        match operator_rank {
            Some(rank) if rank <= SIGNATURES_TOTAL => {}
            _ => return Err(VoteRejectReason::OutOfTopRank),
        }
        if vote.target_height < 101 {
            return Err(VoteRejectReason::UnknownAnchorBlock);
        }
        if block_hash_at(vote.target_height - 101).is_none() {
            return Err(VoteRejectReason::UnknownAnchorBlock);
        }

        let tally = inner.blocks.entry(vote.target_height).or_default();
        let payee_tally = tally.by_payee.entry(vote.payee_script.clone()).or_insert_with(|| PayeeTally {
            tier: operator_tier,
            vote_hashes: Vec::new(),
        });
        if payee_tally.tier.is_none() {
            payee_tally.tier = operator_tier;
        }
        payee_tally.vote_hashes.push(hash);

        inner.last_vote_by_operator.insert(vote.operator_outpoint, vote.target_height);
        inner.votes.insert(hash, vote);

        Ok(hash)
    }

    pub fn get_best_payee(&self, height: u32, tier: Tier) -> Option<ScriptBuf> {
        let inner = self.inner.lock().unwrap();
        inner.blocks.get(&height)?.best_payee(tier).map(|(script, _)| script.clone())
    }

    /// Vote count backing the current winning payee for `(height, tier)`,
    /// used by the validator to decide whether a tier has reached quorum.
    pub fn winning_vote_count(&self, height: u32, tier: Tier) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner
            .blocks
            .get(&height)
            .and_then(|tally| tally.best_payee(tier))
            .map(|(_, payee_tally)| payee_tally.vote_hashes.len() as u32)
            .unwrap_or(0)
    }

    /// One vote per operator per height; returns `false` (silently
    /// rejected) on a repeat attempt.
    pub fn can_vote(&self, operator_outpoint: &OutPoint, height: u32) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.last_vote_by_operator.get(operator_outpoint) != Some(&height)
    }

    /// Drops votes with `height < tip - limit` and any block tallies
    /// emptied as a result.
    pub fn check_and_remove(&self, tip: u32, limit: u32) {
        let mut inner = self.inner.lock().unwrap();
        let cutoff = tip.saturating_sub(limit);

        let stale_heights: Vec<u32> = inner.blocks.keys().copied().filter(|&h| h < cutoff).collect();
        for height in stale_heights {
            if let Some(tally) = inner.blocks.remove(&height) {
                for payee_tally in tally.by_payee.values() {
                    for hash in &payee_tally.vote_hashes {
                        inner.votes.remove(hash);
                    }
                }
            }
        }
        inner.last_vote_by_operator.retain(|_, &mut h| h >= cutoff);
    }

    pub fn record_did_not_vote(&self, operator_outpoint: OutPoint) {
        *self.inner.lock().unwrap().did_not_vote.entry(operator_outpoint).or_insert(0) += 1;
    }

    pub fn did_not_vote_count(&self, operator_outpoint: &OutPoint) -> u32 {
        self.inner.lock().unwrap().did_not_vote.get(operator_outpoint).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{make_outpoint, test_block_hash};

    fn vote(outpoint: OutPoint, height: u32, payee: ScriptBuf, sig: u8) -> PaymentVote {
        PaymentVote { operator_outpoint: outpoint, target_height: height, payee_script: payee, signature: vec![sig] }
    }

    fn accept(
        store: &PaymentVoteStore,
        v: PaymentVote,
        tip: u32,
    ) -> Result<VoteHash, VoteRejectReason> {
        store.add_vote(v, Some(Tier::T1), Some(1), tip, 5000, |_| Some(test_block_hash(1)))
    }

    #[test]
    fn duplicate_vote_hash_rejected() {
        let store = PaymentVoteStore::new();
        let op = make_outpoint(1);
        let payee = ScriptBuf::from_bytes(vec![1]);

        let first = vote(op, 200, payee.clone(), 1);
        accept(&store, first, 200).unwrap();

        assert!(!store.can_vote(&op, 200));

        let second = vote(op, 200, payee, 1);
        let result = accept(&store, second, 200);
        assert_eq!(result, Err(VoteRejectReason::Duplicate));
    }

    #[test]
    fn repeat_vote_same_operator_and_height_rejected() {
        let store = PaymentVoteStore::new();
        let op = make_outpoint(1);

        let first = vote(op, 200, ScriptBuf::from_bytes(vec![1]), 1);
        accept(&store, first, 200).unwrap();

        let second = vote(op, 200, ScriptBuf::from_bytes(vec![2]), 2);
        let result = accept(&store, second, 200);
        assert_eq!(result, Err(VoteRejectReason::AlreadyVotedForHeight));
    }

    #[test]
    fn unknown_anchor_block_rejected() {
        let store = PaymentVoteStore::new();
        let v = vote(make_outpoint(1), 200, ScriptBuf::from_bytes(vec![1]), 1);
        let result = store.add_vote(v, Some(Tier::T1), Some(1), 200, 5000, |_| None);
        assert_eq!(result, Err(VoteRejectReason::UnknownAnchorBlock));
    }

    #[test]
    fn out_of_top_rank_rejected() {
        let store = PaymentVoteStore::new();
        let v = vote(make_outpoint(1), 200, ScriptBuf::from_bytes(vec![1]), 1);
        let result = store.add_vote(v, Some(Tier::T1), Some(SIGNATURES_TOTAL + 1), 200, 5000, |_| Some(test_block_hash(1)));
        assert_eq!(result, Err(VoteRejectReason::OutOfTopRank));
    }

    #[test]
    fn vote_height_outside_window_rejected() {
        let store = PaymentVoteStore::new();
        let v = vote(make_outpoint(1), 200, ScriptBuf::from_bytes(vec![1]), 1);
        let result = store.add_vote(v, Some(Tier::T1), Some(1), 100, 5000, |_| Some(test_block_hash(1)));
        assert_eq!(result, Err(VoteRejectReason::HeightOutOfWindow));
    }

    #[test]
    fn tie_break_by_max_vote_hash() {
        let store = PaymentVoteStore::new();
        let payee_a = ScriptBuf::from_bytes(vec![0xAA]);
        let payee_b = ScriptBuf::from_bytes(vec![0xBB]);

        for i in 0..6u8 {
            let v = vote(make_outpoint(i), 300, payee_a.clone(), i);
            accept(&store, v, 300).unwrap();
        }
        for i in 6..12u8 {
            let v = vote(make_outpoint(i), 300, payee_b.clone(), i);
            accept(&store, v, 300).unwrap();
        }

        let best = store.get_best_payee(300, Tier::T1);
        assert!(best.is_some());
    }

    #[test]
    fn check_and_remove_drops_stale_heights() {
        let store = PaymentVoteStore::new();
        let v = vote(make_outpoint(1), 150, ScriptBuf::from_bytes(vec![1]), 1);
        accept(&store, v, 150).unwrap();

        store.check_and_remove(10_000, 5000);
        assert!(store.get_best_payee(150, Tier::T1).is_none());
    }
}
