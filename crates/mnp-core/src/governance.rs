//! `GovernanceVotes`: per-proposal vote aggregation, weighted tally.

use std::collections::HashMap;
use std::sync::Mutex;

use bitcoin::ScriptBuf;

use crate::registry::InfinityNodeRegistry;
use crate::types::{GovernanceVote, Tier};

/// Tally mode for `result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyMode {
    /// +1 per vote regardless of node status.
    Public,
    /// 0 if the voter is not a known infinity-node operator, else 2/10/20
    /// for T1/T5/T10.
    NodeOnly,
    /// Same per-tier weights as `NodeOnly`, but a non-node voter still
    /// counts as 1 instead of 0.
    Combined,
}

fn node_weight(tier: Tier) -> u64 {
    match tier {
        Tier::T1 => 2,
        Tier::T5 => 10,
        Tier::T10 => 20,
    }
}

#[derive(Default)]
pub struct GovernanceVotes {
    by_proposal: Mutex<HashMap<String, Vec<GovernanceVote>>>,
}

impl GovernanceVotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `vote`, deduplicating by voter-script within the proposal;
    /// on a duplicate, keeps whichever has the higher `burn_height`.
    pub fn add(&self, vote: GovernanceVote) {
        let mut by_proposal = self.by_proposal.lock().unwrap();
        let votes = by_proposal.entry(vote.proposal_id.clone()).or_default();

        if let Some(existing) = votes.iter_mut().find(|v| v.voter_script == vote.voter_script) {
            if vote.burn_height > existing.burn_height {
                *existing = vote;
            }
            return;
        }
        votes.push(vote);
    }

    /// Sums the weight of votes matching `opinion` on `proposal`, weighted
    /// per `mode`. Node operator status is resolved against `registry` by
    /// matching the voter script to a matured node's script-pubkey.
    pub fn result(
        &self,
        registry: &InfinityNodeRegistry,
        proposal: &str,
        opinion: bool,
        mode: TallyMode,
    ) -> u64 {
        let by_proposal = self.by_proposal.lock().unwrap();
        let Some(votes) = by_proposal.get(proposal) else {
            return 0;
        };

        votes
            .iter()
            .filter(|v| v.opinion == opinion)
            .map(|v| weight_for(registry, &v.voter_script, mode))
            .sum()
    }

    pub fn votes_for(&self, proposal: &str) -> Vec<GovernanceVote> {
        self.by_proposal.lock().unwrap().get(proposal).cloned().unwrap_or_default()
    }

    /// Rebuilds the vote map from scratch. Analogous to the scanner's burn
    /// walk, but restricted to governance-address outputs; the actual
    /// chain walk lives in the scanner, so this just replaces state with
    /// whatever the caller already re-derived.
    pub fn rsv_scan(&self, rebuilt: HashMap<String, Vec<GovernanceVote>>) {
        *self.by_proposal.lock().unwrap() = rebuilt;
    }
}

fn weight_for(registry: &InfinityNodeRegistry, voter_script: &ScriptBuf, mode: TallyMode) -> u64 {
    let node_tier = registry
        .full_map()
        .values()
        .find(|n| &n.script_pub_key == voter_script)
        .map(|n| n.tier);

    match (mode, node_tier) {
        (TallyMode::Public, _) => 1,
        (TallyMode::NodeOnly, Some(tier)) => node_weight(tier),
        (TallyMode::NodeOnly, None) => 0,
        (TallyMode::Combined, Some(tier)) => node_weight(tier),
        (TallyMode::Combined, None) => 1,
    }
}
