//! `PaymentValidator`: validates coinbase outputs against winning payees
//! and tier burns.

use bitcoin::{Amount, ScriptBuf, Transaction, TxOut};

use crate::params::{ChainParams, SIGNATURES_REQUIRED};
use crate::queue::next_in_queue;
use crate::registry::InfinityNodeRegistry;
use crate::reward::get_masternode_payment;
use crate::types::Tier;
use crate::votes::PaymentVoteStore;

pub struct PaymentValidator<'a> {
    pub registry: &'a InfinityNodeRegistry,
    pub vote_store: &'a PaymentVoteStore,
    pub params: &'a ChainParams,
}

/// Node sync / enforcement-spork status, threaded in by the caller rather
/// than owned here (this crate has no P2P or spork-signing logic of its
/// own).
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub node_synced: bool,
    pub enforcement_spork_active: bool,
}

impl<'a> PaymentValidator<'a> {
    /// True iff the coinbase's total output does not exceed `block_reward`.
    /// Budget/superblock windows are recognized in the data model but
    /// treated as permanently inert, so they never affect this check.
    pub fn is_block_value_valid(&self, coinbase: &Transaction, block_reward: Amount) -> bool {
        let total: Option<Amount> = coinbase
            .output
            .iter()
            .try_fold(Amount::ZERO, |acc, out| acc.checked_add(out.value));
        matches!(total, Some(total) if total <= block_reward)
    }

    /// Delegates to `is_transaction_valid`, short-circuiting to accept if
    /// the node isn't synced yet or enforcement is sporked off.
    pub fn is_block_payee_valid(
        &self,
        coinbase: &Transaction,
        height: u32,
        ctx: ValidationContext,
    ) -> bool {
        if !ctx.node_synced {
            return true;
        }
        if !ctx.enforcement_spork_active {
            tracing::warn!(height, "masternode payment enforcement spork inactive, accepting coinbase");
            return true;
        }
        self.is_transaction_valid(coinbase, height)
    }

    /// If fewer than `SIGNATURES_REQUIRED` votes exist on any payee at
    /// `height`, accept unconditionally. Otherwise outputs at (1-indexed)
    /// positions 3..5 must each pay the burn address, the elected payee at
    /// the exact tier reward, or a payee with at least
    /// `SIGNATURES_REQUIRED - 1` votes.
    pub fn is_transaction_valid(&self, coinbase: &Transaction, height: u32) -> bool {
        let tiers = Tier::ALL;
        let any_tier_has_quorum = tiers.iter().any(|&tier| self.tier_vote_count(height, tier) >= SIGNATURES_REQUIRED);
        if !any_tier_has_quorum {
            return true;
        }

        for (slot, tier) in [3usize, 4, 5].into_iter().zip(tiers) {
            let Some(out) = coinbase.output.get(slot.saturating_sub(1)) else {
                return false;
            };
            if !self.output_matches_tier(out, height, tier) {
                return false;
            }
        }
        true
    }

    fn tier_vote_count(&self, height: u32, tier: Tier) -> u32 {
        self.vote_store.winning_vote_count(height, tier)
    }

    fn output_matches_tier(&self, out: &TxOut, height: u32, tier: Tier) -> bool {
        let is_burn_address_script = is_burn_destination(&out.script_pubkey, self.params);
        if is_burn_address_script {
            return true;
        }

        let Some(elected_payee) = self.vote_store.get_best_payee(height, tier) else {
            return false;
        };
        let expected_value = get_masternode_payment(height, tier);

        if out.script_pubkey == elected_payee {
            let votes = self.vote_store.winning_vote_count(height, tier);
            return out.value == expected_value || votes >= SIGNATURES_REQUIRED - 1;
        }
        false
    }

    /// 1. resolve each tier's payee (gossip tally, else local computation,
    ///    else burn). 2. append a payment output per active tier. 3.
    ///    repeat for `height + 1`.
    pub fn fill_block_payments(
        &self,
        coinbase_template: &mut Transaction,
        height: u32,
        tier_active: impl Fn(Tier) -> bool,
    ) -> Vec<TxOut> {
        let mut masternode_outs = Vec::new();

        for probe_height in [height, height + 1] {
            for tier in Tier::ALL {
                if !tier_active(tier) {
                    continue;
                }
                let payee_script = self
                    .vote_store
                    .get_best_payee(probe_height, tier)
                    .or_else(|| {
                        next_in_queue(self.registry, tier, probe_height, u32::MAX).map(|n| n.script_pub_key)
                    })
                    .unwrap_or_else(|| burn_script(self.params));

                let amount = get_masternode_payment(probe_height, tier);
                if let Some(first) = coinbase_template.output.first_mut() {
                    first.value = first.value.checked_sub(amount).unwrap_or(first.value);
                }
                masternode_outs.push(TxOut { value: amount, script_pubkey: payee_script });
            }
        }

        masternode_outs
    }
}

fn is_burn_destination(script: &ScriptBuf, params: &ChainParams) -> bool {
    crate::script::classify_burn_script(params, script)
        .map(|(dest, _)| dest == crate::script::BurnDestination::BurnAddress)
        .unwrap_or(false)
}

fn burn_script(_params: &ChainParams) -> ScriptBuf {
    use bitcoin::opcodes::all::OP_RETURN;
    use bitcoin::script::Builder;
    Builder::new().push_opcode(OP_RETURN).into_script()
}
