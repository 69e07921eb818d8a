//! End-to-end scenarios built against the public `mnp-core` API, running
//! fully in-process against `MockChainSource`.

use std::sync::Arc;

use bitcoin::absolute::LockTime;
use bitcoin::blockdata::block::{Header, Version as BlockVersion};
use bitcoin::hash_types::TxMerkleNode;
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::pow::CompactTarget;
use bitcoin::script::Builder;
use bitcoin::transaction::Version as TxVersion;
use bitcoin::{Amount, Block, BlockHash, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use mnp_core::chain_source::mock::MockChainSource;
use mnp_core::{ChainParams, ChainSource, Node, Tier};

fn block_hash_for_height(height: u32) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.to_le_bytes());
    BlockHash::from_byte_array(bytes)
}

fn coinbase_tx() -> Transaction {
    Transaction {
        version: TxVersion::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![],
    }
}

fn simple_block(height: u32, txdata: Vec<Transaction>) -> Block {
    Block {
        header: Header {
            version: BlockVersion::ONE,
            prev_blockhash: block_hash_for_height(height.saturating_sub(1)),
            merkle_root: TxMerkleNode::from_byte_array([0u8; 32]),
            time: 0,
            bits: CompactTarget::from_consensus(0),
            nonce: 0,
        },
        txdata,
    }
}

/// Scenario 1: single T1 burn, payment at maturity.
///
/// Regtest genesis + 54 empty blocks + a T1 burn at height 55, then 55
/// further blocks. At height 110 the registry contains exactly one
/// matured node and `calc_rank(110, T1)` ranks it first.
#[tokio::test]
async fn single_t1_burn_matures_and_ranks_first() {
    let params = ChainParams::regtest();
    let mock = MockChainSource::new();

    let prev_tx = coinbase_tx();
    mock.insert_transaction(prev_tx.clone());

    let burn_script = Builder::new()
        .push_opcode(OP_RETURN)
        .push_slice(&params.burn_address_scripthash)
        .into_script();
    let burn_tx = Transaction {
        version: TxVersion::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(prev_tx.compute_txid(), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut { value: Amount::from_sat(params.tier_burn(Tier::T1)), script_pubkey: burn_script }],
    };

    let mut mock = mock;
    for height in 0..=110u32 {
        let txdata = if height == 55 { vec![coinbase_tx(), burn_tx.clone()] } else { vec![coinbase_tx()] };
        mock = mock.with_block(height, simple_block(height, txdata));
    }
    mock = mock.with_tip(110, block_hash_for_height(110));

    let chain: Arc<dyn ChainSource> = Arc::new(mock);
    let node = Node::new(chain, params);

    node.scan_and_absorb(110).await.expect("scan succeeds");

    assert_eq!(node.registry.count(), 1);

    let ranked = node.registry.calc_rank(110, Tier::T1, u32::MAX, false);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].0, 1);
}
