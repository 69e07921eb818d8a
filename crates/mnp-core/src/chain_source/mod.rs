//! The `ChainSource` trait is this crate's boundary onto block/transaction
//! storage, an external collaborator that the scanner, voter and
//! validator all depend on, so a concrete shape has to exist here.

pub mod http_adapter;
pub mod mock;

use async_trait::async_trait;
use bitcoin::{Block, BlockHash, OutPoint, Transaction, TxOut, Txid};

use crate::error::ChainSourceError;

#[derive(Debug, Clone)]
pub struct ChainTip {
    pub height: u32,
    pub hash: BlockHash,
}

/// Read-only access to block and transaction storage. `BlockScanner`,
/// `PaymentVoter`, and `PaymentValidator` only ever need to read chain
/// state, never write it.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn get_tip(&self) -> Result<ChainTip, ChainSourceError>;

    async fn get_block_hash(&self, height: u32) -> Result<BlockHash, ChainSourceError>;

    async fn get_block_by_height(&self, height: u32) -> Result<Block, ChainSourceError>;

    async fn read_block(&self, hash: &BlockHash) -> Result<Block, ChainSourceError>;

    async fn get_transaction(&self, txid: &Txid) -> Result<Transaction, ChainSourceError>;

    /// Resolves the output referenced by `outpoint`, i.e. the destination
    /// being spent by a burn transaction's `vin[0]`.
    async fn get_utxo(&self, outpoint: &OutPoint) -> Result<TxOut, ChainSourceError> {
        let tx = self.get_transaction(&outpoint.txid).await?;
        tx.output
            .get(outpoint.vout as usize)
            .cloned()
            .ok_or(ChainSourceError::TxNotFound(outpoint.txid))
    }
}
