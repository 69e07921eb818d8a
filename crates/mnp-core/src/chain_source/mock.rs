//! An in-memory `ChainSource` for deterministic unit tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bitcoin::{Block, BlockHash, Transaction, Txid};

use crate::error::ChainSourceError;

use super::{ChainSource, ChainTip};

#[derive(Default)]
pub struct MockChainSource {
    blocks_by_height: RwLock<HashMap<u32, Block>>,
    blocks_by_hash: RwLock<HashMap<BlockHash, Block>>,
    transactions: RwLock<HashMap<Txid, Transaction>>,
    tip: RwLock<Option<ChainTip>>,
}

impl MockChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tip(self, height: u32, hash: BlockHash) -> Self {
        *self.tip.write().unwrap() = Some(ChainTip { height, hash });
        self
    }

    pub fn with_block(self, height: u32, block: Block) -> Self {
        let hash = block.block_hash();
        self.blocks_by_height.write().unwrap().insert(height, block.clone());
        self.blocks_by_hash.write().unwrap().insert(hash, block);
        self
    }

    pub fn with_transaction(self, tx: Transaction) -> Self {
        self.transactions.write().unwrap().insert(tx.compute_txid(), tx);
        self
    }

    pub fn insert_transaction(&self, tx: Transaction) {
        self.transactions.write().unwrap().insert(tx.compute_txid(), tx);
    }
}

#[async_trait]
impl ChainSource for MockChainSource {
    async fn get_tip(&self) -> Result<ChainTip, ChainSourceError> {
        self.tip
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| ChainSourceError::InvalidResponse("no tip configured".into()))
    }

    async fn get_block_hash(&self, height: u32) -> Result<BlockHash, ChainSourceError> {
        self.blocks_by_height
            .read()
            .unwrap()
            .get(&height)
            .map(|b| b.block_hash())
            .ok_or_else(|| ChainSourceError::InvalidResponse(format!("block not found at height {height}")))
    }

    async fn get_block_by_height(&self, height: u32) -> Result<Block, ChainSourceError> {
        self.blocks_by_height
            .read()
            .unwrap()
            .get(&height)
            .cloned()
            .ok_or_else(|| ChainSourceError::InvalidResponse(format!("block not found at height {height}")))
    }

    async fn read_block(&self, hash: &BlockHash) -> Result<Block, ChainSourceError> {
        self.blocks_by_hash
            .read()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| ChainSourceError::InvalidResponse(format!("unknown block hash {hash}")))
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Transaction, ChainSourceError> {
        self.transactions
            .read()
            .unwrap()
            .get(txid)
            .cloned()
            .ok_or(ChainSourceError::TxNotFound(*txid))
    }
}
