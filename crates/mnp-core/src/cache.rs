//! Bounded caches fronting the chain source, so repeated scans over
//! overlapping height ranges (e.g. after a shallow reorg) don't re-fetch
//! transactions the scanner already resolved.

use bitcoin::{OutPoint, Transaction, TxOut};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const DEFAULT_TX_CAPACITY: usize = 20_000;
const DEFAULT_PREVOUT_CAPACITY: usize = 50_000;

pub struct Cache {
    transactions: Mutex<LruCache<bitcoin::Txid, Transaction>>,
    prevouts: Mutex<LruCache<OutPoint, TxOut>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TX_CAPACITY, DEFAULT_PREVOUT_CAPACITY)
    }

    pub fn with_capacity(tx_capacity: usize, prevout_capacity: usize) -> Self {
        Self {
            transactions: Mutex::new(LruCache::new(
                NonZeroUsize::new(tx_capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
            prevouts: Mutex::new(LruCache::new(
                NonZeroUsize::new(prevout_capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
        }
    }

    pub fn get_transaction(&self, txid: &bitcoin::Txid) -> Option<Transaction> {
        self.transactions.lock().unwrap().get(txid).cloned()
    }

    pub fn insert_transaction(&self, txid: bitcoin::Txid, tx: Transaction) {
        self.transactions.lock().unwrap().put(txid, tx);
    }

    pub fn get_prevout(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.prevouts.lock().unwrap().get(outpoint).cloned()
    }

    pub fn insert_prevout(&self, outpoint: OutPoint, txout: TxOut) {
        self.prevouts.lock().unwrap().put(outpoint, txout);
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{Amount, ScriptBuf, Txid};

    #[test]
    fn evicts_oldest_prevout_past_capacity() {
        let cache = Cache::with_capacity(10, 2);
        let txid = Txid::all_zeros();
        let op0 = OutPoint::new(txid, 0);
        let op1 = OutPoint::new(txid, 1);
        let op2 = OutPoint::new(txid, 2);
        let out = |v: u64| TxOut { value: Amount::from_sat(v), script_pubkey: ScriptBuf::new() };

        cache.insert_prevout(op0, out(1));
        cache.insert_prevout(op1, out(2));
        cache.insert_prevout(op2, out(3));

        assert!(cache.get_prevout(&op0).is_none());
        assert!(cache.get_prevout(&op1).is_some());
        assert!(cache.get_prevout(&op2).is_some());
    }
}
