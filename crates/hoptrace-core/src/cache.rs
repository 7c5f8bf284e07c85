use std::num::NonZeroUsize;

use bitcoin::Txid;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::types::RawTransaction;

/// Default number of decoded transactions kept in memory.
pub const DEFAULT_TX_CACHE_CAP: usize = 10_000;

// ==============================================================================
// Cache
// ==============================================================================

/// Run-scoped cache of decoded transactions keyed by txid.
///
/// Input resolution looks up the funding transaction of every input, and
/// the same funding transaction is often referenced by many inputs and
/// by many traced transactions. Confirmed transactions are immutable, so
/// entries never need invalidation, only eviction.
pub struct Cache {
    transactions: Mutex<LruCache<Txid, RawTransaction>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TX_CACHE_CAP)
    }

    /// A capacity of zero is bumped to one.
    pub fn with_capacity(tx_cap: usize) -> Self {
        let cap = NonZeroUsize::new(tx_cap).unwrap_or(NonZeroUsize::MIN);
        Self {
            transactions: Mutex::new(LruCache::new(cap)),
        }
    }

    pub async fn get_tx(&self, txid: &Txid) -> Option<RawTransaction> {
        // `LruCache::get` updates recency, so even reads take the lock mutably.
        self.transactions.lock().await.get(txid).cloned()
    }

    pub async fn insert_tx(&self, tx: RawTransaction) {
        self.transactions.lock().await.put(tx.txid, tx);
    }

    pub async fn len(&self) -> usize {
        self.transactions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
