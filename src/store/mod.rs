//! Persistence interfaces and implementations used by the indexer
//! (chain registry, checkpoints, label records and per-block scan stats).
use async_trait::async_trait;
use bitcoin::OutPoint;

use crate::model::{BlockScanStat, Chain, ChainId, DiscoveredLabel};

/// Relational store behind the indexer.
///
/// Implementations must keep these guarantees on their own, independent of caller order:
/// checkpoints never move down, a spent time once set is never replaced, and
/// re-upserting a label keeps its spent time.
#[async_trait]
pub trait Store: Send + Sync {
    /// All registered chains, in registry order.
    async fn chain_registry(&self) -> anyhow::Result<Vec<Chain>>;

    /// Highest fully indexed height for `chain` (0 when never scanned).
    async fn checkpoint(&self, chain: ChainId) -> anyhow::Result<u64>;

    /// Raise the checkpoint to `height`. Lower values are ignored.
    async fn set_checkpoint(&self, chain: ChainId, height: u64) -> anyhow::Result<()>;

    /// Create or update the record keyed by `(chain, label.outpoint)`.
    async fn upsert_label(&self, chain: ChainId, label: &DiscoveredLabel) -> anyhow::Result<()>;

    /// Mark a record spent at `time` (unix seconds) unless already marked.
    async fn set_spent_time(
        &self,
        chain: ChainId,
        outpoint: &OutPoint,
        time: i64,
    ) -> anyhow::Result<()>;

    /// Outpoints of every record without a spent time.
    async fn unspent_labels(&self, chain: ChainId) -> anyhow::Result<Vec<OutPoint>>;

    /// Drop label records and block stats at `height` and above.
    async fn delete_from_height(&self, chain: ChainId, height: u64) -> anyhow::Result<()>;

    /// Insert or replace the stats row for `stat.block_hash`.
    async fn upsert_block_stat(&self, chain: ChainId, stat: &BlockScanStat) -> anyhow::Result<()>;
}

#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;
#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteStore;
