//! Forward scan: extend a chain's label index up to its tip.
//!
//! Every pass re-derives the last `rescan_recent_blocks` blocks from scratch, so
//! shallow reorgs and respends near the tip are absorbed without reorg detection.
//! The checkpoint only ever covers blocks below that window.
use std::ops::Range;

use bitcoin::{BlockHash, OutPoint, Txid};

use crate::{
    config::ScanConfig,
    error::ScanError,
    model::{BlockScanStat, ChainId, DiscoveredLabel},
    rpc::{BlockInfo, ChainRpc, DecodedTx},
    store::Store,
};

/// Heights one pass covers, derived from the tip and the stored checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// First height to fetch.
    pub first: u64,
    /// Chain tip height. The range is `first..tip`; the tip block itself waits a pass.
    pub tip: u64,
    /// Start of the re-scan window; data at or above it is deleted and rebuilt.
    pub rescan_from: u64,
}

impl ScanWindow {
    /// Work out the pass range. The lower bound never exceeds `rescan_from`, so a
    /// checkpoint at or past the tip still re-derives the trailing window.
    pub fn compute(tip: u64, checkpoint: u64, config: &ScanConfig) -> Self {
        let rescan_from = tip.saturating_sub(u64::from(config.rescan_recent_blocks));

        let mut first = checkpoint.saturating_add(1);
        if let Some(start) = config.start_height {
            first = first.max(start);
        }
        // Pull the lower bound back so the trailing window is always covered.
        if first >= rescan_from {
            first = rescan_from;
        }

        Self {
            first,
            tip,
            rescan_from,
        }
    }

    /// Heights whose block hashes are fetched.
    pub fn heights(&self) -> Range<u64> {
        self.first..self.tip
    }

    /// Whether a clean scan of `height` may move the checkpoint.
    pub fn is_final(&self, height: u64) -> bool {
        height < self.rescan_from
    }
}

/// Outcome of one forward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Tip seen at the start of the pass.
    pub tip: u64,
    /// Heights scanned.
    pub range: Range<u64>,
    /// Blocks processed.
    pub blocks_scanned: u64,
    /// Label records written.
    pub labels_found: u64,
    /// Blocks that hit a transaction error.
    pub errored_blocks: u64,
    /// Checkpoint after the pass.
    pub checkpoint: u64,
}

/// Per-block counters, flushed into a [`BlockScanStat`].
#[derive(Default)]
struct BlockTally {
    labels: u32,
    spent: u32,
    errors: u32,
    last_txid: Option<Txid>,
}

/// Scans new blocks of one chain for label outputs.
pub struct ForwardScanner<'a, R, S> {
    rpc: &'a R,
    store: &'a S,
    config: &'a ScanConfig,
}

impl<'a, R, S> ForwardScanner<'a, R, S>
where
    R: ChainRpc,
    S: Store,
{
    /// Scanner over `rpc` (one chain's node) writing into `store`.
    pub fn new(rpc: &'a R, store: &'a S, config: &'a ScanConfig) -> Self {
        Self { rpc, store, config }
    }

    /// Run one pass for `chain`.
    ///
    /// # Errors
    /// Fails on chain-level RPC errors (tip, blocks, hashes, unspent checks) and
    /// store errors. A transaction that cannot be fetched or decoded is not an
    /// error: it is counted on its block, and the rest of that block is skipped.
    pub async fn scan(&self, chain: ChainId) -> Result<ScanSummary, ScanError> {
        let tip = self.rpc.chain_tip().await?;
        let checkpoint = self.store.checkpoint(chain).await?;

        let window = ScanWindow::compute(tip.height, checkpoint, self.config);
        let mut summary = ScanSummary {
            tip: tip.height,
            range: window.heights(),
            checkpoint,
            ..Default::default()
        };

        self.store.delete_from_height(chain, window.rescan_from).await?;

        tracing::info!(
            chain,
            from = window.first,
            to = window.tip,
            rescan_from = window.rescan_from,
            "scanning blocks"
        );

        let heights: Vec<u64> = window.heights().collect();
        let hashes = self.rpc.block_hashes(&heights).await?;

        // Set by the first errored block; from then on nothing moves the checkpoint
        // this pass, so the failing block is retried until it scans clean.
        let mut stalled = false;

        for hash in hashes {
            let block = self.rpc.block(&hash).await?;
            let tally = self.scan_block(chain, &block).await?;

            let stat = BlockScanStat {
                block_hash: hash,
                block_height: block.height,
                scan_time: chrono::Utc::now().timestamp(),
                label_count: tally.labels,
                spent_count: tally.spent,
                error_count: tally.errors,
                last_txid: tally.last_txid,
            };
            self.store.upsert_block_stat(chain, &stat).await?;

            summary.blocks_scanned += 1;
            summary.labels_found += u64::from(tally.labels);

            if tally.errors > 0 {
                summary.errored_blocks += 1;
                if !stalled {
                    tracing::warn!(chain, height = block.height, %hash, "checkpoint held at errored block");
                }
                stalled = true;
            } else if !stalled && window.is_final(block.height) && block.height > summary.checkpoint {
                self.store.set_checkpoint(chain, block.height).await?;
                summary.checkpoint = block.height;
            }

            log_block(chain, &hash, &stat);
        }

        tracing::info!(
            chain,
            blocks = summary.blocks_scanned,
            labels = summary.labels_found,
            errored = summary.errored_blocks,
            checkpoint = summary.checkpoint,
            "forward scan complete"
        );
        Ok(summary)
    }

    async fn scan_block(&self, chain: ChainId, block: &BlockInfo) -> Result<BlockTally, ScanError> {
        let mut tally = BlockTally::default();

        for txid in &block.txids {
            tally.last_txid = Some(*txid);
            let tx = match self.rpc.raw_transaction(txid).await {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::warn!(chain, height = block.height, %txid, error = %e, "transaction fetch failed, skipping rest of block");
                    tally.errors += 1;
                    break;
                }
            };
            self.scan_transaction(chain, block, &tx, &mut tally).await?;
        }

        Ok(tally)
    }

    async fn scan_transaction(
        &self,
        chain: ChainId,
        block: &BlockInfo,
        tx: &DecodedTx,
        tally: &mut BlockTally,
    ) -> Result<(), ScanError> {
        for (pos, out) in tx.outputs.iter().enumerate() {
            let Some(label) = out.script.label() else {
                continue;
            };
            // The value rides in the next output; a trailing label has none.
            let Some(paired) = tx.outputs.get(pos + 1) else {
                tracing::debug!(chain, txid = %tx.txid, vout = out.index, "label output without paired value");
                continue;
            };

            let outpoint = OutPoint {
                txid: tx.txid,
                vout: paired.index,
            };
            let record = DiscoveredLabel {
                outpoint,
                label,
                value: paired.value,
                block_time: block.time,
                block_height: block.height,
            };
            tracing::debug!(
                chain,
                height = block.height,
                %outpoint,
                label = %record.label.trim_end(),
                value = record.value.to_sat(),
                "public label"
            );
            self.store.upsert_label(chain, &record).await?;
            tally.labels += 1;

            // Spend time is left to the reconciler; here we only count.
            if !self.rpc.is_unspent(&outpoint.txid, outpoint.vout).await? {
                tally.spent += 1;
            }
        }
        Ok(())
    }
}

fn log_block(chain: ChainId, hash: &BlockHash, stat: &BlockScanStat) {
    tracing::debug!(
        chain,
        height = stat.block_height,
        %hash,
        labels = stat.label_count,
        spent = stat.spent_count,
        errors = stat.error_count,
        "block scanned"
    );
}
