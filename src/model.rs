//! Records the indexer reads from the registry and writes to the store.
use bitcoin::{Amount, BlockHash, OutPoint, Txid};

/// Numeric identifier of a monitored chain in the registry.
pub type ChainId = u32;

/// One monitored blockchain, as listed in the chain registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    /// Registry identifier.
    pub id: ChainId,
    /// Display name (e.g. `btc_testnet`).
    pub name: String,
    /// Port the chain's node listens on for RPC.
    pub rpc_port: u16,
    /// Offline chains are skipped by the driver.
    pub online: bool,
}

/// A label output found during a block scan, keyed by its *paired value* output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLabel {
    /// `(txid, index of the value output)`; the record's identity within a chain.
    pub outpoint: OutPoint,
    /// Decoded label text.
    pub label: String,
    /// Value carried by the paired output.
    pub value: Amount,
    /// Block timestamp (unix seconds).
    pub block_time: u64,
    /// Height of the containing block.
    pub block_height: u64,
}

/// A persisted label together with its spent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    /// Owning chain.
    pub chain_id: ChainId,
    /// What the scanner found.
    pub label: DiscoveredLabel,
    /// Wall-clock time (unix seconds) the output was first seen spent, if ever.
    pub spent_time: Option<i64>,
}

/// Audit row written once per scanned block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockScanStat {
    /// Scanned block.
    pub block_hash: BlockHash,
    /// Its height.
    pub block_height: u64,
    /// Wall-clock time (unix seconds) the scan finished.
    pub scan_time: i64,
    /// Label records created from this block.
    pub label_count: u32,
    /// Of those, how many were already spent when scanned.
    pub spent_count: u32,
    /// Transaction fetch/decode failures (the scan stops at the first one).
    pub error_count: u32,
    /// Last transaction id the scan touched (the failing one if `error_count > 0`).
    pub last_txid: Option<Txid>,
}
