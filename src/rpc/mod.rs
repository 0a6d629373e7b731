//! Node access used by the scanner and reconciler.
use async_trait::async_trait;
use bitcoin::{Amount, BlockHash, Txid};

use crate::{error::RpcError, extract::OutputScript, model::Chain};

/// Best block as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    /// Tip hash.
    pub hash: BlockHash,
    /// Tip height.
    pub height: u64,
    /// Tip timestamp (unix seconds).
    pub time: u64,
}

/// The parts of a block the scanner needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Block timestamp (unix seconds).
    pub time: u64,
    /// Transaction ids in block order.
    pub txids: Vec<Txid>,
}

/// One output of a decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Position in the transaction's output list.
    pub index: u32,
    /// Amount carried.
    pub value: Amount,
    /// Script type and disassembly.
    pub script: OutputScript,
}

/// A decoded transaction, outputs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTx {
    /// Transaction id.
    pub txid: Txid,
    /// Outputs in index order.
    pub outputs: Vec<TxOutput>,
}

/// Read-only view of one chain's node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Current best block.
    async fn chain_tip(&self) -> Result<ChainTip, RpcError>;

    /// Height, time and transaction ids of block `hash`.
    async fn block(&self, hash: &BlockHash) -> Result<BlockInfo, RpcError>;

    /// Hash of the block at `height` on the best chain.
    async fn block_hash(&self, height: u64) -> Result<BlockHash, RpcError>;

    /// Hashes for `heights`, same order. Nodes with a batch primitive should
    /// override this to use a single round trip.
    async fn block_hashes(&self, heights: &[u64]) -> Result<Vec<BlockHash>, RpcError> {
        let mut hashes = Vec::with_capacity(heights.len());
        for &h in heights {
            hashes.push(self.block_hash(h).await?);
        }
        Ok(hashes)
    }

    /// Fetch and decode transaction `txid`.
    async fn raw_transaction(&self, txid: &Txid) -> Result<DecodedTx, RpcError>;

    /// Whether output `vout` of `txid` is still unspent.
    async fn is_unspent(&self, txid: &Txid, vout: u32) -> Result<bool, RpcError>;
}

/// Opens a node handle for one chain. Each pass gets its own handle.
#[async_trait]
pub trait RpcConnector: Send + Sync {
    /// Handle type produced.
    type Rpc: ChainRpc;

    /// Connect to `chain`'s node; a failure skips that chain for this run.
    async fn connect(&self, chain: &Chain) -> Result<Self::Rpc, RpcError>;
}

#[cfg(feature = "rpc-bitcoind")]
pub mod bitcoind;
#[cfg(feature = "rpc-bitcoind")]
pub use bitcoind::{BitcoindConnector, BitcoindRpc};
