#![allow(dead_code)]
use async_trait::async_trait;
use bitcoin::hashes::Hash as _;
use bitcoin::{Amount, BlockHash, OutPoint, Txid};
use public_label_indexer::extract::OutputScript;
use public_label_indexer::model::{Chain, ChainId};
use public_label_indexer::rpc::{BlockInfo, ChainRpc, ChainTip, DecodedTx, RpcConnector, TxOutput};
use public_label_indexer::RpcError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn txid(n: u32) -> Txid {
    let mut b = [0u8; 32];
    b[..4].copy_from_slice(&n.to_le_bytes());
    b[31] = 0xaa;
    Txid::from_byte_array(b)
}

pub fn block_hash(height: u64, fork: u8) -> BlockHash {
    let mut b = [0u8; 32];
    b[..8].copy_from_slice(&height.to_le_bytes());
    b[31] = fork;
    BlockHash::from_byte_array(b)
}

pub fn block_time(height: u64) -> u64 {
    1_600_000_000 + height * 600
}

pub fn label_asm(text: &str) -> String {
    format!("OP_RETURN 1 {}", hex::encode(text))
}

fn pay_output(index: u32, sats: u64) -> TxOutput {
    TxOutput {
        index,
        value: Amount::from_sat(sats),
        script: OutputScript::new("pubkeyhash", "OP_DUP OP_HASH160 00 OP_EQUALVERIFY OP_CHECKSIG"),
    }
}

/// `[label, value, change]`
pub fn label_tx(id: u32, text: &str, sats: u64) -> DecodedTx {
    DecodedTx {
        txid: txid(id),
        outputs: vec![
            TxOutput {
                index: 0,
                value: Amount::ZERO,
                script: OutputScript::new("publiclabel", label_asm(text)),
            },
            pay_output(1, sats),
            pay_output(2, 12_345),
        ],
    }
}

pub fn plain_tx(id: u32) -> DecodedTx {
    DecodedTx {
        txid: txid(id),
        outputs: vec![pay_output(0, 50_000)],
    }
}

#[derive(Default)]
struct State {
    tip: u64,
    // height -> (hash, txids)
    blocks: HashMap<u64, (BlockHash, Vec<Txid>)>,
    txs: HashMap<Txid, DecodedTx>,
    broken: HashSet<Txid>,
    spent: HashSet<OutPoint>,
}

/// Scripted in-process chain. Clones share state, so tests can mutate the
/// chain between passes.
#[derive(Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<State>>,
}

impl FakeChain {
    /// Blocks `0..=tip`, each holding only a coinbase-like plain tx.
    pub fn new(tip: u64) -> Self {
        let chain = Self::default();
        chain.extend_to(tip);
        chain
    }

    pub fn extend_to(&self, tip: u64) {
        let mut s = self.state.lock().unwrap();
        for h in 0..=tip {
            if s.blocks.contains_key(&h) {
                continue;
            }
            let cb = plain_tx(1_000_000 + h as u32);
            s.blocks.insert(h, (block_hash(h, 0), vec![cb.txid]));
            s.txs.insert(cb.txid, cb);
        }
        s.tip = s.tip.max(tip);
    }

    pub fn add_tx(&self, height: u64, tx: DecodedTx) {
        let mut s = self.state.lock().unwrap();
        let block = s.blocks.get_mut(&height).expect("block exists");
        block.1.push(tx.txid);
        s.txs.insert(tx.txid, tx);
    }

    /// Replace a block with a fork version holding only `txs` (after its coinbase).
    pub fn reorg_block(&self, height: u64, fork: u8, txs: Vec<DecodedTx>) {
        let mut s = self.state.lock().unwrap();
        let cb = txid(1_000_000 + height as u32);
        let mut ids = vec![cb];
        for tx in txs {
            ids.push(tx.txid);
            s.txs.insert(tx.txid, tx);
        }
        s.blocks.insert(height, (block_hash(height, fork), ids));
    }

    pub fn break_tx(&self, id: Txid) {
        self.state.lock().unwrap().broken.insert(id);
    }

    pub fn heal_tx(&self, id: Txid) {
        self.state.lock().unwrap().broken.remove(&id);
    }

    pub fn spend(&self, outpoint: OutPoint) {
        self.state.lock().unwrap().spent.insert(outpoint);
    }

    pub fn unspend(&self, outpoint: OutPoint) {
        self.state.lock().unwrap().spent.remove(&outpoint);
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn chain_tip(&self) -> Result<ChainTip, RpcError> {
        let s = self.state.lock().unwrap();
        let hash = s.blocks[&s.tip].0;
        Ok(ChainTip {
            hash,
            height: s.tip,
            time: block_time(s.tip),
        })
    }

    async fn block(&self, hash: &BlockHash) -> Result<BlockInfo, RpcError> {
        let s = self.state.lock().unwrap();
        s.blocks
            .iter()
            .find(|(_, (h, _))| h == hash)
            .map(|(height, (_, txids))| BlockInfo {
                height: *height,
                time: block_time(*height),
                txids: txids.clone(),
            })
            .ok_or_else(|| RpcError::NotFound(hash.to_string()))
    }

    async fn block_hash(&self, height: u64) -> Result<BlockHash, RpcError> {
        let s = self.state.lock().unwrap();
        s.blocks
            .get(&height)
            .map(|(h, _)| *h)
            .ok_or_else(|| RpcError::NotFound(format!("height {height}")))
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<DecodedTx, RpcError> {
        let s = self.state.lock().unwrap();
        if s.broken.contains(txid) {
            return Err(RpcError::Decode(format!("cannot decode {txid}")));
        }
        s.txs
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::NotFound(txid.to_string()))
    }

    async fn is_unspent(&self, txid: &Txid, vout: u32) -> Result<bool, RpcError> {
        let s = self.state.lock().unwrap();
        Ok(!s.spent.contains(&OutPoint { txid: *txid, vout }))
    }
}

/// Hands out the registered fake chain for each id; unknown ids fail to connect.
#[derive(Default)]
pub struct FakeConnector {
    chains: HashMap<ChainId, FakeChain>,
}

impl FakeConnector {
    pub fn with_chain(mut self, id: ChainId, chain: FakeChain) -> Self {
        self.chains.insert(id, chain);
        self
    }
}

#[async_trait]
impl RpcConnector for FakeConnector {
    type Rpc = FakeChain;

    async fn connect(&self, chain: &Chain) -> Result<FakeChain, RpcError> {
        self.chains
            .get(&chain.id)
            .cloned()
            .ok_or_else(|| RpcError::Transport(format!("connection refused on port {}", chain.rpc_port)))
    }
}
