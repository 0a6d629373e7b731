//! Bitcoin-Core-style JSON-RPC node gateway.
//!
//! Calls go through `bitcoincore_rpc`'s raw `call` with local wire structs, so
//! forks that report non-standard script type tags still decode.
use async_trait::async_trait;
use bitcoin::{Amount, BlockHash, Txid};
use bitcoincore_rpc::{jsonrpc, Auth, Client, RpcApi};
use serde::Deserialize;
use serde_json::{value::RawValue, Value};
use std::sync::Arc;
use tokio::task;

use super::{BlockInfo, ChainRpc, ChainTip, DecodedTx, RpcConnector, TxOutput};
use crate::{config::RpcSettings, error::RpcError, extract::OutputScript, model::Chain};

/// `RPC_INVALID_ADDRESS_OR_KEY`: what the node answers for unknown txids/blocks.
const RPC_NOT_FOUND: i32 = -5;

#[derive(Deserialize)]
struct WireBlock {
    height: u64,
    time: u64,
    tx: Vec<Txid>,
}

#[derive(Deserialize)]
struct WireTx {
    txid: Txid,
    vout: Vec<WireOutput>,
}

#[derive(Deserialize)]
struct WireOutput {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    value: Amount,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: WireScript,
}

#[derive(Deserialize)]
struct WireScript {
    asm: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl From<WireTx> for DecodedTx {
    fn from(tx: WireTx) -> Self {
        Self {
            txid: tx.txid,
            outputs: tx
                .vout
                .into_iter()
                .map(|o| TxOutput {
                    index: o.n,
                    value: o.value,
                    script: OutputScript::new(&o.script_pub_key.kind, o.script_pub_key.asm),
                })
                .collect(),
        }
    }
}

fn map_jsonrpc_err(e: jsonrpc::Error) -> RpcError {
    match e {
        jsonrpc::Error::Rpc(ref r) if r.code == RPC_NOT_FOUND => RpcError::NotFound(r.message.clone()),
        jsonrpc::Error::Json(e) => RpcError::Decode(e.to_string()),
        other => RpcError::Transport(other.to_string()),
    }
}

fn map_err(e: bitcoincore_rpc::Error) -> RpcError {
    match e {
        bitcoincore_rpc::Error::JsonRpc(e) => map_jsonrpc_err(e),
        bitcoincore_rpc::Error::Json(e) => RpcError::Decode(e.to_string()),
        other => RpcError::Transport(other.to_string()),
    }
}

/// Node gateway over a blocking `bitcoincore_rpc::Client`.
pub struct BitcoindRpc {
    client: Arc<Client>,
}

impl BitcoindRpc {
    /// Wrap an already-configured client.
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Run `f` against the client on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, RpcError>
    where
        F: FnOnce(&Client) -> Result<T, RpcError> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        task::spawn_blocking(move || f(&client))
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?
    }
}

#[async_trait]
impl ChainRpc for BitcoindRpc {
    async fn chain_tip(&self) -> Result<ChainTip, RpcError> {
        self.blocking(|c| {
            let hash: BlockHash = c.call("getbestblockhash", &[]).map_err(map_err)?;
            let block: WireBlock = c
                .call("getblock", &[hash.to_string().into(), 1.into()])
                .map_err(map_err)?;
            Ok(ChainTip {
                hash,
                height: block.height,
                time: block.time,
            })
        })
        .await
    }

    async fn block(&self, hash: &BlockHash) -> Result<BlockInfo, RpcError> {
        let hash = *hash;
        self.blocking(move |c| {
            let block: WireBlock = c
                .call("getblock", &[hash.to_string().into(), 1.into()])
                .map_err(map_err)?;
            Ok(BlockInfo {
                height: block.height,
                time: block.time,
                txids: block.tx,
            })
        })
        .await
    }

    async fn block_hash(&self, height: u64) -> Result<BlockHash, RpcError> {
        self.blocking(move |c| c.call("getblockhash", &[height.into()]).map_err(map_err))
            .await
    }

    async fn block_hashes(&self, heights: &[u64]) -> Result<Vec<BlockHash>, RpcError> {
        if heights.is_empty() {
            return Ok(Vec::new());
        }
        let heights = heights.to_vec();
        self.blocking(move |c| {
            let params = heights
                .iter()
                .map(|h| serde_json::value::to_raw_value(h).map(|v| vec![v]))
                .collect::<Result<Vec<Vec<Box<RawValue>>>, _>>()
                .map_err(|e| RpcError::Decode(e.to_string()))?;

            let rpc = c.get_jsonrpc_client();
            let requests: Vec<_> = params
                .iter()
                .map(|p| rpc.build_request("getblockhash", p))
                .collect();

            // Responses come back in request order.
            rpc.send_batch(&requests)
                .map_err(map_jsonrpc_err)?
                .into_iter()
                .zip(&heights)
                .map(|(resp, h)| {
                    resp.ok_or_else(|| RpcError::Transport(format!("no batch response for height {h}")))?
                        .result::<BlockHash>()
                        .map_err(map_jsonrpc_err)
                })
                .collect()
        })
        .await
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<DecodedTx, RpcError> {
        let txid = *txid;
        self.blocking(move |c| {
            let raw: String = c
                .call("getrawtransaction", &[txid.to_string().into()])
                .map_err(map_err)?;
            let tx: WireTx = c
                .call("decoderawtransaction", &[raw.into()])
                .map_err(map_err)?;
            Ok(tx.into())
        })
        .await
    }

    async fn is_unspent(&self, txid: &Txid, vout: u32) -> Result<bool, RpcError> {
        let txid = *txid;
        self.blocking(move |c| {
            let out: Option<Value> = c
                .call("gettxout", &[txid.to_string().into(), vout.into()])
                .map_err(map_err)?;
            Ok(out.is_some())
        })
        .await
    }
}

/// Connects to each chain's node on `host:<registry port>` with shared credentials.
pub struct BitcoindConnector {
    settings: RpcSettings,
}

impl BitcoindConnector {
    /// Connector using `settings` for every chain.
    pub fn new(settings: RpcSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl RpcConnector for BitcoindConnector {
    type Rpc = BitcoindRpc;

    async fn connect(&self, chain: &Chain) -> Result<BitcoindRpc, RpcError> {
        let url = self.settings.url(chain.rpc_port);
        let auth = Auth::UserPass(self.settings.user.clone(), self.settings.password.clone());
        let client = Client::new(&url, auth).map_err(map_err)?;
        let rpc = BitcoindRpc::new(client);

        // Fail here rather than halfway through the pass.
        let height = rpc
            .blocking(|c| c.get_block_count().map_err(map_err))
            .await?;
        tracing::debug!(chain = chain.id, %url, height, "connected to node");
        Ok(rpc)
    }
}
