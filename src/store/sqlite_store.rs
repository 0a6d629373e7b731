//! Embedded SQLite store implementation.
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bitcoin::{Amount, BlockHash, OutPoint, Txid};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
};
use tokio::task;

use crate::{
    model::{BlockScanStat, Chain, ChainId, DiscoveredLabel, LabelRecord},
    store::Store,
};

/// Tables:
///   chains(chain_id PK, chain_name, rpc_port, online)
///   checkpoints(chain_id PK, latest_checked_block_height)
///   label_records(chain_id, tx_id, output_index PK, label, value, block_time, block_height, spent_time NULL)
///   block_scan_stats(chain_id, block_hash PK, scan_time, label_count, spent_count, error_count, last_tx_id NULL, block_height)
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS chains (
        chain_id    INTEGER PRIMARY KEY,
        chain_name  TEXT    NOT NULL,
        rpc_port    INTEGER NOT NULL,
        online      INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS checkpoints (
        chain_id                    INTEGER PRIMARY KEY,
        latest_checked_block_height INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS label_records (
        chain_id     INTEGER NOT NULL,
        tx_id        TEXT    NOT NULL,
        output_index INTEGER NOT NULL,
        label        TEXT    NOT NULL,
        value        INTEGER NOT NULL,
        block_time   INTEGER NOT NULL,
        block_height INTEGER NOT NULL,
        spent_time   INTEGER,
        PRIMARY KEY (chain_id, tx_id, output_index)
    );
    CREATE INDEX IF NOT EXISTS label_records_height
        ON label_records (chain_id, block_height);

    CREATE TABLE IF NOT EXISTS block_scan_stats (
        chain_id     INTEGER NOT NULL,
        block_hash   TEXT    NOT NULL,
        scan_time    INTEGER NOT NULL,
        label_count  INTEGER NOT NULL,
        spent_count  INTEGER NOT NULL,
        error_count  INTEGER NOT NULL,
        last_tx_id   TEXT,
        block_height INTEGER NOT NULL,
        PRIMARY KEY (chain_id, block_hash)
    );
    CREATE INDEX IF NOT EXISTS block_scan_stats_height
        ON block_scan_stats (chain_id, block_height);
"#;

/// SQLite-backed [`Store`]. One connection, serialized behind a mutex and
/// driven from the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite at {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )?;
        Self::init(conn)
    }

    /// Private in-memory database (tests, dry runs).
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("sqlite connection mutex poisoned"))?;
            f(&mut guard)
        })
        .await?
    }

    /// Register a chain or update its name, port and online flag.
    pub async fn upsert_chain(&self, chain: &Chain) -> anyhow::Result<()> {
        let chain = chain.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO chains(chain_id, chain_name, rpc_port, online) VALUES(?1,?2,?3,?4)
                 ON CONFLICT(chain_id) DO UPDATE SET
                    chain_name=excluded.chain_name,
                    rpc_port=excluded.rpc_port,
                    online=excluded.online",
                params![chain.id, chain.name, chain.rpc_port, chain.online],
            )?;
            Ok(())
        })
        .await
    }

    /// Every label record for `chain`, ordered by height then outpoint.
    pub async fn label_records(&self, chain: ChainId) -> anyhow::Result<Vec<LabelRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tx_id, output_index, label, value, block_time, block_height, spent_time
                 FROM label_records WHERE chain_id = ?1
                 ORDER BY block_height, tx_id, output_index",
            )?;
            let rows = stmt.query_map(params![chain], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, u32>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, u64>(3)?,
                    r.get::<_, u64>(4)?,
                    r.get::<_, u64>(5)?,
                    r.get::<_, Option<i64>>(6)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (txid, vout, label, value, block_time, block_height, spent_time) = row?;
                let txid = Txid::from_str(&txid).context("parse tx_id")?;
                out.push(LabelRecord {
                    chain_id: chain,
                    label: DiscoveredLabel {
                        outpoint: OutPoint { txid, vout },
                        label,
                        value: Amount::from_sat(value),
                        block_time,
                        block_height,
                    },
                    spent_time,
                });
            }
            Ok(out)
        })
        .await
    }

    /// Every block stats row for `chain`, ordered by height.
    pub async fn block_stats(&self, chain: ChainId) -> anyhow::Result<Vec<BlockScanStat>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT block_hash, block_height, scan_time, label_count, spent_count,
                        error_count, last_tx_id
                 FROM block_scan_stats WHERE chain_id = ?1
                 ORDER BY block_height",
            )?;
            let rows = stmt.query_map(params![chain], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, u64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, u32>(3)?,
                    r.get::<_, u32>(4)?,
                    r.get::<_, u32>(5)?,
                    r.get::<_, Option<String>>(6)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (hash, block_height, scan_time, label_count, spent_count, error_count, last) =
                    row?;
                out.push(BlockScanStat {
                    block_hash: BlockHash::from_str(&hash).context("parse block_hash")?,
                    block_height,
                    scan_time,
                    label_count,
                    spent_count,
                    error_count,
                    last_txid: last
                        .map(|t| Txid::from_str(&t))
                        .transpose()
                        .context("parse last_tx_id")?,
                });
            }
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn chain_registry(&self) -> anyhow::Result<Vec<Chain>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chain_id, chain_name, rpc_port, online FROM chains ORDER BY chain_id",
            )?;
            let chains = stmt
                .query_map([], |r| {
                    Ok(Chain {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        rpc_port: r.get(2)?,
                        online: r.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chains)
        })
        .await
    }

    async fn checkpoint(&self, chain: ChainId) -> anyhow::Result<u64> {
        self.with_conn(move |conn| {
            let h: Option<u64> = conn
                .query_row(
                    "SELECT latest_checked_block_height FROM checkpoints WHERE chain_id = ?1",
                    params![chain],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(h.unwrap_or(0))
        })
        .await
    }

    async fn set_checkpoint(&self, chain: ChainId, height: u64) -> anyhow::Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints(chain_id, latest_checked_block_height) VALUES(?1,?2)
                 ON CONFLICT(chain_id) DO UPDATE SET
                    latest_checked_block_height=excluded.latest_checked_block_height
                 WHERE excluded.latest_checked_block_height > checkpoints.latest_checked_block_height",
                params![chain, height],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_label(&self, chain: ChainId, label: &DiscoveredLabel) -> anyhow::Result<()> {
        let label = label.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO label_records
                    (chain_id, tx_id, output_index, label, value, block_time, block_height)
                 VALUES(?1,?2,?3,?4,?5,?6,?7)
                 ON CONFLICT(chain_id, tx_id, output_index) DO UPDATE SET
                    label=excluded.label,
                    value=excluded.value,
                    block_time=excluded.block_time,
                    block_height=excluded.block_height",
                params![
                    chain,
                    label.outpoint.txid.to_string(),
                    label.outpoint.vout,
                    label.label,
                    label.value.to_sat(),
                    label.block_time,
                    label.block_height,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn set_spent_time(
        &self,
        chain: ChainId,
        outpoint: &OutPoint,
        time: i64,
    ) -> anyhow::Result<()> {
        let outpoint = *outpoint;
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE label_records SET spent_time = ?4
                 WHERE chain_id = ?1 AND tx_id = ?2 AND output_index = ?3
                   AND spent_time IS NULL",
                params![chain, outpoint.txid.to_string(), outpoint.vout, time],
            )?;
            Ok(())
        })
        .await
    }

    async fn unspent_labels(&self, chain: ChainId) -> anyhow::Result<Vec<OutPoint>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tx_id, output_index FROM label_records
                 WHERE chain_id = ?1 AND spent_time IS NULL
                 ORDER BY block_height, tx_id, output_index",
            )?;
            let rows = stmt
                .query_map(params![chain], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, u32>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(txid, vout)| -> anyhow::Result<OutPoint> {
                    Ok(OutPoint {
                        txid: Txid::from_str(&txid).context("parse tx_id")?,
                        vout,
                    })
                })
                .collect()
        })
        .await
    }

    async fn delete_from_height(&self, chain: ChainId, height: u64) -> anyhow::Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM label_records WHERE chain_id = ?1 AND block_height >= ?2",
                params![chain, height],
            )?;
            tx.execute(
                "DELETE FROM block_scan_stats WHERE chain_id = ?1 AND block_height >= ?2",
                params![chain, height],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_block_stat(&self, chain: ChainId, stat: &BlockScanStat) -> anyhow::Result<()> {
        let stat = stat.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO block_scan_stats
                    (chain_id, block_hash, scan_time, label_count, spent_count,
                     error_count, last_tx_id, block_height)
                 VALUES(?1,?2,?3,?4,?5,?6,?7,?8)
                 ON CONFLICT(chain_id, block_hash) DO UPDATE SET
                    scan_time=excluded.scan_time,
                    label_count=excluded.label_count,
                    spent_count=excluded.spent_count,
                    error_count=excluded.error_count,
                    last_tx_id=excluded.last_tx_id,
                    block_height=excluded.block_height",
                params![
                    chain,
                    stat.block_hash.to_string(),
                    stat.scan_time,
                    stat.label_count,
                    stat.spent_count,
                    stat.error_count,
                    stat.last_txid.map(|t| t.to_string()),
                    stat.block_height,
                ],
            )?;
            Ok(())
        })
        .await
    }
}
