//! Runs a forward scan and a spent reconciliation for every online chain.
use crate::{
    config::ScanConfig,
    error::ScanError,
    model::{Chain, ChainId},
    reconciler::SpentReconciler,
    rpc::RpcConnector,
    scanner::{ForwardScanner, ScanSummary},
    store::Store,
};

/// What happened to one chain during a run.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Both phases finished.
    Completed {
        /// Forward scan result.
        scan: ScanSummary,
        /// Records newly marked spent.
        newly_spent: u64,
    },
    /// The node could not be reached; nothing was touched.
    ConnectFailed(crate::error::RpcError),
    /// A chain-fatal error cut the pass short.
    Failed(ScanError),
}

/// Per-chain report of a run, in registry order.
pub type RunReport = Vec<(Chain, ChainOutcome)>;

/// Orchestrates chains one at a time over a shared store.
pub struct ChainDriver<S, C> {
    store: S,
    connector: C,
    config: ScanConfig,
}

impl<S, C> ChainDriver<S, C>
where
    S: Store,
    C: RpcConnector,
{
    /// Driver reading the registry from `store` and reaching nodes through `connector`.
    pub fn new(store: S, connector: C, config: ScanConfig) -> Self {
        Self {
            store,
            connector,
            config,
        }
    }

    /// Process every online chain, or only `only` when given.
    ///
    /// Per-chain failures are logged and reported; they never stop the run.
    /// Only a failure to read the registry itself is returned as an error.
    pub async fn run(&self, only: Option<ChainId>) -> anyhow::Result<RunReport> {
        let mut report = Vec::new();

        for chain in self.store.chain_registry().await? {
            if only.is_some_and(|id| id != chain.id) {
                continue;
            }
            if !chain.online {
                tracing::debug!(chain = chain.id, name = %chain.name, "chain offline, skipping");
                continue;
            }

            let outcome = self.run_chain(&chain).await;
            match &outcome {
                ChainOutcome::Completed { scan, newly_spent } => tracing::info!(
                    chain = chain.id,
                    name = %chain.name,
                    port = chain.rpc_port,
                    checkpoint = scan.checkpoint,
                    newly_spent,
                    "completed scan of chain"
                ),
                ChainOutcome::ConnectFailed(e) => tracing::error!(
                    chain = chain.id,
                    name = %chain.name,
                    port = chain.rpc_port,
                    error = %e,
                    "connection failed"
                ),
                ChainOutcome::Failed(e) => tracing::error!(
                    chain = chain.id,
                    name = %chain.name,
                    error = %e,
                    "chain pass aborted"
                ),
            }
            report.push((chain, outcome));
        }

        Ok(report)
    }

    async fn run_chain(&self, chain: &Chain) -> ChainOutcome {
        let rpc = match self.connector.connect(chain).await {
            Ok(rpc) => rpc,
            Err(e) => return ChainOutcome::ConnectFailed(e),
        };
        tracing::info!(chain = chain.id, name = %chain.name, port = chain.rpc_port, "connected");

        let scan = match ForwardScanner::new(&rpc, &self.store, &self.config)
            .scan(chain.id)
            .await
        {
            Ok(s) => s,
            Err(e) => return ChainOutcome::Failed(e),
        };

        match SpentReconciler::new(&rpc, &self.store)
            .reconcile(chain.id)
            .await
        {
            Ok(newly_spent) => ChainOutcome::Completed { scan, newly_spent },
            Err(e) => ChainOutcome::Failed(e),
        }
    }
}
