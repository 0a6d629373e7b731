//! Spent reconciliation for labels already in the index.
use crate::{error::ScanError, model::ChainId, rpc::ChainRpc, store::Store};

/// Re-checks unspent label records and stamps the ones that have been spent.
///
/// The stamp is the reconciliation wall-clock time, not the spending block's time.
/// Active unspent labels are assumed to be few, so checks go one by one.
pub struct SpentReconciler<'a, R, S> {
    rpc: &'a R,
    store: &'a S,
}

impl<'a, R, S> SpentReconciler<'a, R, S>
where
    R: ChainRpc,
    S: Store,
{
    /// Reconciler over `rpc` (one chain's node) writing into `store`.
    pub fn new(rpc: &'a R, store: &'a S) -> Self {
        Self { rpc, store }
    }

    /// Returns how many records were newly marked spent.
    pub async fn reconcile(&self, chain: ChainId) -> Result<u64, ScanError> {
        let unspent = self.store.unspent_labels(chain).await?;
        tracing::info!(chain, candidates = unspent.len(), "reconciling spent labels");

        let mut marked = 0;
        for outpoint in unspent {
            if self.rpc.is_unspent(&outpoint.txid, outpoint.vout).await? {
                continue;
            }
            tracing::info!(chain, %outpoint, "label spent");
            self.store
                .set_spent_time(chain, &outpoint, chrono::Utc::now().timestamp())
                .await?;
            marked += 1;
        }
        Ok(marked)
    }
}
