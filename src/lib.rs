#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! public-label-indexer: incremental indexing of public label outputs.
//!
//! A *public label* is an output tagged `publiclabel` whose script carries
//! `OP_RETURN <format> <hex text>`; the output right after it holds the value
//! attributed to the label.
//!
//! ## What you implement (or take from the default features)
//! - [`ChainRpc`] / [`RpcConnector`]: reach one chain's node.
//!   [`rpc::BitcoindConnector`] speaks Bitcoin Core JSON-RPC.
//! - [`Store`]: registry, checkpoints, label records, block stats.
//!   [`SqliteStore`] is an embedded implementation.
//!
//! ## What the indexer does
//! - [`ForwardScanner`]: scans from the checkpoint to the tip, always re-deriving
//!   the trailing re-scan window, and records labels and per-block stats.
//! - [`SpentReconciler`]: stamps labels whose value output has since been spent.
//! - [`ChainDriver`]: runs both for every online chain, one chain at a time.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use public_label_indexer::prelude::*;
//!
//! async fn run(settings: RpcSettings) -> anyhow::Result<()> {
//!     let store = SqliteStore::new("labels.db")?;
//!     let driver = ChainDriver::new(store, BitcoindConnector::new(settings), ScanConfig::default());
//!     for (chain, outcome) in driver.run(None).await? {
//!         println!("{}: {:?}", chain.name, outcome);
//!     }
//!     Ok(())
//! }
//! ```

/// Scan tunables and node connection settings.
pub mod config;

/// Chain orchestration.
pub mod driver;

/// Error types.
pub mod error;

/// Label payload extraction and output script classification.
pub mod extract;

/// Registry and index records.
pub mod model;

/// Spent reconciliation.
pub mod reconciler;

/// Node access traits and the Bitcoin Core gateway.
pub mod rpc;

/// Forward block scanning.
pub mod scanner;

/// Persistence layer (traits and SQLite implementation).
pub mod store;

// Public re-exports
pub use config::{RpcSettings, ScanConfig};
pub use driver::{ChainDriver, ChainOutcome};
pub use error::{RpcError, ScanError};
pub use extract::extract_label;
pub use reconciler::SpentReconciler;
pub use rpc::{ChainRpc, RpcConnector};
pub use scanner::{ForwardScanner, ScanSummary, ScanWindow};
pub use store::Store;
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;

/// Convenience prelude for end users.
pub mod prelude {
    pub use crate::{
        ChainDriver, ChainOutcome, ChainRpc, ForwardScanner, RpcConnector, RpcSettings,
        ScanConfig, SpentReconciler, Store,
    };
    #[cfg(feature = "rpc-bitcoind")]
    pub use crate::rpc::BitcoindConnector;
    #[cfg(feature = "store-sqlite")]
    pub use crate::SqliteStore;
}
