//! Error types at the RPC and scan seams.
use thiserror::Error;

/// Failure of a single RPC gateway call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Node unreachable, authentication refused, or any other transport-level failure.
    #[error("rpc transport error: {0}")]
    Transport(String),

    /// The node does not know the requested object.
    #[error("not found: {0}")]
    NotFound(String),

    /// The node answered but the payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Error that ends one chain's pass. Block-local transaction failures never become one.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A chain-level RPC call failed (tip, block, block hashes, unspent check).
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The store rejected a read or write.
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}
