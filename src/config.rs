//! Tunables for a scan pass and node connection settings.

/// Trailing blocks re-derived on every pass when not configured otherwise.
pub const DEFAULT_RESCAN_RECENT_BLOCKS: u32 = 10;

/// Forward-scan settings shared by every chain in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Size of the re-scan window below the tip. Blocks inside it are deleted and
    /// scanned again each pass, and the checkpoint never enters it.
    pub rescan_recent_blocks: u32,
    /// Lowest height worth scanning on a chain with no progress yet.
    pub start_height: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rescan_recent_blocks: DEFAULT_RESCAN_RECENT_BLOCKS,
            start_height: None,
        }
    }
}

impl ScanConfig {
    /// Override the re-scan window size.
    pub fn with_rescan_recent_blocks(mut self, blocks: u32) -> Self {
        self.rescan_recent_blocks = blocks;
        self
    }

    /// Skip everything below `height` on chains that have never been scanned.
    pub fn with_start_height(mut self, height: u64) -> Self {
        self.start_height = Some(height);
        self
    }
}

/// Credentials and host shared by every chain's node; the port comes from the registry.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    /// Node host name or address.
    pub host: String,
    /// RPC user.
    pub user: String,
    /// RPC password.
    pub password: String,
}

impl RpcSettings {
    /// Endpoint URL for a node listening on `port`.
    pub fn url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}
