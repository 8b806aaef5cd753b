use serde::{Deserialize, Serialize};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub ordering: OrderingConfig,
    #[serde(default)]
    pub durability: DurabilityConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Gap left between consecutive order values after a reindex.
    /// Default: [`DEFAULT_SPACING`]
    #[serde(default = "default_spacing")]
    pub spacing: i32,
    /// Reindex the group a task leaves when it is reparented
    #[serde(default)]
    pub compact_on_reparent: bool,
}

impl OrderingConfig {
    /// Spacing clamped to `1..=MAX_SPACING`
    pub fn spacing(&self) -> i32 {
        self.spacing.clamp(1, MAX_SPACING)
    }
}

impl Default for OrderingConfig {
    fn default() -> Self {
        OrderingConfig {
            spacing: default_spacing(),
            compact_on_reparent: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurabilityConfig {
    /// Force an fsync of the store file after commits from the primary scope
    #[serde(default = "default_true")]
    pub fsync: bool,
    /// How long to wait for the store lock before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        DurabilityConfig {
            fsync: true,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Seconds between completing a task and moving it to the logbook
    #[serde(default = "default_log_delay_secs")]
    pub log_delay_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            log_delay_secs: default_log_delay_secs(),
        }
    }
}

pub const DEFAULT_SPACING: i32 = 10;

/// Largest accepted `ordering.spacing`
pub const MAX_SPACING: i32 = 10_000;

fn default_spacing() -> i32 {
    DEFAULT_SPACING
}

fn default_true() -> bool {
    true
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_log_delay_secs() -> u64 {
    2
}
