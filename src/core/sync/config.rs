/*!
 * Synchronization Configuration
 *
 * Runtime configuration for map backends, lock waits, backoff and the worker pool.
 *
 * # Sources
 *
 * - Presets (`Default`, `low_latency`, `high_contention`)
 * - JSON documents (`from_json_str`, `from_file`)
 * - Environment overrides (`from_env`)
 *
 * A process-wide copy lives behind an `ArcSwap` so constructors that take no
 * explicit config (`FairLock::new`, `ConcurrentMap::new`, ...) pick up the
 * installed values without locking.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{
    BACKOFF_MAX_SLEEP, BACKOFF_SPIN_LIMIT, BACKOFF_YIELD_LIMIT, DEFAULT_CANCEL_POLL_INTERVAL,
    DEFAULT_LOCK_TIMEOUT, DEFAULT_MAP_STRIPES, DEFAULT_POOL_WORKERS, MAX_MAP_STRIPES,
    MAX_POOL_WORKERS,
};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMicroSeconds, DurationMilliSeconds};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Backend selection for `ConcurrentMap`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStrategy {
    /// Fixed array of RwLock-guarded hash maps (predictable memory)
    Striped,
    /// DashMap shards (better under write-heavy load)
    Sharded,
}

impl MapStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "striped" => Some(Self::Striped),
            "sharded" | "dashmap" => Some(Self::Sharded),
            _ => None,
        }
    }
}

/// Synchronization configuration
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend used by `ConcurrentMap::new`
    pub map_strategy: MapStrategy,
    /// Stripe/shard count (power of 2)
    pub stripe_count: usize,
    /// Timeout applied by `TimeoutPolicy::from_config`
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "lock_timeout_ms")]
    pub lock_timeout: Duration,
    /// Cancellation re-check interval for blocked waiters
    #[serde_as(as = "DurationMicroSeconds<u64>")]
    #[serde(rename = "cancel_poll_interval_us")]
    pub cancel_poll_interval: Duration,
    /// Backoff iterations spent spinning
    pub spin_limit: u32,
    /// Backoff iterations spent yielding (after spinning)
    pub yield_limit: u32,
    /// Cap on a single backoff sleep
    #[serde_as(as = "DurationMicroSeconds<u64>")]
    #[serde(rename = "max_backoff_us")]
    pub max_backoff: Duration,
    /// Worker threads for `WorkerPool::with_config`
    pub pool_workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            map_strategy: MapStrategy::Striped,
            stripe_count: DEFAULT_MAP_STRIPES,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
            spin_limit: BACKOFF_SPIN_LIMIT,
            yield_limit: BACKOFF_YIELD_LIMIT,
            max_backoff: BACKOFF_MAX_SLEEP,
            pool_workers: DEFAULT_POOL_WORKERS,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (short critical sections)
    pub fn low_latency() -> Self {
        Self {
            cancel_poll_interval: Duration::from_micros(200),
            spin_limit: 100,
            yield_limit: 200,
            max_backoff: Duration::from_micros(100),
            ..Self::default()
        }
    }

    /// Configuration optimized for many threads hammering few locks
    pub fn high_contention() -> Self {
        Self {
            map_strategy: MapStrategy::Sharded,
            stripe_count: 64,
            lock_timeout: Duration::from_millis(250),
            spin_limit: 4,
            yield_limit: 16,
            max_backoff: Duration::from_millis(2),
            ..Self::default()
        }
    }

    /// Check invariants the primitives rely on
    pub fn validate(&self) -> SyncResult<()> {
        if self.stripe_count == 0 || !self.stripe_count.is_power_of_two() {
            return Err(SyncError::InvalidConfig(format!(
                "stripe_count must be a power of 2, got {}",
                self.stripe_count
            )));
        }
        if self.stripe_count > MAX_MAP_STRIPES {
            return Err(SyncError::InvalidConfig(format!(
                "stripe_count {} exceeds maximum {}",
                self.stripe_count, MAX_MAP_STRIPES
            )));
        }
        if self.cancel_poll_interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "cancel_poll_interval must be non-zero".into(),
            ));
        }
        if self.pool_workers == 0 || self.pool_workers > MAX_POOL_WORKERS {
            return Err(SyncError::InvalidConfig(format!(
                "pool_workers must be in 1..={}, got {}",
                MAX_POOL_WORKERS, self.pool_workers
            )));
        }
        Ok(())
    }

    /// Parse a JSON document; missing fields fall back to defaults
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading sync configuration");
        Self::from_json_str(&raw)
    }

    /// Defaults overlaid with `SYNC_*` environment variables
    ///
    /// - `SYNC_MAP_STRATEGY`: `striped` | `sharded`
    /// - `SYNC_STRIPES`: stripe count
    /// - `SYNC_LOCK_TIMEOUT_MS`: lock timeout in milliseconds
    /// - `SYNC_POOL_WORKERS`: worker pool size
    pub fn from_env() -> SyncResult<Self> {
        Self::default().overlay_env()
    }

    /// Apply `SYNC_*` overrides on top of this config
    pub fn overlay_env(mut self) -> SyncResult<Self> {
        if let Ok(raw) = std::env::var("SYNC_MAP_STRATEGY") {
            self.map_strategy = MapStrategy::parse(&raw)
                .ok_or_else(|| SyncError::Config(format!("unknown SYNC_MAP_STRATEGY: {}", raw)))?;
        }
        if let Some(stripes) = env_number("SYNC_STRIPES")? {
            self.stripe_count = stripes as usize;
        }
        if let Some(ms) = env_number("SYNC_LOCK_TIMEOUT_MS")? {
            self.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(workers) = env_number("SYNC_POOL_WORKERS")? {
            self.pool_workers = workers as usize;
        }
        self.validate()?;
        Ok(self)
    }
}

fn env_number(name: &str) -> SyncResult<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| SyncError::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

static GLOBAL: OnceLock<ArcSwap<SyncConfig>> = OnceLock::new();

fn global_slot() -> &'static ArcSwap<SyncConfig> {
    GLOBAL.get_or_init(|| ArcSwap::from_pointee(SyncConfig::default()))
}

/// Current process-wide configuration
pub fn global() -> Arc<SyncConfig> {
    global_slot().load_full()
}

/// Replace the process-wide configuration
///
/// Primitives already constructed keep the values they were built with.
pub fn install(config: SyncConfig) -> SyncResult<()> {
    if let Err(e) = config.validate() {
        warn!(error = %e, "Rejected sync configuration");
        return Err(e);
    }
    debug!(?config, "Installing sync configuration");
    global_slot().store(Arc::new(config));
    Ok(())
}
