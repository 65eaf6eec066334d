use std::time::Duration;

use crate::common::{DEFAULT_STALE_AFTER, MAX_BUCKET_SIZE_K};

/// Default interval between two full reprovide sweeps.
pub const DEFAULT_REPROVIDE_INTERVAL: Duration = Duration::from_secs(22 * 60 * 60);
/// Default number of provide RPCs in flight at once during a sweep.
pub const DEFAULT_PROVIDE_CONCURRENCY: usize = 32;

// Stored data in the default in-memory stores.
pub const MAX_PROVIDER_KEYS: usize = 2000;
pub const MAX_PROVIDERS_PER_KEY: usize = 500;
pub const MAX_RECORDS: usize = 1000;

#[derive(Debug, Clone)]
/// Engine Configurations
pub struct Config {
    /// How many closer peers to put in GET_VALUE, GET_PROVIDERS and FIND_NODE replies.
    ///
    /// Defaults to [MAX_BUCKET_SIZE_K]
    pub closest_peers: usize,
    /// How long a routing table entry can go without contact before
    /// a newly seen peer is allowed to replace it in a full bucket.
    ///
    /// Defaults to [DEFAULT_STALE_AFTER]
    pub stale_after: Duration,
    /// The maximum content keys for which to store providers.
    ///
    /// Defaults to [MAX_PROVIDER_KEYS]
    pub max_provider_keys: usize,
    /// The maximum providers to store per content key.
    ///
    /// Defaults to [MAX_PROVIDERS_PER_KEY]
    pub max_providers_per_key: usize,
    /// Maximum number of name records to store.
    ///
    /// Defaults to [MAX_RECORDS]
    pub max_records: usize,
    /// Interval between two full sweeps of the reprovider.
    ///
    /// The shorter this is, the fresher our provider records are on other
    /// nodes, at the cost of one provide RPC per local block per sweep.
    ///
    /// Defaults to [DEFAULT_REPROVIDE_INTERVAL]
    pub reprovide_interval: Duration,
    /// How many provide RPCs a reprovide batch keeps in flight at once.
    ///
    /// Defaults to [DEFAULT_PROVIDE_CONCURRENCY]
    pub provide_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            closest_peers: MAX_BUCKET_SIZE_K,
            stale_after: DEFAULT_STALE_AFTER,
            max_provider_keys: MAX_PROVIDER_KEYS,
            max_providers_per_key: MAX_PROVIDERS_PER_KEY,
            max_records: MAX_RECORDS,
            reprovide_interval: DEFAULT_REPROVIDE_INTERVAL,
            provide_concurrency: DEFAULT_PROVIDE_CONCURRENCY,
        }
    }
}
