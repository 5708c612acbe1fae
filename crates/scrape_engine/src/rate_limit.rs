//! Per-host request throttling.
//!
//! One limiter is shared by every fetch task in the process (through an
//! `Arc`, see [`HostRateLimiter::shared`]). Each host gets its own GCRA token
//! bucket; governor updates bucket state with an atomic compare-and-swap, so
//! two tasks can never spend the same token.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock, Mutex};

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use scrape_logging::scrape_trace;

/// Process-wide limiters, one per `(requests_per_second, burst)` setting.
static SHARED: LazyLock<Mutex<HashMap<(u32, u32), Arc<HostRateLimiter>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub struct HostRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl HostRateLimiter {
    pub fn new(requests_per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(requests_per_second).allow_burst(burst);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Returns `None` when `requests_per_second` is zero, meaning "no limit".
    /// A zero burst is treated as one.
    pub fn from_settings(requests_per_second: u32, burst: u32) -> Option<Self> {
        let rps = NonZeroU32::new(requests_per_second)?;
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Some(Self::new(rps, burst))
    }

    /// The process-wide limiter for these settings; every caller asking for
    /// the same settings gets the same buckets. `None` when `requests_per_second`
    /// is zero.
    pub fn shared(requests_per_second: u32, burst: u32) -> Option<Arc<Self>> {
        let rps = NonZeroU32::new(requests_per_second)?;
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let mut registry = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let limiter = registry
            .entry((rps.get(), burst.get()))
            .or_insert_with(|| Arc::new(Self::new(rps, burst)));
        Some(Arc::clone(limiter))
    }

    /// Waits until a request to `host` is allowed and spends the token.
    pub async fn acquire(&self, host: &str) {
        let key = normalize_host(host);
        if self.limiter.check_key(&key).is_ok() {
            return;
        }
        scrape_trace!("rate limit reached for host {}, waiting", key);
        self.limiter.until_key_ready(&key).await;
    }

    /// Spends a token for `host` if one is available right now.
    pub fn try_acquire(&self, host: &str) -> bool {
        self.limiter.check_key(&normalize_host(host)).is_ok()
    }
}

impl std::fmt::Debug for HostRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRateLimiter")
            .field("hosts", &self.limiter.len())
            .finish()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}
