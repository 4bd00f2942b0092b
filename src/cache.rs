//! Process-wide sanitization result cache with single-flight semantics
//!
//! One entry per source URL, holding either a settled result or a shared
//! handle to the in-flight computation. The first caller for a URL triggers
//! exactly one computation; everyone else — concurrent or later — attaches
//! to the same eventual result. Entries are never evicted: a degraded settle
//! stays cached so a permanently broken image is not re-fetched on every
//! render. Growth is bounded by the number of distinct source URLs.

use crate::SanitizedResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type PendingResult = Shared<BoxFuture<'static, SanitizedResult>>;

#[derive(Clone)]
enum CacheEntry {
    Pending(PendingResult),
    Settled(SanitizedResult),
}

/// Memoization keyed by source URL; settled entries live for the process
/// lifetime.
pub struct SanitizationCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl SanitizationCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Settled result for `url`, if any. Pending entries return `None`.
    pub fn get(&self, url: &str) -> Option<SanitizedResult> {
        self.entries.lock().ok().and_then(|entries| match entries.get(url) {
            Some(CacheEntry::Settled(result)) => Some(result.clone()),
            _ => None,
        })
    }

    /// Return the cached result for `url`, computing it at most once.
    ///
    /// The settled/pending check and the pending insert happen under one
    /// lock acquisition with no intervening await, so two concurrent
    /// first-callers cannot both win. The computation itself runs as a
    /// detached task: it settles the cache even if every caller stops
    /// awaiting, and the entry transitions pending -> settled exactly once.
    pub async fn get_or_compute<F, Fut>(&self, url: &str, compute: F) -> SanitizedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SanitizedResult> + Send + 'static,
    {
        let (pending, settle_tx) = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(url) {
                Some(CacheEntry::Settled(result)) => {
                    debug!("sanitization cache hit for {url}");
                    return result.clone();
                }
                Some(CacheEntry::Pending(shared)) => {
                    debug!("joining in-flight sanitization of {url}");
                    (shared.clone(), None)
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    let fallback = url.to_string();
                    let shared: PendingResult = rx
                        .map(move |res: Result<SanitizedResult, oneshot::error::RecvError>| {
                            res.unwrap_or_else(|_| {
                                SanitizedResult::degraded(fallback, "sanitization task dropped")
                            })
                        })
                        .boxed()
                        .shared();
                    entries.insert(url.to_string(), CacheEntry::Pending(shared.clone()));
                    (shared, Some(tx))
                }
            }
        };

        if let Some(tx) = settle_tx {
            let work = compute();
            let entries = Arc::clone(&self.entries);
            let key = url.to_string();
            tokio::spawn(async move {
                let result = work.await;
                // Settle the map before waking waiters so no waiter can
                // observe a pending entry after its result arrived.
                if let Ok(mut entries) = entries.lock() {
                    entries.insert(key, CacheEntry::Settled(result.clone()));
                }
                let _ = tx.send(result);
            });
        }

        pending.await
    }
}

impl Default for SanitizationCache {
    fn default() -> Self {
        Self::new()
    }
}
