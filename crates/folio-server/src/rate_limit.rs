//! Fixed-window, per-client request limiter for `POST /api/events`.
//!
//! Each client key gets a window of `window` length starting at its first
//! request. Memory is bounded two ways: expired windows are pruned at most
//! once per cleanup interval, and when the map grows past `max_entries` the
//! entries whose windows end soonest are evicted until `trim_to` remain.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use folio_core::config::{RateLimitConfig, MAX_RATE_LIMIT_WINDOW_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, RateLimitEntry>,
    last_cleanup: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_cleanup: None,
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now()).await
    }

    /// Record a request from `key` at `now` and decide whether it may proceed.
    ///
    /// The read-modify-write happens under one lock, so concurrent requests
    /// from the same client cannot both observe the last free slot.
    pub async fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut inner = self.inner.lock().await;

        let cleanup_due = inner
            .last_cleanup
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.cleanup_interval());
        if cleanup_due {
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| entry.reset_at >= now);
            inner.last_cleanup = Some(now);
            let pruned = before - inner.entries.len();
            if pruned > 0 {
                debug!(pruned, "Pruned expired rate-limit windows");
            }
        }

        if inner.entries.len() > self.config.max_entries {
            evict_soonest(&mut inner.entries, self.config.trim_to);
        }

        let max = self.config.max_requests;
        let window = self.config.window();

        if let Some(entry) = inner
            .entries
            .get_mut(key)
            .filter(|entry| now <= entry.reset_at)
        {
            if entry.count >= max {
                return RateLimitDecision::Limited {
                    retry_after: entry.reset_at.saturating_duration_since(now),
                };
            }
            entry.count += 1;
            return RateLimitDecision::Allowed {
                remaining: max - entry.count,
            };
        }

        // New client, or its previous window has ended. A window too long to
        // represent is clamped to the longest accepted one.
        let reset_at = now
            .checked_add(window)
            .or_else(|| now.checked_add(Duration::from_secs(MAX_RATE_LIMIT_WINDOW_SECS)))
            .unwrap_or(now);
        inner.entries.insert(
            key.to_string(),
            RateLimitEntry { count: 1, reset_at },
        );
        RateLimitDecision::Allowed {
            remaining: max.saturating_sub(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.inner.lock().await.entries.get(key).copied()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.last_cleanup = None;
    }
}

/// Evict the entries whose windows end soonest until `target` remain.
fn evict_soonest(entries: &mut HashMap<String, RateLimitEntry>, target: usize) {
    let excess = entries.len().saturating_sub(target);
    if excess == 0 {
        return;
    }
    let mut by_reset: Vec<(Instant, String)> = entries
        .iter()
        .map(|(key, entry)| (entry.reset_at, key.clone()))
        .collect();
    by_reset.select_nth_unstable_by_key(excess - 1, |(reset_at, _)| *reset_at);
    for (_, key) in by_reset.into_iter().take(excess) {
        entries.remove(&key);
    }
    debug!(evicted = excess, remaining = entries.len(), "Rate-limit map over capacity");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[tokio::test]
    async fn allows_sixty_then_limits() {
        let limiter = limiter();
        let now = Instant::now();
        for i in 0..60 {
            let decision = limiter.check_at("1.2.3.4", now).await;
            assert!(decision.is_allowed(), "request {} should pass", i + 1);
        }
        let decision = limiter.check_at("1.2.3.4", now).await;
        assert!(matches!(decision, RateLimitDecision::Limited { .. }));
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = limiter();
        let now = Instant::now();
        assert_eq!(
            limiter.check_at("a", now).await,
            RateLimitDecision::Allowed { remaining: 59 }
        );
        assert_eq!(
            limiter.check_at("a", now).await,
            RateLimitDecision::Allowed { remaining: 58 }
        );
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..60 {
            limiter.check_at("busy", now).await;
        }
        assert!(!limiter.check_at("busy", now).await.is_allowed());
        assert!(limiter.check_at("quiet", now).await.is_allowed());
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..60 {
            limiter.check_at("ip", start).await;
        }
        assert!(!limiter.check_at("ip", start).await.is_allowed());

        // Still inside the window at exactly reset time.
        let at_reset = start + Duration::from_secs(60);
        assert!(!limiter.check_at("ip", at_reset).await.is_allowed());

        let after = start + Duration::from_secs(61);
        assert_eq!(
            limiter.check_at("ip", after).await,
            RateLimitDecision::Allowed { remaining: 59 }
        );
        let entry = limiter.entry("ip").await.expect("entry");
        assert_eq!(entry.count, 1);
        assert_eq!(entry.reset_at, after + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn limited_reports_time_left_in_window() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..60 {
            limiter.check_at("ip", start).await;
        }
        let decision = limiter.check_at("ip", start + Duration::from_secs(15)).await;
        assert_eq!(
            decision,
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(45)
            }
        );
    }

    #[tokio::test]
    async fn expired_entries_are_pruned_on_cleanup() {
        let limiter = limiter();
        let start = Instant::now();
        limiter.check_at("old", start).await;
        limiter.check_at("other", start).await;
        assert_eq!(limiter.len().await, 2);

        // Cleanup is throttled: nothing is pruned before the interval elapses.
        limiter.check_at("new", start + Duration::from_secs(30)).await;
        assert_eq!(limiter.len().await, 3);

        limiter.check_at("new", start + Duration::from_secs(90)).await;
        assert_eq!(limiter.len().await, 1);
        assert!(limiter.entry("old").await.is_none());
    }

    #[tokio::test]
    async fn huge_window_does_not_panic() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_secs: u64::MAX,
            ..RateLimitConfig::default()
        });
        let now = Instant::now();
        assert!(limiter.check_at("ip", now).await.is_allowed());
        let entry = limiter.entry("ip").await.expect("entry");
        assert!(entry.reset_at >= now);
    }

    #[tokio::test]
    async fn over_capacity_evicts_soonest_windows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_entries: 10,
            trim_to: 5,
            ..RateLimitConfig::default()
        });
        let start = Instant::now();
        for i in 0..11u64 {
            limiter
                .check_at(&format!("ip-{i}"), start + Duration::from_millis(i))
                .await;
        }
        assert_eq!(limiter.len().await, 11);

        limiter.check_at("late", start + Duration::from_millis(20)).await;
        assert_eq!(limiter.len().await, 6);
        assert!(limiter.entry("ip-0").await.is_none());
        assert!(limiter.entry("ip-5").await.is_none());
        assert!(limiter.entry("ip-6").await.is_some());
        assert!(limiter.entry("ip-10").await.is_some());
        assert!(limiter.entry("late").await.is_some());
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let limiter = limiter();
        limiter.check("a").await;
        limiter.clear().await;
        assert!(limiter.is_empty().await);
    }
}
