use axum::http::HeaderMap;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

// stale windows are swept once the map grows past this
const PRUNE_THRESHOLD: usize = 1024;

// Rate limit entry - tracks requests per client key
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

// Fixed-window limiter for the generation routes
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    limit: u32,       // max requests allowed per window
    window: Duration, // length of one window
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
            trust_forwarded_for: false,
        }
    }

    /// Key clients on `x-forwarded-for`. Only safe behind a proxy that
    /// overwrites the header.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    // peer address, or the forwarded client when a proxy is trusted
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = self
            .trust_forwarded_for
            .then(|| headers.get("x-forwarded-for"))
            .flatten()
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match (forwarded, peer) {
            (Some(client), _) => client.to_string(),
            (None, Some(peer)) => peer.ip().to_string(),
            (None, None) => "global".to_string(),
        }
    }

    // true if the request is allowed (and counted)
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        if self.entries.len() >= PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        // window expired..? reset it
        if now.duration_since(entry.window_start) > self.window {
            entry.count = 1;
            entry.window_start = now;
            return true;
        }

        if entry.count < self.limit {
            entry.count += 1;
            return true;
        }

        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&self, now: Instant) {
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) <= self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn blocks_after_limit_until_window_passes() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        // other clients have their own window
        assert!(limiter.check("10.0.0.2"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_windows_are_pruned() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        for i in 0..PRUNE_THRESHOLD {
            assert!(limiter.check(&format!("client-{}", i)));
        }
        assert_eq!(limiter.len(), PRUNE_THRESHOLD);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("fresh"));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn forwarded_header_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();

        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.client_key(&headers, Some(peer)), "192.0.2.1");
        assert_eq!(limiter.client_key(&headers, None), "global");

        let limiter = limiter.trusting_forwarded_for(true);
        assert_eq!(limiter.client_key(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(limiter.client_key(&HeaderMap::new(), Some(peer)), "192.0.2.1");
    }
}
