// SPDX-License-Identifier: MIT OR Apache-2.0

//! Addressable endpoints with liveness metadata.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use url::Url;

/// An addressable cluster endpoint: scheme, host, port, and base path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeUri(Url);

impl NodeUri {
    /// Parse a node URI from a string. The trailing slash is normalized away
    /// so that two otherwise-identical URIs compare equal.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
        Ok(Self(url))
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    #[must_use]
    pub fn is_https(&self) -> bool {
        self.0.scheme() == "https"
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.0.port_or_known_default()
    }

    /// Build the full request URI for `path_and_query` appended to this node.
    #[must_use]
    pub fn with_path_and_query(&self, path_and_query: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{base}{path_and_query}")
        } else {
            format!("{base}/{path_and_query}")
        }
    }
}

impl std::fmt::Display for NodeUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The default dead-node timeout: exponential back-off from 60s up to 30min.
#[must_use]
pub fn default_dead_timeout_policy(failed_attempts: u32, dead_timeout: Duration, max_dead_timeout: Duration) -> Duration {
    if failed_attempts <= 1 {
        return dead_timeout;
    }
    let shift = (failed_attempts - 1).min(20);
    let doubled = dead_timeout.as_millis().saturating_mul(1u128 << shift);
    let capped = doubled.min(max_dead_timeout.as_millis());
    Duration::from_millis(capped as u64).max(dead_timeout).min(max_dead_timeout)
}

/// A single candidate endpoint in a [`crate::pool::NodePool`].
///
/// Mutated only via [`Node::mark_alive`] / [`Node::mark_dead`]; nodes are
/// never destroyed, only dropped from the pool during a reseed.
#[derive(Debug)]
pub struct Node {
    uri: NodeUri,
    alive: AtomicBool,
    failed_attempts: AtomicU32,
    // Stored as an absolute `Instant` derived only from whatever `now` a caller
    // passes to `mark_dead`, never from a locally-captured `Instant::now()` —
    // see the clock-abstraction invariant in `crate::clock`.
    dead_until: RwLock<Option<Instant>>,
    resurrected: AtomicBool,
}

impl Node {
    #[must_use]
    pub fn new(uri: NodeUri) -> Self {
        Self {
            uri,
            alive: AtomicBool::new(true),
            failed_attempts: AtomicU32::new(0),
            dead_until: RwLock::new(None),
            resurrected: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn uri(&self) -> &NodeUri {
        &self.uri
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::Acquire)
    }

    /// Whether this node is dead but its `deadUntil` has elapsed, so a probe may try it.
    #[must_use]
    pub fn is_resurrected(&self) -> bool {
        self.resurrected.load(Ordering::Acquire)
    }

    fn set_resurrected(&self, value: bool) {
        self.resurrected.store(value, Ordering::Release);
    }

    /// Whether `now` is still within this node's dead window.
    #[must_use]
    pub fn is_dead_until(&self, now: Instant) -> bool {
        match *self.dead_until.read().unwrap() {
            Some(dead_until) => now < dead_until,
            None => false,
        }
    }

    /// Mark this node as a live candidate, eligible for the normal rotation again.
    ///
    /// Called when iterating and deciding whether a dead node should be offered
    /// as a resurrection probe.
    pub fn mark_as_resurrection_probe(&self) {
        self.set_resurrected(true);
    }

    pub fn clear_resurrection_flag(&self) {
        self.set_resurrected(false);
    }

    /// `node.isAlive=true; failedAttempts=0; deadUntil=∅`.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
        self.failed_attempts.store(0, Ordering::Release);
        *self.dead_until.write().unwrap() = None;
        self.set_resurrected(false);
    }

    /// `deadUntil = now + deadTimeoutPolicy(failedAttempts, ...); isAlive=false; failedAttempts++`.
    pub fn mark_dead(&self, now: Instant, dead_timeout: Duration, max_dead_timeout: Duration) {
        let attempts = self.failed_attempts.fetch_add(1, Ordering::AcqRel) + 1;
        let backoff = default_dead_timeout_policy(attempts, dead_timeout, max_dead_timeout);
        *self.dead_until.write().unwrap() = Some(now + backoff);
        self.alive.store(false, Ordering::Release);
        self.set_resurrected(false);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}
impl Eq for Node {}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> NodeUri {
        NodeUri::parse(s).unwrap()
    }

    #[test]
    fn normalizes_trailing_slash() {
        assert_eq!(uri("http://localhost:9200/"), uri("http://localhost:9200"));
    }

    #[test]
    fn builds_path_and_query() {
        let n = uri("http://localhost:9200");
        assert_eq!(n.with_path_and_query("/_cluster/health"), "http://localhost:9200/_cluster/health");
        assert_eq!(n.with_path_and_query("_cluster/health"), "http://localhost:9200/_cluster/health");
    }

    #[test]
    fn new_node_is_alive() {
        let node = Node::new(uri("http://localhost:9200"));
        assert!(node.is_alive());
        assert_eq!(node.failed_attempts(), 0);
        assert!(!node.is_dead_until(Instant::now()));
    }

    #[test]
    fn mark_dead_then_alive() {
        let node = Node::new(uri("http://localhost:9200"));
        let now = Instant::now();
        node.mark_dead(now, Duration::from_secs(60), Duration::from_secs(1800));
        assert!(!node.is_alive());
        assert_eq!(node.failed_attempts(), 1);
        assert!(node.is_dead_until(now + Duration::from_secs(1)));
        assert!(!node.is_dead_until(now + Duration::from_secs(61)));

        node.mark_alive();
        assert!(node.is_alive());
        assert_eq!(node.failed_attempts(), 0);
        assert!(!node.is_dead_until(now + Duration::from_secs(1)));
    }

    #[test]
    fn dead_timeout_backs_off_exponentially_and_clamps() {
        let base = Duration::from_secs(60);
        let max = Duration::from_secs(1800);
        assert_eq!(default_dead_timeout_policy(1, base, max), Duration::from_secs(60));
        assert_eq!(default_dead_timeout_policy(2, base, max), Duration::from_secs(120));
        assert_eq!(default_dead_timeout_policy(3, base, max), Duration::from_secs(240));
        assert_eq!(default_dead_timeout_policy(10, base, max), max);
    }

    #[test]
    fn mark_dead_anchors_to_the_given_clock_not_to_node_construction_time() {
        let node = Node::new(uri("http://localhost:9200"));
        // A clock lagging behind real wall-clock time (e.g. a `MockClock` whose
        // base predates this process) must still produce a correct dead window;
        // nothing here may be computed relative to when the `Node` was built.
        let now = Instant::now() - Duration::from_secs(10);
        node.mark_dead(now, Duration::from_secs(60), Duration::from_secs(1800));
        assert!(node.is_dead_until(now + Duration::from_secs(59)));
        assert!(!node.is_dead_until(now + Duration::from_secs(61)));
    }

    #[test]
    fn resurrection_flag_round_trips() {
        let node = Node::new(uri("http://localhost:9200"));
        assert!(!node.is_resurrected());
        node.mark_as_resurrection_probe();
        assert!(node.is_resurrected());
        node.clear_resurrection_flag();
        assert!(!node.is_resurrected());
    }
}
