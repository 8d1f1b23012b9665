// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::clock::Clock;
use crate::node::Node;
use crate::pipeline::audit::{AuditEvent, Auditor};
use crate::pool::{validate_nodes, NodePool, NodeView};

/// Shared rotation/reseed machinery for [`StaticNodePool`] and [`SniffingNodePool`].
///
/// `reseed` takes an exclusive lock; `view` takes a shared snapshot so that
/// concurrent reads never observe a partial topology.
#[derive(Debug)]
struct RotatingPool {
    nodes: RwLock<Vec<Arc<Node>>>,
    cursor: AtomicUsize,
    last_update: RwLock<Instant>,
    sniffed_on_startup: AtomicBool,
    using_ssl: bool,
}

impl RotatingPool {
    fn new(nodes: Vec<Arc<Node>>) -> Self {
        validate_nodes(&nodes);
        let using_ssl = nodes.iter().all(|n| n.uri().is_https());
        Self {
            nodes: RwLock::new(nodes),
            cursor: AtomicUsize::new(0),
            last_update: RwLock::new(Instant::now()),
            sniffed_on_startup: AtomicBool::new(false),
            using_ssl,
        }
    }

    fn view(&self, clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        let snapshot = self.nodes.read().unwrap().clone();
        let offset = self.cursor.fetch_add(1, Ordering::SeqCst) % snapshot.len().max(1);
        Box::new(RotatingView {
            snapshot,
            offset,
            position: 0,
            resurrection_emitted: false,
            yielded_alive: false,
            now: clock.now(),
        })
    }

    fn reseed(&self, new_nodes: Vec<Arc<Node>>) {
        validate_nodes(&new_nodes);
        let mut guard = self.nodes.write().unwrap();
        *guard = new_nodes;
        drop(guard);
        *self.last_update.write().unwrap() = Instant::now();
        self.cursor.store(0, Ordering::SeqCst);
    }

    fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().unwrap().clone()
    }

    fn max_retries(&self) -> u32 {
        let len = self.nodes.read().unwrap().len();
        len.saturating_sub(1) as u32
    }
}

struct RotatingView {
    snapshot: Vec<Arc<Node>>,
    offset: usize,
    position: usize,
    resurrection_emitted: bool,
    yielded_alive: bool,
    now: Instant,
}

impl NodeView for RotatingView {
    fn next(&mut self, auditor: &Auditor) -> Option<Arc<Node>> {
        let len = self.snapshot.len();
        while self.position < len {
            let idx = (self.offset + self.position) % len;
            self.position += 1;
            let node = &self.snapshot[idx];
            if node.is_alive() && !node.is_dead_until(self.now) {
                self.yielded_alive = true;
                return Some(Arc::clone(node));
            }
        }
        if !self.yielded_alive && !self.resurrection_emitted && !self.snapshot.is_empty() {
            self.resurrection_emitted = true;
            let probe = self
                .snapshot
                .iter()
                .min_by_key(|n| n.failed_attempts())
                .expect("snapshot is non-empty");
            probe.mark_as_resurrection_probe();
            auditor.record(AuditEvent::Resurrection, Some(&probe.uri().to_string()), None, None);
            return Some(Arc::clone(probe));
        }
        None
    }
}

/// A fixed set of nodes, round-robin among alive ones; falls back to a
/// resurrection probe when none are alive. Does not support reseeding.
#[derive(Debug)]
pub struct StaticNodePool {
    inner: RotatingPool,
}

impl StaticNodePool {
    #[must_use]
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        Self {
            inner: RotatingPool::new(nodes),
        }
    }
}

impl NodePool for StaticNodePool {
    fn view(&self, clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        self.inner.view(clock)
    }
    fn reseed(&self, _new_nodes: Vec<Arc<Node>>) {
        // Static pools never reseed; sniffing is the reseed-capable variant.
    }
    fn mark_as_sniffed(&self) {
        self.inner.sniffed_on_startup.store(true, Ordering::Release);
    }
    fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.nodes()
    }
    fn last_update(&self) -> Instant {
        *self.inner.last_update.read().unwrap()
    }
    fn sniffed_on_startup(&self) -> bool {
        self.inner.sniffed_on_startup.load(Ordering::Acquire)
    }
    fn using_ssl(&self) -> bool {
        self.inner.using_ssl
    }
    fn supports_pinging(&self) -> bool {
        true
    }
    fn supports_reseeding(&self) -> bool {
        false
    }
    fn max_retries(&self) -> u32 {
        self.inner.max_retries()
    }
}

/// Like [`StaticNodePool`], but topology may be replaced mid-run via [`NodePool::reseed`].
#[derive(Debug)]
pub struct SniffingNodePool {
    inner: RotatingPool,
}

impl SniffingNodePool {
    #[must_use]
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        Self {
            inner: RotatingPool::new(nodes),
        }
    }
}

impl NodePool for SniffingNodePool {
    fn view(&self, clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        self.inner.view(clock)
    }
    fn reseed(&self, new_nodes: Vec<Arc<Node>>) {
        self.inner.reseed(new_nodes);
    }
    fn mark_as_sniffed(&self) {
        self.inner.sniffed_on_startup.store(true, Ordering::Release);
    }
    fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.nodes()
    }
    fn last_update(&self) -> Instant {
        *self.inner.last_update.read().unwrap()
    }
    fn sniffed_on_startup(&self) -> bool {
        self.inner.sniffed_on_startup.load(Ordering::Acquire)
    }
    fn using_ssl(&self) -> bool {
        self.inner.using_ssl
    }
    fn supports_pinging(&self) -> bool {
        true
    }
    fn supports_reseeding(&self) -> bool {
        true
    }
    fn max_retries(&self) -> u32 {
        self.inner.max_retries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeUri;

    fn node(uri: &str) -> Arc<Node> {
        Arc::new(Node::new(NodeUri::parse(uri).unwrap()))
    }

    fn nodes(uris: &[&str]) -> Vec<Arc<Node>> {
        uris.iter().map(|u| node(u)).collect()
    }

    fn clock() -> crate::clock::SharedClock {
        crate::clock::system_clock()
    }

    fn auditor() -> Auditor {
        Auditor::new(clock())
    }

    #[test]
    fn round_robins_across_calls() {
        let pool = StaticNodePool::new(nodes(&["http://localhost:9200", "http://localhost:9201"]));
        let a = auditor();
        let c = clock();
        let first = pool.view(c.as_ref()).next(&a).unwrap();
        let second = pool.view(c.as_ref()).next(&a).unwrap();
        assert_ne!(first.uri(), second.uri());
    }

    #[test]
    fn falls_back_to_resurrection_probe_when_all_dead() {
        let ns = nodes(&["http://localhost:9200", "http://localhost:9201"]);
        for n in &ns {
            n.mark_dead(Instant::now(), std::time::Duration::from_secs(9999), std::time::Duration::from_secs(9999));
        }
        let pool = StaticNodePool::new(ns);
        let a = auditor();
        let c = clock();
        let mut view = pool.view(c.as_ref());
        let probe = view.next(&a).expect("resurrection probe");
        assert!(probe.is_resurrected());
        assert!(a.contains(AuditEvent::Resurrection));
        assert!(view.next(&a).is_none());
    }

    #[test]
    fn static_pool_max_retries_is_len_minus_one() {
        let pool = StaticNodePool::new(nodes(&["http://localhost:9200", "http://localhost:9201", "http://localhost:9202"]));
        assert_eq!(pool.max_retries(), 2);
        assert!(!pool.supports_reseeding());
    }

    #[test]
    fn sniffing_pool_reseed_replaces_topology_and_resets_cursor() {
        let pool = SniffingNodePool::new(nodes(&["http://localhost:9200"]));
        assert!(pool.supports_reseeding());
        let before = pool.last_update();
        std::thread::sleep(std::time::Duration::from_millis(2));
        pool.reseed(nodes(&["http://localhost:9201", "http://localhost:9202"]));
        assert_eq!(pool.nodes().len(), 2);
        assert!(pool.last_update() > before);
    }

    #[test]
    fn view_exhausts_after_one_pass() {
        let pool = StaticNodePool::new(nodes(&["http://localhost:9200"]));
        let a = auditor();
        let c = clock();
        let mut view = pool.view(c.as_ref());
        assert!(view.next(&a).is_some());
        assert!(view.next(&a).is_none());
    }
}
