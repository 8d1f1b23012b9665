// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::clock::Clock;
use crate::node::Node;
use crate::pipeline::audit::{AuditEvent, Auditor};
use crate::pool::{validate_nodes, NodePool, NodeView};

/// `view` yields the first live node by default scorer order (insertion order)
/// and never advances past it until it is marked dead.
struct StickyView {
    snapshot: Vec<Arc<Node>>,
    tried: HashSet<usize>,
    resurrection_emitted: bool,
    now: Instant,
}

impl NodeView for StickyView {
    fn next(&mut self, auditor: &Auditor) -> Option<Arc<Node>> {
        for (idx, node) in self.snapshot.iter().enumerate() {
            if self.tried.contains(&idx) {
                continue;
            }
            if node.is_alive() && !node.is_dead_until(self.now) {
                self.tried.insert(idx);
                return Some(Arc::clone(node));
            }
        }
        if !self.resurrection_emitted {
            if let Some((idx, probe)) = self
                .snapshot
                .iter()
                .enumerate()
                .filter(|(idx, _)| !self.tried.contains(idx))
                .min_by_key(|(_, n)| n.failed_attempts())
            {
                self.resurrection_emitted = true;
                self.tried.insert(idx);
                probe.mark_as_resurrection_probe();
                auditor.record(AuditEvent::Resurrection, Some(&probe.uri().to_string()), None, None);
                return Some(Arc::clone(probe));
            }
        }
        None
    }
}

/// A fixed set of nodes that sticks to the first live one; no reseeding.
#[derive(Debug)]
pub struct StickyNodePool {
    nodes: Vec<Arc<Node>>,
    sniffed_on_startup: AtomicBool,
    created_at: Instant,
    using_ssl: bool,
}

impl StickyNodePool {
    #[must_use]
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        validate_nodes(&nodes);
        let using_ssl = nodes.iter().all(|n| n.uri().is_https());
        Self {
            nodes,
            sniffed_on_startup: AtomicBool::new(false),
            created_at: Instant::now(),
            using_ssl,
        }
    }
}

impl NodePool for StickyNodePool {
    fn view(&self, clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        Box::new(StickyView {
            snapshot: self.nodes.clone(),
            tried: HashSet::new(),
            resurrection_emitted: false,
            now: clock.now(),
        })
    }
    fn reseed(&self, _new_nodes: Vec<Arc<Node>>) {}
    fn mark_as_sniffed(&self) {
        self.sniffed_on_startup.store(true, Ordering::Release);
    }
    fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.clone()
    }
    fn last_update(&self) -> Instant {
        self.created_at
    }
    fn sniffed_on_startup(&self) -> bool {
        self.sniffed_on_startup.load(Ordering::Acquire)
    }
    fn using_ssl(&self) -> bool {
        self.using_ssl
    }
    fn supports_pinging(&self) -> bool {
        true
    }
    fn supports_reseeding(&self) -> bool {
        false
    }
    fn max_retries(&self) -> u32 {
        self.nodes.len().saturating_sub(1) as u32
    }
}

/// A sticky pool whose topology may be replaced via [`NodePool::reseed`].
#[derive(Debug)]
pub struct StickySniffingNodePool {
    nodes: RwLock<Vec<Arc<Node>>>,
    last_update: RwLock<Instant>,
    sniffed_on_startup: AtomicBool,
    using_ssl: bool,
}

impl StickySniffingNodePool {
    #[must_use]
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        validate_nodes(&nodes);
        let using_ssl = nodes.iter().all(|n| n.uri().is_https());
        Self {
            nodes: RwLock::new(nodes),
            last_update: RwLock::new(Instant::now()),
            sniffed_on_startup: AtomicBool::new(false),
            using_ssl,
        }
    }
}

impl NodePool for StickySniffingNodePool {
    fn view(&self, clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        Box::new(StickyView {
            snapshot: self.nodes.read().unwrap().clone(),
            tried: HashSet::new(),
            resurrection_emitted: false,
            now: clock.now(),
        })
    }
    fn reseed(&self, new_nodes: Vec<Arc<Node>>) {
        validate_nodes(&new_nodes);
        *self.nodes.write().unwrap() = new_nodes;
        *self.last_update.write().unwrap() = Instant::now();
    }
    fn mark_as_sniffed(&self) {
        self.sniffed_on_startup.store(true, Ordering::Release);
    }
    fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().unwrap().clone()
    }
    fn last_update(&self) -> Instant {
        *self.last_update.read().unwrap()
    }
    fn sniffed_on_startup(&self) -> bool {
        self.sniffed_on_startup.load(Ordering::Acquire)
    }
    fn using_ssl(&self) -> bool {
        self.using_ssl
    }
    fn supports_pinging(&self) -> bool {
        true
    }
    fn supports_reseeding(&self) -> bool {
        true
    }
    fn max_retries(&self) -> u32 {
        self.nodes.read().unwrap().len().saturating_sub(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeUri;
    use std::time::Duration;

    fn node(uri: &str) -> Arc<Node> {
        Arc::new(Node::new(NodeUri::parse(uri).unwrap()))
    }

    fn clock() -> crate::clock::SharedClock {
        crate::clock::system_clock()
    }

    fn auditor() -> Auditor {
        Auditor::new(clock())
    }

    #[test]
    fn sticks_to_first_live_node_across_requests() {
        let pool = StickyNodePool::new(vec![node("http://localhost:9200"), node("http://localhost:9201")]);
        let a = auditor();
        let c = clock();
        for _ in 0..10 {
            let n = pool.view(c.as_ref()).next(&a).unwrap();
            assert_eq!(n.uri().to_string(), "http://localhost:9200/");
        }
    }

    #[test]
    fn moves_on_when_sticky_node_dies() {
        let first = node("http://localhost:9200");
        let second = node("http://localhost:9201");
        let pool = StickyNodePool::new(vec![Arc::clone(&first), Arc::clone(&second)]);
        let a = auditor();
        let c = clock();
        assert_eq!(pool.view(c.as_ref()).next(&a).unwrap().uri().to_string(), "http://localhost:9200/");

        first.mark_dead(Instant::now(), Duration::from_secs(9999), Duration::from_secs(9999));
        assert_eq!(pool.view(c.as_ref()).next(&a).unwrap().uri().to_string(), "http://localhost:9201/");
    }

    #[test]
    fn within_one_view_advances_past_tried_node() {
        let first = node("http://localhost:9200");
        let second = node("http://localhost:9201");
        let pool = StickyNodePool::new(vec![Arc::clone(&first), Arc::clone(&second)]);
        let a = auditor();
        let c = clock();
        let mut view = pool.view(c.as_ref());
        let one = view.next(&a).unwrap();
        assert_eq!(one.uri().to_string(), "http://localhost:9200/");
        one.mark_dead(Instant::now(), Duration::from_secs(9999), Duration::from_secs(9999));
        let two = view.next(&a).unwrap();
        assert_eq!(two.uri().to_string(), "http://localhost:9201/");
    }

    #[test]
    fn sniffing_variant_supports_reseed() {
        let pool = StickySniffingNodePool::new(vec![node("http://localhost:9200")]);
        assert!(pool.supports_reseeding());
        pool.reseed(vec![node("http://localhost:9201"), node("http://localhost:9202")]);
        assert_eq!(pool.nodes().len(), 2);
    }
}
