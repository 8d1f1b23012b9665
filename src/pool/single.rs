// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Instant;

use crate::clock::Clock;
use crate::node::Node;
use crate::pipeline::audit::Auditor;
use crate::pool::{NodePool, NodeView};

/// A pool backed by exactly one node. No pinging, no reseeding, no retries.
#[derive(Debug)]
pub struct SingleNodePool {
    node: Arc<Node>,
    created_at: Instant,
}

impl SingleNodePool {
    #[must_use]
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            created_at: Instant::now(),
        }
    }
}

struct SingleView(Arc<Node>);

impl NodeView for SingleView {
    fn next(&mut self, _auditor: &Auditor) -> Option<Arc<Node>> {
        Some(Arc::clone(&self.0))
    }
}

impl NodePool for SingleNodePool {
    fn view(&self, _clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        Box::new(SingleView(Arc::clone(&self.node)))
    }

    fn reseed(&self, _new_nodes: Vec<Arc<Node>>) {
        // A single-node pool never supports reseeding.
    }

    fn mark_as_sniffed(&self) {}

    fn nodes(&self) -> Vec<Arc<Node>> {
        vec![Arc::clone(&self.node)]
    }

    fn last_update(&self) -> Instant {
        self.created_at
    }

    fn sniffed_on_startup(&self) -> bool {
        true
    }

    fn using_ssl(&self) -> bool {
        self.node.uri().is_https()
    }

    fn supports_pinging(&self) -> bool {
        false
    }

    fn supports_reseeding(&self) -> bool {
        false
    }

    fn max_retries(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeUri;

    fn node(uri: &str) -> Arc<Node> {
        Arc::new(Node::new(NodeUri::parse(uri).unwrap()))
    }

    #[test]
    fn yields_the_same_node_forever() {
        let pool = SingleNodePool::new(node("http://localhost:9200"));
        let clock = crate::clock::system_clock();
        let auditor = Auditor::new(clock.clone());
        let mut view = pool.view(clock.as_ref());
        for _ in 0..5 {
            let n = view.next(&auditor).unwrap();
            assert_eq!(n.uri().to_string(), "http://localhost:9200/");
        }
    }

    #[test]
    fn capability_flags() {
        let pool = SingleNodePool::new(node("https://localhost:9200"));
        assert!(!pool.supports_pinging());
        assert!(!pool.supports_reseeding());
        assert_eq!(pool.max_retries(), 0);
        assert!(pool.using_ssl());
        assert_eq!(pool.nodes().len(), 1);
    }
}
