// SPDX-License-Identifier: MIT OR Apache-2.0

//! `VirtualCluster`: a deterministic [`Invoker`] double driven by rules
//! instead of a real socket, paired with a mockable clock so tests can
//! advance time under a rule's `takes` without sleeping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::clock::MockClock;
use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::invoker::{Invoker, RawResponse};

/// Which kind of call a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Ping,
    Sniff,
    ClientCall,
}

/// How many times a rule stays eligible for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Always,
    Exactly(u32),
}

type PathPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One deterministic response recipe, matched against incoming calls by
/// `(onPort, pathPredicate)` specificity.
pub struct Rule {
    kind: RuleKind,
    on_port: Option<u16>,
    path_predicate: Option<PathPredicate>,
    times: Times,
    succeeds: bool,
    status: Option<u16>,
    takes: Option<Duration>,
    return_body: Option<Bytes>,
    new_cluster: Option<Vec<String>>,
    execute_count: AtomicU32,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("kind", &self.kind)
            .field("on_port", &self.on_port)
            .field("has_path_predicate", &self.path_predicate.is_some())
            .field("times", &self.times)
            .field("succeeds", &self.succeeds)
            .field("status", &self.status)
            .field("takes", &self.takes)
            .field("execute_count", &self.execute_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl Rule {
    fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            on_port: None,
            path_predicate: None,
            times: Times::Always,
            succeeds: true,
            status: Some(200),
            takes: None,
            return_body: None,
            new_cluster: None,
            execute_count: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        Self::new(RuleKind::Ping)
    }

    #[must_use]
    pub fn sniff() -> Self {
        Self::new(RuleKind::Sniff)
    }

    #[must_use]
    pub fn client_call() -> Self {
        Self::new(RuleKind::ClientCall)
    }

    #[must_use]
    pub fn on_port(mut self, port: u16) -> Self {
        self.on_port = Some(port);
        self
    }

    #[must_use]
    pub fn path(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.path_predicate = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn times(mut self, n: u32) -> Self {
        self.times = Times::Exactly(n);
        self
    }

    #[must_use]
    pub fn fails(mut self, status: u16) -> Self {
        self.succeeds = false;
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn takes(mut self, duration: Duration) -> Self {
        self.takes = Some(duration);
        self
    }

    #[must_use]
    pub fn returns_body(mut self, body: impl Into<Bytes>) -> Self {
        self.return_body = Some(body.into());
        self
    }

    /// For a [`RuleKind::Sniff`] rule: the `host:port` strings the cluster
    /// reseeds to on success.
    #[must_use]
    pub fn new_cluster(mut self, nodes: Vec<String>) -> Self {
        self.new_cluster = Some(nodes);
        self
    }

    fn applies(&self, port: u16, path: &str) -> bool {
        if let Some(p) = self.on_port {
            if p != port {
                return false;
            }
        }
        if let Some(predicate) = &self.path_predicate {
            if !predicate(path) {
                return false;
            }
        }
        match self.times {
            Times::Always => true,
            Times::Exactly(n) => self.execute_count.load(Ordering::SeqCst) < n,
        }
    }

    fn tier(&self) -> (bool, bool) {
        (self.on_port.is_some(), self.path_predicate.is_some())
    }
}

/// Per-node call counters tracked by the virtual cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounters {
    pub called: u32,
    pub sniffed: u32,
    pub pinged: u32,
    pub successes: u32,
    pub failures: u32,
}

/// An alternate [`Invoker`] keyed by deterministic [`Rule`]s instead of a
/// real socket. Wraps a [`MockClock`] so `Rule::takes` advances virtual time.
pub struct VirtualCluster {
    rules: Vec<Rule>,
    clock: Arc<MockClock>,
    counters: Mutex<HashMap<u16, NodeCounters>>,
}

impl std::fmt::Debug for VirtualCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualCluster").field("rules", &self.rules).finish()
    }
}

fn classify(method: &http::Method, path: &str) -> RuleKind {
    if path == "/_nodes/http" {
        RuleKind::Sniff
    } else if *method == http::Method::HEAD {
        RuleKind::Ping
    } else {
        RuleKind::ClientCall
    }
}

impl VirtualCluster {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            clock: MockClock::new(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn clock(&self) -> Arc<MockClock> {
        Arc::clone(&self.clock)
    }

    #[must_use]
    pub fn counters(&self, port: u16) -> NodeCounters {
        self.counters.lock().unwrap().get(&port).copied().unwrap_or_default()
    }

    fn with_counters(&self, port: u16, f: impl FnOnce(&mut NodeCounters)) {
        let mut guard = self.counters.lock().unwrap();
        f(guard.entry(port).or_default());
    }

    fn select_rule(&self, kind: RuleKind, port: u16, path: &str) -> Option<&Rule> {
        const TIERS: [(bool, bool); 4] = [(true, true), (true, false), (false, true), (false, false)];
        for wanted in TIERS {
            if let Some(rule) = self
                .rules
                .iter()
                .find(|r| r.kind == kind && r.tier() == wanted && r.applies(port, path))
            {
                return Some(rule);
            }
        }
        None
    }

    fn default_success(kind: RuleKind) -> RawResponse {
        let body = match kind {
            RuleKind::Ping => Bytes::new(),
            RuleKind::ClientCall => Bytes::from_static(br#"{"cluster_name":"virtual","status":"green"}"#),
            RuleKind::Sniff => Bytes::from_static(br#"{"nodes":{}}"#),
        };
        RawResponse {
            status_code: Some(200),
            mime_type: Some("application/json".to_string()),
            content_length: Some(body.len() as u64),
            body,
            ..Default::default()
        }
    }

    fn sniff_body(nodes: &[String]) -> Bytes {
        let mut map = serde_json::Map::new();
        for (idx, host_port) in nodes.iter().enumerate() {
            let mut http = serde_json::Map::new();
            http.insert("publish_address".to_string(), serde_json::Value::String(host_port.clone()));
            let mut entry = serde_json::Map::new();
            entry.insert("http".to_string(), serde_json::Value::Object(http));
            map.insert(format!("node-{idx}"), serde_json::Value::Object(entry));
        }
        let envelope = serde_json::json!({ "nodes": serde_json::Value::Object(map) });
        Bytes::from(serde_json::to_vec(&envelope).unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Invoker for VirtualCluster {
    async fn request(&self, endpoint: &Endpoint, bound_config: &BoundConfiguration, _body: Option<Bytes>) -> Result<RawResponse> {
        let node = endpoint
            .node()
            .ok_or_else(|| TransportError::Unexpected("virtual cluster cannot invoke the empty endpoint".to_string()))?;
        let port = node.uri().port().unwrap_or(0);
        let path = endpoint.path_and_query();
        let kind = classify(endpoint.method(), path);

        self.with_counters(port, |c| match kind {
            RuleKind::Ping => c.pinged += 1,
            RuleKind::Sniff => c.sniffed += 1,
            RuleKind::ClientCall => c.called += 1,
        });

        let Some(rule) = self.select_rule(kind, port, path) else {
            self.with_counters(port, |c| c.successes += 1);
            return Ok(Self::default_success(kind));
        };
        rule.execute_count.fetch_add(1, Ordering::SeqCst);

        if let Some(takes) = rule.takes {
            let bounded = takes.min(bound_config.request_timeout);
            self.clock.advance(bounded);
            if takes > bound_config.request_timeout {
                self.with_counters(port, |c| c.failures += 1);
                return Err(TransportError::Unexpected(format!(
                    "virtual cluster rule took {takes:?}, exceeding the request timeout of {:?}",
                    bound_config.request_timeout
                )));
            }
        }

        if rule.succeeds {
            self.with_counters(port, |c| c.successes += 1);
            let body = match (&rule.return_body, kind) {
                (Some(body), _) => body.clone(),
                (None, RuleKind::Sniff) => Self::sniff_body(rule.new_cluster.as_deref().unwrap_or(&[])),
                (None, RuleKind::Ping) => Bytes::new(),
                (None, RuleKind::ClientCall) => Bytes::from_static(br#"{"cluster_name":"virtual","status":"green"}"#),
            };
            Ok(RawResponse {
                status_code: Some(200),
                mime_type: Some("application/json".to_string()),
                content_length: Some(body.len() as u64),
                body,
                ..Default::default()
            })
        } else {
            self.with_counters(port, |c| c.failures += 1);
            let configured = rule.status.unwrap_or(500);
            let status = if (200..300).contains(&configured) { 502 } else { configured };
            Ok(RawResponse {
                status_code: Some(status),
                mime_type: Some("application/json".to_string()),
                body: Bytes::from_static(br#"{"error":{"reason":"virtual cluster rule configured to fail"}}"#),
                ..Default::default()
            })
        }
    }
}
