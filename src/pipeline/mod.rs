// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `RequestPipeline` core state machine: node selection, sniffing,
//! pinging, failover, and response finalization for a single request.

pub mod audit;

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;

use crate::clock::SharedClock;
use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::{PipelineFailure, Result, TransportError};
use crate::invoker::Invoker;
use crate::node::Node;
use crate::pipeline::audit::{AuditEvent, Auditor};
use crate::pool::{NodePool, NodeView};
use crate::product::ProductRegistration;
use crate::response::{ApiCallDetails, Response, ResponseBody, ResponseBuilder, ResponseShape};

/// A hook invoked with the terminal [`ApiCallDetails`] of every request.
pub type RequestCompletedCallback = Arc<dyn Fn(&ApiCallDetails) + Send + Sync>;

/// Hard cap on view restarts triggered by a mid-iteration sniff refresh.
const MAX_VIEW_RESTARTS: u32 = 100;

/// A view that yields a single forced node once, bypassing the pool entirely.
struct ForcedView(Option<Arc<Node>>);

impl NodeView for ForcedView {
    fn next(&mut self, _auditor: &Auditor) -> Option<Arc<Node>> {
        self.0.take()
    }
}

/// Drives one request to completion against a [`NodePool`], failing over
/// across nodes per the pipeline's node/ping/sniff/finalize algorithm.
///
/// Single-use: construct a fresh pipeline per request via
/// [`crate::transport::Transport`].
pub struct RequestPipeline {
    pool: Arc<dyn NodePool>,
    registration: Arc<dyn ProductRegistration>,
    invoker: Arc<dyn Invoker>,
    clock: SharedClock,
    bound_config: Arc<BoundConfiguration>,
    bootstrap: Arc<Semaphore>,
    builder: ResponseBuilder,
    on_request_completed: Option<RequestCompletedCallback>,
}

impl RequestPipeline {
    #[must_use]
    pub fn new(
        pool: Arc<dyn NodePool>,
        registration: Arc<dyn ProductRegistration>,
        invoker: Arc<dyn Invoker>,
        clock: SharedClock,
        bound_config: Arc<BoundConfiguration>,
        bootstrap: Arc<Semaphore>,
    ) -> Self {
        Self {
            pool,
            registration,
            invoker,
            clock,
            bound_config,
            bootstrap,
            builder: ResponseBuilder::new(),
            on_request_completed: None,
        }
    }

    #[must_use]
    pub fn with_on_request_completed(mut self, callback: RequestCompletedCallback) -> Self {
        self.on_request_completed = Some(callback);
        self
    }

    /// Run the pipeline for one request.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: http::Method,
        path_and_query: &str,
        body: Option<Bytes>,
        shape: Option<ResponseShape>,
    ) -> Result<Response<T>> {
        let started = self.clock.now();
        let auditor = Auditor::new(self.clock.clone());

        self.first_pool_usage(&auditor).await?;

        let forced = self.bound_config.force_node.clone();

        if forced.is_none() {
            if let [only] = self.pool.nodes().as_slice() {
                if only.is_alive() && !only.is_dead_until(self.clock.now()) {
                    return self
                        .single_node_fast_path(Arc::clone(only), method, path_and_query, body, shape, auditor, started)
                        .await;
                }
            }
        }

        let mut last_endpoint = Endpoint::empty(method.clone(), path_and_query);
        let mut last_error: Option<TransportError> = None;
        let mut retried: u32 = 0;
        let mut restarts: u32 = 0;

        'restart: loop {
            let mut view: Box<dyn NodeView + '_> = match &forced {
                Some(uri) => Box::new(ForcedView(Some(Arc::new(Node::new(uri.clone()))))),
                None => self.pool.view(self.clock.as_ref()),
            };
            let mut refresh = false;

            loop {
                if self.depleted_retries(retried, started) {
                    break 'restart;
                }
                let Some(node) = view.next(&auditor) else { break };

                if forced.is_none() && self.sniffs_on_stale_cluster() && self.stale_cluster_state() {
                    auditor.record(
                        AuditEvent::SniffOnStaleCluster,
                        Some(&node.uri().to_string()),
                        None,
                        None,
                    );
                    if self.sniff_once(&auditor).await.is_ok() {
                        refresh = true;
                    }
                }

                if forced.is_none()
                    && self.registration.supports_ping()
                    && self.pool.supports_pinging()
                    && !self.bound_config.disable_pings
                    && node.is_resurrected()
                {
                    if let Err(err) = self.ping(&node, &auditor).await {
                        node.mark_dead(self.clock.now(), self.bound_config.dead_timeout, self.bound_config.max_dead_timeout);
                        retried += 1;
                        if self.sniffs_on_connection_fault() && self.sniff_once(&auditor).await.is_ok() {
                            refresh = true;
                        }
                        last_error = Some(err);
                        continue;
                    }
                }

                let (endpoint, outcome) = self
                    .call_product_endpoint::<T>(&node, method.clone(), path_and_query, body.clone(), shape, &auditor)
                    .await;
                last_endpoint = endpoint;

                match outcome {
                    Ok(response) if response.details.success_or_known_error() => {
                        node.mark_alive();
                        return self.finalize_success(response, auditor);
                    }
                    Ok(response) => {
                        node.mark_dead(self.clock.now(), self.bound_config.dead_timeout, self.bound_config.max_dead_timeout);
                        retried += 1;
                        if forced.is_none() && self.sniffs_on_connection_fault() && self.sniff_once(&auditor).await.is_ok() {
                            refresh = true;
                        }
                        let reason = if response.details.http_status_code.is_some() {
                            PipelineFailure::BadResponse
                        } else {
                            PipelineFailure::BadRequest
                        };
                        let mut message = format!("unexpected response status {:?}", response.details.http_status_code);
                        if let Some(server_reason) = &response.details.server_error_reason {
                            message.push_str(&format!(": {server_reason}"));
                        }
                        last_error = Some(TransportError::pipeline(reason, message));
                    }
                    Err(err) if !err.is_recoverable() => {
                        last_error = Some(err);
                        break 'restart;
                    }
                    Err(err) => {
                        node.mark_dead(self.clock.now(), self.bound_config.dead_timeout, self.bound_config.max_dead_timeout);
                        retried += 1;
                        if forced.is_none() && self.sniffs_on_connection_fault() && self.sniff_once(&auditor).await.is_ok() {
                            refresh = true;
                        }
                        last_error = Some(err);
                    }
                }
            }

            if forced.is_some() || !refresh || restarts >= MAX_VIEW_RESTARTS || self.depleted_retries(retried, started) {
                break 'restart;
            }
            restarts += 1;
        }

        self.finalize_failure(last_endpoint, last_error, retried, started, auditor)
    }

    async fn first_pool_usage(&self, auditor: &Auditor) -> Result<()> {
        let needs_sniff = self.bound_config.sniffs_on_startup
            && self.pool.supports_reseeding()
            && !self.pool.sniffed_on_startup()
            && !self.bound_config.disable_sniff;
        if !needs_sniff {
            return Ok(());
        }

        let acquired = tokio::time::timeout(self.bound_config.request_timeout, self.bootstrap.acquire()).await;
        let Ok(Ok(_permit)) = acquired else {
            return Err(TransportError::pipeline(
                PipelineFailure::CouldNotStartSniffOnStartup,
                "failed to acquire the bootstrap sniff-on-startup lock within the request timeout",
            ));
        };

        if self.pool.sniffed_on_startup() {
            return Ok(());
        }
        auditor.record(AuditEvent::SniffOnStartup, None, None, None);
        let _ = self.sniff_once(auditor).await;
        self.pool.mark_as_sniffed();
        Ok(())
    }

    async fn ping(&self, node: &Arc<Node>, auditor: &Auditor) -> Result<()> {
        let endpoint = self.registration.ping_endpoint(node);
        let mut ping_config = (*self.bound_config).clone();
        ping_config.request_timeout = self.bound_config.ping_timeout;

        let outcome = self.invoker.request(&endpoint, &ping_config, None).await;
        match outcome {
            Ok(raw) if matches!(raw.status_code, Some(code) if (200..300).contains(&code)) => {
                auditor.record(AuditEvent::PingSuccess, Some(&node.uri().to_string()), Some(endpoint.path_and_query()), None);
                Ok(())
            }
            Ok(raw) => {
                let message = format!("ping returned status {:?}", raw.status_code);
                auditor.record(
                    AuditEvent::PingFailure,
                    Some(&node.uri().to_string()),
                    Some(endpoint.path_and_query()),
                    Some(message.clone()),
                );
                Err(TransportError::pipeline(PipelineFailure::PingFailure, message))
            }
            Err(err) => {
                let message = err.to_string();
                auditor.record(
                    AuditEvent::PingFailure,
                    Some(&node.uri().to_string()),
                    Some(endpoint.path_and_query()),
                    Some(message.clone()),
                );
                Err(TransportError::pipeline_with_source(PipelineFailure::PingFailure, message, err))
            }
        }
    }

    async fn sniff_once(&self, auditor: &Auditor) -> Result<()> {
        if !self.pool.supports_reseeding() || !self.registration.supports_sniff() {
            return Err(TransportError::pipeline(PipelineFailure::SniffFailure, "sniffing not supported by this pool"));
        }
        let candidates = self.registration.sniff_order(&self.pool.nodes());
        let mut last_err: Option<TransportError> = None;
        for node in &candidates {
            match self
                .registration
                .sniff(self.invoker.as_ref(), self.pool.using_ssl(), node, &self.bound_config)
                .await
            {
                Ok((_, new_nodes)) => {
                    self.pool.reseed(new_nodes);
                    auditor.record(AuditEvent::SniffSuccess, Some(&node.uri().to_string()), None, None);
                    return Ok(());
                }
                Err(err) => {
                    auditor.record(AuditEvent::SniffFailure, Some(&node.uri().to_string()), None, Some(err.to_string()));
                    last_err = Some(err);
                }
            }
        }
        auditor.record(AuditEvent::SniffOnFail, None, None, None);
        Err(TransportError::pipeline_with_source(
            PipelineFailure::SniffFailure,
            "all sniff candidates failed",
            last_err.unwrap_or_else(|| TransportError::Unexpected("no sniff candidates".to_string())),
        ))
    }

    /// Fast path for a pool that holds exactly one node: skip the
    /// ping/sniff/iterate machinery entirely and call it directly. A failure
    /// whose message looks like a stale pooled connection getting reused
    /// (`Received an invalid status line:`, the signature of a keep-alive
    /// connection the server already closed) is retried once on the same
    /// node before giving up.
    #[allow(clippy::too_many_arguments)]
    async fn single_node_fast_path<T: DeserializeOwned>(
        &self,
        node: Arc<Node>,
        method: http::Method,
        path_and_query: &str,
        body: Option<Bytes>,
        shape: Option<ResponseShape>,
        auditor: Auditor,
        started: Instant,
    ) -> Result<Response<T>> {
        let mut retried: u32 = 0;
        let mut stale_retry_used = false;
        let last_error;
        let mut endpoint;

        loop {
            let (ep, outcome) = self
                .call_product_endpoint::<T>(&node, method.clone(), path_and_query, body.clone(), shape, &auditor)
                .await;
            endpoint = ep;

            match outcome {
                Ok(response) if response.details.success_or_known_error() => {
                    node.mark_alive();
                    return self.finalize_success(response, auditor);
                }
                Ok(response) => {
                    node.mark_dead(self.clock.now(), self.bound_config.dead_timeout, self.bound_config.max_dead_timeout);
                    retried += 1;
                    let reason = if response.details.http_status_code.is_some() {
                        PipelineFailure::BadResponse
                    } else {
                        PipelineFailure::BadRequest
                    };
                    let mut message = format!("unexpected response status {:?}", response.details.http_status_code);
                    if let Some(server_reason) = &response.details.server_error_reason {
                        message.push_str(&format!(": {server_reason}"));
                    }
                    last_error = Some(TransportError::pipeline(reason, message));
                    break;
                }
                Err(err) if !err.is_recoverable() => {
                    last_error = Some(err);
                    break;
                }
                Err(err) => {
                    let is_stale_connection = err.to_string().contains("Received an invalid status line:");
                    node.mark_dead(self.clock.now(), self.bound_config.dead_timeout, self.bound_config.max_dead_timeout);
                    if is_stale_connection && !stale_retry_used && !self.is_taking_too_long(started) {
                        stale_retry_used = true;
                        continue;
                    }
                    last_error = Some(err);
                    retried += 1;
                    break;
                }
            }
        }

        self.finalize_failure(endpoint, last_error, retried, started, auditor)
    }

    async fn call_product_endpoint<T: DeserializeOwned>(
        &self,
        node: &Arc<Node>,
        method: http::Method,
        path_and_query: &str,
        body: Option<Bytes>,
        shape: Option<ResponseShape>,
        auditor: &Auditor,
    ) -> (Endpoint, Result<Response<T>>) {
        let endpoint = Endpoint::new(method, path_and_query, Arc::clone(node));

        let raw = match self.invoker.request(&endpoint, &self.bound_config, body).await {
            Ok(raw) => raw,
            Err(err) => {
                let message = err.to_string();
                auditor.record(
                    AuditEvent::BadRequest,
                    Some(&node.uri().to_string()),
                    Some(endpoint.path_and_query()),
                    Some(message.clone()),
                );
                return (endpoint, Err(TransportError::pipeline_with_source(PipelineFailure::BadRequest, message, err)));
            }
        };

        let response: Response<T> = match self.builder.build(shape, raw, &endpoint, &self.bound_config, self.registration.as_ref()) {
            Ok(r) => r,
            Err(err) => {
                let message = err.to_string();
                auditor.record(
                    AuditEvent::BadResponse,
                    Some(&node.uri().to_string()),
                    Some(endpoint.path_and_query()),
                    Some(message.clone()),
                );
                return (endpoint, Err(TransportError::pipeline_with_source(PipelineFailure::BadResponse, message, err)));
            }
        };

        if response.details.http_status_code == Some(401) {
            auditor.record(AuditEvent::BadResponse, Some(&node.uri().to_string()), Some(endpoint.path_and_query()), None);
            return (
                endpoint,
                Err(TransportError::pipeline(PipelineFailure::BadAuthentication, "authentication failed (401)")),
            );
        }

        if response.details.has_successful_status_code_and_expected_content_type() {
            auditor.record(AuditEvent::HealthyResponse, Some(&node.uri().to_string()), Some(endpoint.path_and_query()), None);
        } else {
            let event = if response.details.http_status_code.is_some() {
                AuditEvent::BadResponse
            } else {
                AuditEvent::BadRequest
            };
            auditor.record(
                event,
                Some(&node.uri().to_string()),
                Some(endpoint.path_and_query()),
                response.details.server_error_reason.clone(),
            );
        }

        (endpoint, Ok(response))
    }

    fn finalize_success<T>(&self, mut response: Response<T>, auditor: Auditor) -> Result<Response<T>> {
        response.details.audit_trail = auditor.entries();
        if let Some(callback) = &self.on_request_completed {
            callback(&response.details);
        }
        Ok(response)
    }

    fn finalize_failure<T>(
        &self,
        endpoint: Endpoint,
        error: Option<TransportError>,
        retried: u32,
        started: Instant,
        auditor: Auditor,
    ) -> Result<Response<T>> {
        let max_retries = self.bound_config.max_retries(self.pool.max_retries());
        let reason = if endpoint.is_empty() {
            PipelineFailure::NoNodesAttempted
        } else if self.is_taking_too_long(started) {
            PipelineFailure::MaxTimeoutReached
        } else if retried > max_retries {
            PipelineFailure::MaxRetriesReached
        } else {
            error.as_ref().and_then(TransportError::reason).unwrap_or(PipelineFailure::Unexpected)
        };

        if let Some(event) = AuditEvent::from_pipeline_failure(reason) {
            auditor.record(
                event,
                endpoint.node().map(|n| n.uri().to_string()).as_deref(),
                Some(endpoint.path_and_query()),
                None,
            );
        }

        let mut message = reason.to_string();
        if let Some(uri) = endpoint.uri() {
            message.push_str(&format!(" calling {uri}"));
        }

        let audit_trail = auditor.entries();
        let details = ApiCallDetails {
            uri: endpoint.uri(),
            method: endpoint.method().clone(),
            http_status_code: None,
            has_successful_status_code: false,
            has_expected_content_type: false,
            request_body_bytes: None,
            response_body_bytes: None,
            response_mime_type: None,
            parsed_headers: None,
            audit_trail: audit_trail.clone(),
            tcp_stats: None,
            thread_pool_stats: None,
            server_error_reason: None,
            original_exception: None,
            deserialization_time: None,
        };
        if let Some(callback) = &self.on_request_completed {
            callback(&details);
        }

        let source = error.unwrap_or_else(|| TransportError::Unexpected("no nodes were attempted".to_string()));
        let final_error = TransportError::pipeline_with_source(reason, message, source);

        if self.bound_config.throw_exceptions {
            Err(final_error)
        } else {
            Ok(Response {
                body: ResponseBody::None,
                details: ApiCallDetails {
                    original_exception: Some(Arc::new(final_error)),
                    audit_trail,
                    ..details
                },
            })
        }
    }

    /// Build the terminal response for a cooperative cancellation raised while
    /// this pipeline's request was in flight: audits `CancellationRequested`
    /// and respects `throwExceptions` like any other pipeline failure.
    pub fn cancelled<T>(&self, method: http::Method, path_and_query: &str) -> Result<Response<T>> {
        let auditor = Auditor::new(self.clock.clone());
        let endpoint = Endpoint::empty(method, path_and_query);
        auditor.record(AuditEvent::CancellationRequested, None, Some(endpoint.path_and_query()), None);

        let reason = PipelineFailure::Cancelled;
        let message = format!("{reason} calling {path_and_query}");
        let audit_trail = auditor.entries();
        let details = ApiCallDetails {
            uri: endpoint.uri(),
            method: endpoint.method().clone(),
            http_status_code: None,
            has_successful_status_code: false,
            has_expected_content_type: false,
            request_body_bytes: None,
            response_body_bytes: None,
            response_mime_type: None,
            parsed_headers: None,
            audit_trail: audit_trail.clone(),
            tcp_stats: None,
            thread_pool_stats: None,
            server_error_reason: None,
            original_exception: None,
            deserialization_time: None,
        };
        if let Some(callback) = &self.on_request_completed {
            callback(&details);
        }

        let final_error = TransportError::pipeline(reason, message);

        if self.bound_config.throw_exceptions {
            Err(final_error)
        } else {
            Ok(Response {
                body: ResponseBody::None,
                details: ApiCallDetails {
                    original_exception: Some(Arc::new(final_error)),
                    audit_trail,
                    ..details
                },
            })
        }
    }

    fn sniffs_on_stale_cluster(&self) -> bool {
        self.bound_config.sniff_information_life_span.is_some()
            && self.pool.supports_reseeding()
            && !self.bound_config.disable_sniff
    }

    fn sniffs_on_connection_fault(&self) -> bool {
        self.bound_config.sniffs_on_connection_fault && self.pool.supports_reseeding() && !self.bound_config.disable_sniff
    }

    fn stale_cluster_state(&self) -> bool {
        match self.bound_config.sniff_information_life_span {
            Some(life_span) => self.clock.now().saturating_duration_since(self.pool.last_update()) > life_span,
            None => false,
        }
    }

    fn is_taking_too_long(&self, started: Instant) -> bool {
        let timeout = self.bound_config.max_retry_timeout;
        let elapsed = self.clock.now().saturating_duration_since(started);
        elapsed >= timeout.mul_f64(0.98)
    }

    fn depleted_retries(&self, retried: u32, started: Instant) -> bool {
        let max_retries = self.bound_config.max_retries(self.pool.max_retries());
        retried > max_retries || self.is_taking_too_long(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::{BoundConfiguration, Configuration};
    use crate::invoker::RawResponse;
    use crate::node::NodeUri;
    use crate::pool::{SingleNodePool, StaticNodePool};
    use crate::product::ElasticsearchRegistration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct ScriptedInvoker {
        responses: Mutex<std::collections::HashMap<String, Vec<Result<RawResponse>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedInvoker {
        fn respond(&self, port: u16, outcomes: Vec<Result<RawResponse>>) {
            self.responses.lock().unwrap().insert(port.to_string(), outcomes);
        }
    }

    #[async_trait::async_trait]
    impl Invoker for ScriptedInvoker {
        async fn request(&self, endpoint: &Endpoint, _bound_config: &BoundConfiguration, _body: Option<Bytes>) -> Result<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let port = endpoint.node().and_then(|n| n.uri().port()).unwrap_or(0).to_string();
            let mut guard = self.responses.lock().unwrap();
            let queue = guard.entry(port).or_default();
            if queue.is_empty() {
                return Ok(RawResponse {
                    status_code: Some(200),
                    mime_type: Some("application/json".to_string()),
                    body: Bytes::from_static(b"{}"),
                    ..Default::default()
                });
            }
            queue.remove(0)
        }
    }

    fn node(uri: &str) -> Arc<Node> {
        Arc::new(Node::new(NodeUri::parse(uri).unwrap()))
    }

    fn bound(config: Configuration) -> Arc<BoundConfiguration> {
        BoundConfiguration::bind(&config, None, None)
    }

    fn ok_json(body: &'static str) -> Result<RawResponse> {
        Ok(RawResponse {
            status_code: Some(200),
            mime_type: Some("application/json".to_string()),
            body: Bytes::from_static(body.as_bytes()),
            ..Default::default()
        })
    }

    fn bad_status(code: u16) -> Result<RawResponse> {
        Ok(RawResponse {
            status_code: Some(code),
            mime_type: Some("application/json".to_string()),
            body: Bytes::from_static(b"{}"),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn single_node_success_marks_alive_and_audits_healthy_response() {
        let pool: Arc<dyn NodePool> = Arc::new(SingleNodePool::new(node("http://localhost:9200")));
        let invoker: Arc<dyn Invoker> = Arc::new(ScriptedInvoker::default());
        let pipeline = RequestPipeline::new(
            pool,
            Arc::new(ElasticsearchRegistration),
            invoker,
            MockClock::new(),
            bound(Configuration::new()),
            Arc::new(Semaphore::new(1)),
        );
        let response: Response<serde_json::Value> = pipeline
            .execute(http::Method::GET, "/", None, Some(ResponseShape::Dynamic))
            .await
            .unwrap();
        assert!(response.is_success());
        assert!(response.details.audit_trail.iter().any(|e| e.event == AuditEvent::HealthyResponse));
    }

    #[tokio::test]
    async fn failover_on_bad_response_then_success() {
        let pool: Arc<dyn NodePool> = Arc::new(StaticNodePool::new(vec![node("http://localhost:9200"), node("http://localhost:9201")]));
        let invoker = Arc::new(ScriptedInvoker::default());
        invoker.respond(9200, vec![bad_status(502)]);
        invoker.respond(9201, vec![ok_json("{}")]);
        let pipeline = RequestPipeline::new(
            pool,
            Arc::new(ElasticsearchRegistration),
            invoker,
            MockClock::new(),
            bound(Configuration::new().with_disable_pings(true)),
            Arc::new(Semaphore::new(1)),
        );
        let response: Response<serde_json::Value> = pipeline
            .execute(http::Method::GET, "/", None, Some(ResponseShape::Dynamic))
            .await
            .unwrap();
        assert!(response.is_success());
        let events: Vec<_> = response.details.audit_trail.iter().map(|e| e.event).collect();
        assert!(events.contains(&AuditEvent::BadResponse));
        assert!(events.contains(&AuditEvent::HealthyResponse));
    }

    #[tokio::test]
    async fn bad_authentication_halts_immediately_without_retry() {
        let pool: Arc<dyn NodePool> = Arc::new(StaticNodePool::new(vec![node("http://localhost:9200"), node("http://localhost:9201")]));
        let invoker = Arc::new(ScriptedInvoker::default());
        invoker.respond(9200, vec![bad_status(401)]);
        invoker.respond(9201, vec![bad_status(401)]);
        let pipeline = RequestPipeline::new(
            pool,
            Arc::new(ElasticsearchRegistration),
            invoker.clone(),
            MockClock::new(),
            bound(Configuration::new().with_disable_pings(true).with_throw_exceptions(true)),
            Arc::new(Semaphore::new(1)),
        );
        let err = pipeline
            .execute::<serde_json::Value>(http::Method::GET, "/", None, Some(ResponseShape::Dynamic))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(PipelineFailure::BadAuthentication));
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_node_bypasses_retries_and_sniff() {
        let forced = NodeUri::parse("http://localhost:9200").unwrap();
        let pool: Arc<dyn NodePool> = Arc::new(StaticNodePool::new(vec![node("http://localhost:9200"), node("http://localhost:9201")]));
        let invoker = Arc::new(ScriptedInvoker::default());
        invoker.respond(9200, vec![bad_status(502)]);
        let pipeline = RequestPipeline::new(
            pool,
            Arc::new(ElasticsearchRegistration),
            invoker.clone(),
            MockClock::new(),
            bound(Configuration::new().with_force_node(forced).with_disable_pings(true)),
            Arc::new(Semaphore::new(1)),
        );
        let response: Response<serde_json::Value> = pipeline
            .execute(http::Method::GET, "/", None, Some(ResponseShape::Dynamic))
            .await
            .unwrap();
        assert!(!response.is_success());
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn max_retries_reached_when_every_node_fails() {
        let pool: Arc<dyn NodePool> = Arc::new(StaticNodePool::new(vec![node("http://localhost:9200"), node("http://localhost:9201")]));
        let invoker = Arc::new(ScriptedInvoker::default());
        invoker.respond(9200, vec![bad_status(502)]);
        invoker.respond(9201, vec![bad_status(502)]);
        let pipeline = RequestPipeline::new(
            pool,
            Arc::new(ElasticsearchRegistration),
            invoker,
            MockClock::new(),
            bound(Configuration::new().with_disable_pings(true).with_disable_sniff(true)),
            Arc::new(Semaphore::new(1)),
        );
        let response: Response<serde_json::Value> = pipeline
            .execute(http::Method::GET, "/", None, Some(ResponseShape::Dynamic))
            .await
            .unwrap();
        assert!(!response.is_success());
        assert_eq!(
            response.details.original_exception.as_ref().and_then(|e| e.reason()),
            Some(PipelineFailure::MaxRetriesReached)
        );
    }
}
