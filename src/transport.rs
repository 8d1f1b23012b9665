// SPDX-License-Identifier: MIT OR Apache-2.0

//! `Transport`: the orchestrator that binds a [`Configuration`], a node pool,
//! and a product registration into a reusable request surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::{Notify, Semaphore};

use crate::clock::{system_clock, SharedClock};
use crate::config::{BoundConfiguration, Configuration, RequestOverlay};
use crate::error::Result;
use crate::invoker::{HttpInvoker, Invoker};
use crate::pipeline::{RequestCompletedCallback, RequestPipeline};
use crate::pool::NodePool;
use crate::product::{ElasticsearchRegistration, ProductRegistration};
use crate::response::{Response, ResponseShape};
use crate::runtime::tracing::SpanFactory;

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cooperative cancellation handle: clone it to hand a waiter a copy, call
/// [`CancellationSignal::cancel`] from anywhere to wake every waiter,
/// including ones that haven't started waiting yet.
#[derive(Debug, Clone)]
pub struct CancellationSignal(Arc<CancellationState>);

impl CancellationSignal {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(CancellationState::default()))
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub async fn cancelled(&self) {
        if self.0.cancelled.load(Ordering::SeqCst) {
            return;
        }
        self.0.notify.notified().await;
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds a [`Configuration`], a [`NodePool`], a [`ProductRegistration`], and an
/// [`Invoker`] into a single reusable request surface.
///
/// Caches the default (no-overlay) [`BoundConfiguration`] so that the common
/// case of repeated, option-free requests never re-runs the merge in
/// [`BoundConfiguration::bind`].
pub struct Transport {
    configuration: Configuration,
    default_bound: Arc<BoundConfiguration>,
    pool: Arc<dyn NodePool>,
    registration: Arc<dyn ProductRegistration>,
    invoker: Arc<dyn Invoker>,
    clock: SharedClock,
    bootstrap: Arc<Semaphore>,
    span_factory: SpanFactory,
    on_request_completed: Option<RequestCompletedCallback>,
}

impl Transport {
    /// Build a transport against `pool`, using the default Elasticsearch
    /// product registration and the bundled `reqwest`-backed invoker.
    #[must_use]
    pub fn new(configuration: Configuration, pool: Arc<dyn NodePool>) -> Self {
        Self::with_registration_and_invoker(
            configuration,
            pool,
            Arc::new(ElasticsearchRegistration),
            Arc::new(HttpInvoker::new()),
        )
    }

    #[must_use]
    pub fn with_registration_and_invoker(
        configuration: Configuration,
        pool: Arc<dyn NodePool>,
        registration: Arc<dyn ProductRegistration>,
        invoker: Arc<dyn Invoker>,
    ) -> Self {
        let default_bound = BoundConfiguration::bind(&configuration, None, pool.authorization_header().as_deref());
        Self {
            configuration,
            default_bound,
            pool,
            registration,
            invoker,
            clock: system_clock(),
            bootstrap: Arc::new(Semaphore::new(1)),
            span_factory: SpanFactory::default(),
            on_request_completed: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_on_request_completed(mut self, callback: RequestCompletedCallback) -> Self {
        self.on_request_completed = Some(callback);
        self
    }

    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<dyn NodePool> {
        &self.pool
    }

    /// Resolve the effective [`BoundConfiguration`] for a request: the cached
    /// default when no overlay is given, a fresh merge otherwise.
    fn bind(&self, overlay: Option<&RequestOverlay>) -> Arc<BoundConfiguration> {
        match overlay {
            None => Arc::clone(&self.default_bound),
            Some(overlay) => {
                BoundConfiguration::bind(&self.configuration, Some(overlay), self.pool.authorization_header().as_deref())
            }
        }
    }

    /// Issue one request, honoring an optional per-request overlay and
    /// cooperative cancellation signal.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: http::Method,
        path_and_query: &str,
        body: Option<Bytes>,
        overlay: Option<&RequestOverlay>,
        shape: Option<ResponseShape>,
        cancel: Option<CancellationSignal>,
    ) -> Result<Response<T>> {
        let bound_config = self.bind(overlay);
        let server_address = bound_config
            .force_node
            .as_ref()
            .and_then(|uri| uri.as_url().host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        let span = self
            .span_factory
            .create_span(method.as_str(), &server_address, 0, path_and_query);

        let mut pipeline = RequestPipeline::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.registration),
            Arc::clone(&self.invoker),
            Arc::clone(&self.clock),
            bound_config,
            Arc::clone(&self.bootstrap),
        );
        if let Some(callback) = self.on_request_completed.clone() {
            pipeline = pipeline.with_on_request_completed(callback);
        }

        let attempt = pipeline.execute::<T>(method.clone(), path_and_query, body, shape);
        let result = match cancel {
            Some(signal) => {
                tokio::select! {
                    result = attempt => result,
                    () = signal.cancelled() => pipeline.cancelled(method, path_and_query),
                }
            }
            None => attempt.await,
        };

        match &result {
            Ok(response) => span.record_success(response.details.http_status_code.unwrap_or(0), span.elapsed()),
            Err(err) => span.record_error(&err.to_string()),
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<Response<T>> {
        self.request(http::Method::GET, path_and_query, None, None, None, None).await
    }

    pub async fn head<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<Response<T>> {
        self.request(http::Method::HEAD, path_and_query, None, None, Some(ResponseShape::Void), None)
            .await
    }

    pub async fn post<T: DeserializeOwned>(&self, path_and_query: &str, body: Bytes) -> Result<Response<T>> {
        self.request(http::Method::POST, path_and_query, Some(body), None, None, None).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path_and_query: &str, body: Bytes) -> Result<Response<T>> {
        self.request(http::Method::PUT, path_and_query, Some(body), None, None, None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<Response<T>> {
        self.request(http::Method::DELETE, path_and_query, None, None, None, None).await
    }
}
