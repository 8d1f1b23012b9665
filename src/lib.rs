// SPDX-License-Identifier: MIT OR Apache-2.0

//! # elastic-transport-rs
//!
//! A cluster-aware, resilient HTTP transport core for the Elastic product
//! suite: node pooling, sniffing, pinging, and failover, independent of any
//! particular product's request/response types.
//!
//! ## Features
//!
//! - **Cluster-aware** — sniffs cluster topology, fails over across nodes
//! - **Async-first** — built on `tokio` and `reqwest`
//! - **Pluggable** — swap the node pool, product registration, or invoker
//! - **Observable** — structured logging, OpenTelemetry-flavored tracing spans
//! - **Deterministic testing** — a virtual cluster invoker for rule-driven tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use elastic_transport_rs::config::Configuration;
//! use elastic_transport_rs::node::{Node, NodeUri};
//! use elastic_transport_rs::pool::SingleNodePool;
//! use elastic_transport_rs::transport::Transport;
//! use std::sync::Arc;
//!
//! # async fn example() -> elastic_transport_rs::error::Result<()> {
//! let node = Arc::new(Node::new(NodeUri::parse("http://localhost:9200").unwrap()));
//! let pool = Arc::new(SingleNodePool::new(node));
//! let transport = Transport::new(Configuration::new(), pool);
//!
//! let health: elastic_transport_rs::Response<serde_json::Value> =
//!     transport.get("/_cluster/health").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`transport`] — the request orchestrator
//! - [`pipeline`] — the core node-selection/failover state machine
//! - [`pool`] — node pool variants (single, static, sniffing, sticky, cloud)
//! - [`node`] — addressable endpoints and liveness tracking
//! - [`endpoint`] — the resolved method/path/node triple sent to an invoker
//! - [`product`] — product-specific policy (Elasticsearch by default)
//! - [`invoker`] — the HTTP call capability
//! - [`response`] — typed response construction
//! - [`config`] — configuration merge and on-disk config file
//! - [`clock`] — a mockable monotonic time source
//! - [`runtime`] — ambient resilience (retry, circuit breaker) and observability
//! - [`testkit`] — a deterministic, rule-driven invoker for tests
//! - [`error`] — error types
//!
//! ## Production Features
//!
//! ### Retry Policies
//!
//! ```rust
//! use elastic_transport_rs::runtime::{RetryConfig, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let retry = RetryConfig::builder()
//!     .max_retries(3)
//!     .backoff(ExponentialBackoff::new(Duration::from_millis(100)))
//!     .build();
//! ```
//!
//! ### Circuit Breaker
//!
//! ```rust
//! use elastic_transport_rs::runtime::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let cb = CircuitBreaker::new(
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_reset_timeout(Duration::from_secs(30))
//! );
//! ```
//!
//! ### Prometheus Metrics
//!
//! ```rust
//! use elastic_transport_rs::runtime::{MetricsCollector, MetricsConfig};
//!
//! let metrics = MetricsCollector::new(
//!     MetricsConfig::builder()
//!         .namespace("elastic_transport")
//!         .build()
//! );
//!
//! // Export Prometheus format
//! let output = metrics.to_prometheus_text();
//! ```
//!
//! ## Disclaimer
//!
//! This project is **NOT** affiliated with Elasticsearch B.V.
//! Provided AS-IS, without warranty of any kind.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod invoker;
pub mod node;
pub mod pipeline;
pub mod pool;
pub mod product;
pub mod response;
pub mod runtime;
pub mod testkit;
pub mod transport;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use config::{Authentication, BoundConfiguration, Configuration, RequestOverlay, TransportConfigFile};
pub use endpoint::Endpoint;
pub use error::{PipelineFailure, Result, TransportError};
pub use invoker::{HttpInvoker, Invoker, RawResponse};
pub use node::{Node, NodeUri};
pub use pipeline::{RequestCompletedCallback, RequestPipeline};
pub use pool::{CloudNodePool, NodePool, NodeView, SingleNodePool, SniffingNodePool, StaticNodePool, StickyNodePool, StickySniffingNodePool};
pub use product::{ElasticsearchRegistration, ProductRegistration};
pub use response::{
    ApiCallDetails, ErrorDeserializer, Response, ResponseBody, ResponseBuilder, ResponseBuilderHook, ResponseShape,
};
pub use runtime::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitState, DefaultRetryPolicy,
    ExponentialBackoff, FixedBackoff, InterceptorMetrics, LinearBackoff, LogLevel, LoggingConfig,
    LoggingInterceptor, MetricsCollector, MetricsConfig, NoBackoff, NoRetryPolicy, RequestLogger,
    RequestSpan, RetryConfig, RetryConfigBuilder, RetryPolicy,
};
pub use transport::{CancellationSignal, Transport};
