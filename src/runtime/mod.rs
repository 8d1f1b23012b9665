// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime utilities for resilience and observability.
//!
//! This module provides ambient, opt-in features — retry policies, a
//! whole-transport circuit breaker, request logging, tracing spans, and
//! Prometheus-style metrics — that sit alongside, not inside, the core
//! pipeline's own node-level dead/alive tracking and failover loop.

mod circuit_breaker;
mod logging;
pub mod metrics;
mod retry;
pub mod tracing;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use logging::{
    InterceptorMetrics, LogLevel, LoggingConfig, LoggingInterceptor, RequestLogger, RequestSpan,
};
pub use metrics::{MetricsCollector, MetricsConfig};
pub use retry::{
    BackoffStrategy, DefaultRetryPolicy, ExponentialBackoff, FixedBackoff, LinearBackoff,
    NoBackoff, NoRetryPolicy, RetryConfig, RetryConfigBuilder, RetryPolicy,
};
pub use tracing::{HttpSpan, SpanFactory, TracingConfig};
