// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenTelemetry-flavored tracing spans for outgoing HTTP requests.
//!
//! # Overview
//!
//! The tracing integration supports:
//! - Span creation for each HTTP request attempt
//! - Request/response attributes following OTel HTTP semantic conventions
//! - Error tracking
//!
//! # Usage with `tracing` Crate
//!
//! This module integrates with the standard Rust `tracing` ecosystem. To
//! export to an OpenTelemetry backend, configure an OTLP exporter and layer
//! it onto a `tracing_subscriber::registry()` as usual; this crate only
//! depends on `tracing` itself.
//!
//! # Example: Manual Span Creation
//!
//! ```
//! use elastic_transport_rs::runtime::tracing::HttpSpan;
//! use std::time::Duration;
//!
//! let span = HttpSpan::new("GET", "localhost", 9200, "/_cluster/health");
//! span.record_success(200, Duration::from_millis(42));
//! ```
//!
//! # Semantic Conventions
//!
//! Spans follow OpenTelemetry's HTTP semantic conventions:
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `http.request.method` | HTTP verb, e.g. "GET" |
//! | `server.address` | Target node hostname |
//! | `server.port` | Target node port |
//! | `url.full` | Full request URI |
//! | `user_agent.original` | Client user agent string |
//! | `http.response.status_code` | Response status code |

use std::time::{Duration, Instant};

use tracing::{field, info_span, Span};

/// Configuration for tracing span creation.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to spans.
    pub service_name: String,
    /// Whether to record request payloads (may contain sensitive data).
    pub record_payloads: bool,
    /// Whether to record response payloads.
    pub record_responses: bool,
    /// Maximum payload size to record (in bytes).
    pub max_payload_size: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "elastic-transport".to_string(),
            record_payloads: false,
            record_responses: false,
            max_payload_size: 4096,
        }
    }
}

impl TracingConfig {
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::default()
    }
}

/// Builder for [`TracingConfig`].
#[derive(Debug, Default)]
pub struct TracingConfigBuilder {
    service_name: Option<String>,
    record_payloads: Option<bool>,
    record_responses: Option<bool>,
    max_payload_size: Option<usize>,
}

impl TracingConfigBuilder {
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn record_payloads(mut self, enabled: bool) -> Self {
        self.record_payloads = Some(enabled);
        self
    }

    pub fn record_responses(mut self, enabled: bool) -> Self {
        self.record_responses = Some(enabled);
        self
    }

    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = Some(size);
        self
    }

    pub fn build(self) -> TracingConfig {
        let default = TracingConfig::default();
        TracingConfig {
            service_name: self.service_name.unwrap_or(default.service_name),
            record_payloads: self.record_payloads.unwrap_or(default.record_payloads),
            record_responses: self.record_responses.unwrap_or(default.record_responses),
            max_payload_size: self.max_payload_size.unwrap_or(default.max_payload_size),
        }
    }
}

/// A span for a single HTTP request attempt, carrying OTel HTTP attributes.
#[derive(Debug)]
pub struct HttpSpan {
    span: Span,
    start: Instant,
    method: String,
    server_address: String,
    server_port: u16,
}

impl HttpSpan {
    /// Create a new span for an outgoing request.
    ///
    /// ```
    /// use elastic_transport_rs::runtime::tracing::HttpSpan;
    /// let span = HttpSpan::new("HEAD", "localhost", 9200, "/");
    /// ```
    pub fn new(method: &str, server_address: &str, server_port: u16, path_and_query: &str) -> Self {
        let url_full = format!("http://{server_address}:{server_port}{path_and_query}");
        let span = info_span!(
            "elastic_transport.request",
            http.request.method = %method,
            server.address = %server_address,
            server.port = server_port,
            url.full = %url_full,
            user_agent.original = field::Empty,
            http.response.status_code = field::Empty,
            otel.status_code = field::Empty,
            error.message = field::Empty,
            duration_ms = field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            method: method.to_string(),
            server_address: server_address.to_string(),
            server_port,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record a completed request that received an HTTP status code.
    pub fn record_success(&self, status_code: u16, duration: Duration) {
        self.span.record("http.response.status_code", status_code);
        self.span.record("otel.status_code", "OK");
        self.span.record("duration_ms", duration.as_millis() as i64);
    }

    /// Record a failed request attempt (no status code, a connection/timeout error).
    pub fn record_error(&self, error: &str) {
        let duration = self.start.elapsed();
        self.span.record("otel.status_code", "ERROR");
        self.span.record("error.message", error);
        self.span.record("duration_ms", duration.as_millis() as i64);
    }

    /// Enter the span context for async work.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Helper macro for instrumenting an HTTP call with a span.
///
/// ```
/// use elastic_transport_rs::instrument_request;
///
/// # fn call() -> Result<u16, String> { Ok(200) }
/// let result: Result<u16, String> = instrument_request!("GET", "localhost", 9200, "/", {
///     call()
/// });
/// ```
#[macro_export]
macro_rules! instrument_request {
    ($method:expr, $server_address:expr, $server_port:expr, $path:expr, $body:expr) => {{
        let span = $crate::runtime::tracing::HttpSpan::new($method, $server_address, $server_port, $path);
        let _guard = span.enter();
        let start = std::time::Instant::now();
        let result = $body;
        let duration = start.elapsed();
        match &result {
            Ok(_) => span.record_success(200, duration),
            Err(e) => span.record_error(&format!("{}", e)),
        }
        result
    }};
}

/// Span factory producing consistently-attributed spans.
#[derive(Debug, Clone)]
pub struct SpanFactory {
    config: TracingConfig,
}

impl SpanFactory {
    pub fn new(config: TracingConfig) -> Self {
        Self { config }
    }

    pub fn create_span(
        &self,
        method: &str,
        server_address: &str,
        server_port: u16,
        path_and_query: &str,
    ) -> HttpSpan {
        HttpSpan::new(method, server_address, server_port, path_and_query)
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }
}

impl Default for SpanFactory {
    fn default() -> Self {
        Self::new(TracingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "elastic-transport");
        assert!(!config.record_payloads);
        assert!(!config.record_responses);
        assert_eq!(config.max_payload_size, 4096);
    }

    #[test]
    fn test_tracing_config_builder() {
        let config = TracingConfig::builder()
            .service_name("my-service")
            .record_payloads(true)
            .record_responses(true)
            .max_payload_size(8192)
            .build();

        assert_eq!(config.service_name, "my-service");
        assert!(config.record_payloads);
        assert!(config.record_responses);
        assert_eq!(config.max_payload_size, 8192);
    }

    #[test]
    fn test_http_span_new() {
        let span = HttpSpan::new("GET", "10.0.0.1", 9200, "/_cluster/health");
        assert_eq!(span.method(), "GET");
        assert_eq!(span.server_address(), "10.0.0.1");
        assert_eq!(span.server_port(), 9200);
    }

    #[test]
    fn test_http_span_record_success() {
        let span = HttpSpan::new("GET", "10.0.0.1", 9200, "/");
        span.record_success(200, Duration::from_millis(42));
    }

    #[test]
    fn test_http_span_record_error() {
        let span = HttpSpan::new("GET", "10.0.0.1", 9200, "/");
        span.record_error("connection refused");
    }

    #[test]
    fn test_span_factory_new() {
        let config = TracingConfig::builder().service_name("test-service").build();
        let factory = SpanFactory::new(config);
        assert_eq!(factory.config().service_name, "test-service");
    }

    #[test]
    fn test_span_factory_create_span() {
        let factory = SpanFactory::default();
        let span = factory.create_span("HEAD", "10.0.0.1", 9200, "/");
        assert_eq!(span.method(), "HEAD");
    }

    #[test]
    fn test_http_span_elapsed() {
        let span = HttpSpan::new("GET", "10.0.0.1", 9200, "/");
        std::thread::sleep(Duration::from_millis(10));
        assert!(span.elapsed() >= Duration::from_millis(10));
    }
}
