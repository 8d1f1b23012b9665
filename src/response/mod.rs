// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning a `RawResponse` into a typed response: status classification,
//! content-type validation, and body materialization.

mod builder;

pub use builder::{ErrorDeserializer, ResponseBuilder, ResponseBuilderHook};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::error::TransportError;
use crate::invoker::{TcpStats, ThreadPoolStats};
use crate::pipeline::audit::AuditEntry;

/// Which well-known shape a response body should be materialized into.
///
/// `None` means a product-specific typed response (the generic JSON
/// deserialization path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    String,
    Bytes,
    Void,
    Stream,
    Dynamic,
}

/// The tagged variant described by the design notes: either one of the
/// well-known shapes, a generically-deserialized typed body, or nothing
/// (deserialization skipped).
#[derive(Debug)]
pub enum ResponseBody<T> {
    String(String),
    Bytes(Bytes),
    Void,
    /// Simplified stream ownership: the materialized bytes, handed to the
    /// caller as a `leaveOpen=true` cursor-backed reader.
    Stream(Bytes),
    Dynamic(serde_json::Value),
    Typed(T),
    None,
}

/// Bag of metadata attached to every response, success or failure.
#[derive(Debug, Clone)]
pub struct ApiCallDetails {
    pub uri: Option<String>,
    pub method: Method,
    pub http_status_code: Option<u16>,
    pub has_successful_status_code: bool,
    pub has_expected_content_type: bool,
    pub request_body_bytes: Option<usize>,
    pub response_body_bytes: Option<Bytes>,
    pub response_mime_type: Option<String>,
    pub parsed_headers: Option<HeaderMap>,
    pub audit_trail: Vec<AuditEntry>,
    pub tcp_stats: Option<TcpStats>,
    pub thread_pool_stats: Option<ThreadPoolStats>,
    pub server_error_reason: Option<String>,
    pub original_exception: Option<Arc<TransportError>>,
    pub deserialization_time: Option<Duration>,
}

impl ApiCallDetails {
    /// `hasSuccessfulStatusCode ∧ hasExpectedContentType`.
    #[must_use]
    pub fn has_successful_status_code_and_expected_content_type(&self) -> bool {
        self.has_successful_status_code && self.has_expected_content_type
    }

    /// Success OR a "known" non-success status that must not trigger failover:
    /// a 4xx that isn't 401/408/429 and didn't come from a connection-level error.
    #[must_use]
    pub fn success_or_known_error(&self) -> bool {
        if self.has_successful_status_code {
            return true;
        }
        if self.original_exception.is_some() {
            return false;
        }
        matches!(self.http_status_code, Some(code) if (400..500).contains(&code) && ![401, 408, 429].contains(&code))
    }
}

/// A typed response: the materialized body plus its [`ApiCallDetails`].
#[derive(Debug)]
pub struct Response<T> {
    pub body: ResponseBody<T>,
    pub details: ApiCallDetails,
}

impl<T> Response<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.details.has_successful_status_code
    }
}
