// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `Invoker` capability: executes one HTTP call and returns a `RawResponse`.
//!
//! The core never talks sockets directly; it is out of scope per the crate's
//! design (see the module-level docs on [`crate`]). [`HttpInvoker`] is the one
//! concrete implementation shipped so the crate is usable out of the box;
//! [`crate::testkit::VirtualCluster`] is the deterministic test double.

mod http_invoker;

pub use http_invoker::HttpInvoker;

use bytes::Bytes;
use http::HeaderMap;

use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::Result;

/// TCP-level diagnostics, collected only when `enableTcpStats` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpStats {
    pub connections_active: u32,
    pub connections_created: u64,
}

/// Thread/task-pool diagnostics, collected only when `enableThreadPoolStats` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadPoolStats {
    pub busy: u32,
    pub queued: u32,
}

/// The raw, untyped result of one HTTP turn-around (or the synthesized
/// equivalent for a failed attempt that never got a status code).
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status_code: Option<u16>,
    pub headers: Option<HeaderMap>,
    pub body: Bytes,
    pub mime_type: Option<String>,
    pub content_length: Option<u64>,
    pub tcp_stats: Option<TcpStats>,
    pub thread_pool_stats: Option<ThreadPoolStats>,
}

impl RawResponse {
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Executes one HTTP call; returns a [`RawResponse`] or an error recognized by
/// the pipeline (`ConnectError`/`TimeoutError`-equivalent, classified
/// recoverable per the error taxonomy).
#[async_trait::async_trait]
pub trait Invoker: Send + Sync + std::fmt::Debug {
    async fn request(
        &self,
        endpoint: &Endpoint,
        bound_config: &BoundConfiguration,
        body: Option<Bytes>,
    ) -> Result<RawResponse>;

    /// Build a [`RawResponse`] for an error path where no HTTP turn-around
    /// completed (e.g. a connection refusal before any bytes were read).
    fn synthesize_error_response(&self, _endpoint: &Endpoint) -> RawResponse {
        RawResponse::default()
    }
}
