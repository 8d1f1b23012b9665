// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `ProductRegistration` capability: product-specific policy consumed by
//! the pipeline (endpoint construction, status classification, error extraction).

mod elasticsearch;

pub use elasticsearch::ElasticsearchRegistration;

use std::sync::Arc;

use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::invoker::{Invoker, RawResponse};
use crate::node::Node;
use crate::response::ResponseBuilderHook;

/// Product-specific knowledge the core consumes without understanding: how to
/// build sniff/ping endpoints, how to classify a status code as success, and
/// how to extract a human-readable server error reason.
#[async_trait::async_trait]
pub trait ProductRegistration: Send + Sync + std::fmt::Debug {
    /// The HEAD-like endpoint used to verify a node is reachable.
    fn ping_endpoint(&self, node: &Arc<Node>) -> Endpoint;

    /// The endpoint used to discover cluster topology from `node`.
    fn sniff_endpoint(&self, node: &Arc<Node>) -> Endpoint;

    /// The order in which candidate nodes should be tried for sniffing.
    fn sniff_order(&self, nodes: &[Arc<Node>]) -> Vec<Arc<Node>> {
        nodes.to_vec()
    }

    /// Perform one sniff attempt against `node`, returning the new node set on success.
    async fn sniff(
        &self,
        invoker: &dyn Invoker,
        using_ssl: bool,
        node: &Arc<Node>,
        bound_config: &BoundConfiguration,
    ) -> Result<(RawResponse, Vec<Arc<Node>>)>;

    /// Whether `statusCode` counts as success for `method`, beyond the
    /// `allowedStatusCodes` override the bound configuration already checked.
    fn status_code_classifier(&self, method: &http::Method, status_code: u16) -> bool;

    /// Best-effort extraction of a server-provided error reason from a failing response.
    fn try_get_server_error_reason(&self, response: &RawResponse) -> Option<String>;

    /// Whether this product supports the ping protocol at all.
    fn supports_ping(&self) -> bool {
        true
    }

    /// Whether this product supports the sniff protocol at all.
    fn supports_sniff(&self) -> bool {
        true
    }

    /// Product-provided response builder hooks, consulted last in the chain
    /// (after any request-local and global ones).
    fn response_builders(&self) -> Vec<Arc<dyn ResponseBuilderHook>> {
        Vec::new()
    }
}
