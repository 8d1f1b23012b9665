// SPDX-License-Identifier: MIT OR Apache-2.0

//! `(method, pathAndQuery, node)` triples addressed by the pipeline.

use std::sync::Arc;

use http::Method;

use crate::node::Node;

/// One candidate request target: an HTTP method, a path-and-query, and the
/// node it will be sent to.
///
/// [`Endpoint::empty`] represents "no node attempted yet" and is the
/// pipeline's starting state before any node has been yielded by the pool.
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: Method,
    path_and_query: String,
    node: Option<Arc<Node>>,
}

impl Endpoint {
    #[must_use]
    pub fn new(method: Method, path_and_query: impl Into<String>, node: Arc<Node>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            node: Some(node),
        }
    }

    /// The distinguished endpoint meaning "no node has been attempted yet".
    #[must_use]
    pub fn empty(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            node: None,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    #[must_use]
    pub fn node(&self) -> Option<&Arc<Node>> {
        self.node.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// The full request URI, or `None` for the empty endpoint.
    #[must_use]
    pub fn uri(&self) -> Option<String> {
        self.node.as_ref().map(|n| n.uri().with_path_and_query(&self.path_and_query))
    }
}
