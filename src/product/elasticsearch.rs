// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use http::Method;
use serde::Deserialize;

use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::invoker::{Invoker, RawResponse};
use crate::node::{Node, NodeUri};
use crate::product::ProductRegistration;

/// The default product registration: Elasticsearch's ping/sniff wire protocol
/// and status-code classification rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticsearchRegistration;

#[derive(Debug, Deserialize)]
struct NodesInfoResponse {
    nodes: std::collections::HashMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    http: Option<HttpInfo>,
}

#[derive(Debug, Deserialize)]
struct HttpInfo {
    publish_address: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    reason: Option<String>,
}

/// Elasticsearch's `publish_address` is `[ip:]port` or `host/ip:port`; this
/// extracts the `host:port` tail.
fn parse_publish_address(addr: &str) -> Option<&str> {
    addr.rsplit('/').next()
}

#[async_trait::async_trait]
impl ProductRegistration for ElasticsearchRegistration {
    fn ping_endpoint(&self, node: &Arc<Node>) -> Endpoint {
        Endpoint::new(Method::HEAD, "/", Arc::clone(node))
    }

    fn sniff_endpoint(&self, node: &Arc<Node>) -> Endpoint {
        Endpoint::new(Method::GET, "/_nodes/http", Arc::clone(node))
    }

    async fn sniff(
        &self,
        invoker: &dyn Invoker,
        using_ssl: bool,
        node: &Arc<Node>,
        bound_config: &BoundConfiguration,
    ) -> Result<(RawResponse, Vec<Arc<Node>>)> {
        let endpoint = self.sniff_endpoint(node);
        let response = invoker.request(&endpoint, bound_config, None).await?;

        let parsed: NodesInfoResponse = serde_json::from_slice(&response.body)?;
        let scheme = if using_ssl { "https" } else { "http" };
        let mut nodes = Vec::new();
        for info in parsed.nodes.into_values() {
            let Some(http) = info.http else { continue };
            let Some(host_port) = parse_publish_address(&http.publish_address) else { continue };
            if let Ok(uri) = NodeUri::parse(&format!("{scheme}://{host_port}")) {
                nodes.push(Arc::new(Node::new(uri)));
            }
        }
        if nodes.is_empty() {
            return Err(TransportError::Unexpected(
                "sniff response contained no usable nodes".to_string(),
            ));
        }
        Ok((response, nodes))
    }

    fn status_code_classifier(&self, _method: &Method, status_code: u16) -> bool {
        (200..300).contains(&status_code)
    }

    fn try_get_server_error_reason(&self, response: &RawResponse) -> Option<String> {
        serde_json::from_slice::<ErrorEnvelope>(&response.body)
            .ok()
            .and_then(|e| e.error.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_2xx_as_success() {
        let reg = ElasticsearchRegistration;
        assert!(reg.status_code_classifier(&Method::GET, 200));
        assert!(reg.status_code_classifier(&Method::GET, 201));
        assert!(!reg.status_code_classifier(&Method::GET, 404));
        assert!(!reg.status_code_classifier(&Method::GET, 502));
    }

    #[test]
    fn extracts_error_reason_from_json_body() {
        let reg = ElasticsearchRegistration;
        let response = RawResponse {
            status_code: Some(400),
            body: bytes::Bytes::from_static(br#"{"error":{"reason":"illegal_argument"}}"#),
            ..Default::default()
        };
        assert_eq!(reg.try_get_server_error_reason(&response), Some("illegal_argument".to_string()));
    }

    #[test]
    fn no_error_reason_when_body_is_not_an_error_envelope() {
        let reg = ElasticsearchRegistration;
        let response = RawResponse {
            body: bytes::Bytes::from_static(b"{}"),
            ..Default::default()
        };
        assert_eq!(reg.try_get_server_error_reason(&response), None);
    }

    #[test]
    fn parses_publish_address_with_and_without_hostname() {
        assert_eq!(parse_publish_address("127.0.0.1:9200"), Some("127.0.0.1:9200"));
        assert_eq!(parse_publish_address("myhost/127.0.0.1:9200"), Some("127.0.0.1:9200"));
    }

    #[tokio::test]
    async fn ping_and_sniff_endpoints_use_expected_paths() {
        let reg = ElasticsearchRegistration;
        let node = Arc::new(Node::new(NodeUri::parse("http://localhost:9200").unwrap()));
        assert_eq!(reg.ping_endpoint(&node).path_and_query(), "/");
        assert_eq!(reg.sniff_endpoint(&node).path_and_query(), "/_nodes/http");
    }
}
