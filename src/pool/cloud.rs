// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Instant;

use base64::Engine;

use crate::clock::Clock;
use crate::node::{Node, NodeUri};
use crate::pool::{NodePool, NodeView, StaticNodePool};

/// A [`StaticNodePool`] seeded from a base64-encoded Elastic Cloud id, with
/// HTTPS forced on and an `Authorization` header pre-bound.
///
/// Cloud ids are `<name>:<base64(domain$es-uuid$kibana-uuid)>`. Only the
/// Elasticsearch host is extracted; the "using SSL" flag is derived from the
/// scheme rather than stored redundantly, per the cluster's own convention.
#[derive(Debug)]
pub struct CloudNodePool {
    inner: StaticNodePool,
    authorization_header: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CloudIdError {
    #[error("cloud id is missing the ':' separator between name and payload")]
    MissingSeparator,
    #[error("cloud id payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("cloud id payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("cloud id payload is missing the '$'-separated domain/es-uuid fields")]
    MalformedPayload,
    #[error(transparent)]
    InvalidUri(#[from] url::ParseError),
}

/// Decode `name:base64(domain$es-uuid$kibana-uuid)` into an HTTPS node URI.
pub fn decode_cloud_id(cloud_id: &str) -> Result<NodeUri, CloudIdError> {
    let (_name, payload) = cloud_id.split_once(':').ok_or(CloudIdError::MissingSeparator)?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(payload)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CloudIdError::InvalidUtf8)?;
    let mut parts = decoded.split('$');
    let domain = parts.next().ok_or(CloudIdError::MalformedPayload)?;
    let es_uuid = parts.next().ok_or(CloudIdError::MalformedPayload)?;
    if es_uuid.is_empty() {
        return Err(CloudIdError::MalformedPayload);
    }
    let uri = NodeUri::parse(&format!("https://{es_uuid}.{domain}"))?;
    Ok(uri)
}

impl CloudNodePool {
    pub fn from_cloud_id(cloud_id: &str, api_key: Option<&str>) -> Result<Self, CloudIdError> {
        let uri = decode_cloud_id(cloud_id)?;
        Ok(Self {
            inner: StaticNodePool::new(vec![Arc::new(Node::new(uri))]),
            authorization_header: api_key.map(|k| format!("ApiKey {k}")),
        })
    }

    #[must_use]
    pub fn authorization_header(&self) -> Option<&str> {
        self.authorization_header.as_deref()
    }
}

impl NodePool for CloudNodePool {
    fn view(&self, clock: &dyn Clock) -> Box<dyn NodeView + '_> {
        self.inner.view(clock)
    }
    fn reseed(&self, new_nodes: Vec<Arc<Node>>) {
        self.inner.reseed(new_nodes);
    }
    fn mark_as_sniffed(&self) {
        self.inner.mark_as_sniffed();
    }
    fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.nodes()
    }
    fn last_update(&self) -> Instant {
        self.inner.last_update()
    }
    fn sniffed_on_startup(&self) -> bool {
        self.inner.sniffed_on_startup()
    }
    fn using_ssl(&self) -> bool {
        true
    }
    fn supports_pinging(&self) -> bool {
        self.inner.supports_pinging()
    }
    fn supports_reseeding(&self) -> bool {
        self.inner.supports_reseeding()
    }
    fn max_retries(&self) -> u32 {
        self.inner.max_retries()
    }
    fn authorization_header(&self) -> Option<String> {
        self.authorization_header.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cloud_id() -> String {
        let payload = base64::engine::general_purpose::STANDARD
            .encode("example.com:9243$abc123es$def456kb");
        format!("my-deployment:{payload}")
    }

    #[test]
    fn decodes_cloud_id_into_https_uri() {
        let uri = decode_cloud_id(&sample_cloud_id()).unwrap();
        assert_eq!(uri.to_string(), "https://abc123es.example.com:9243/");
        assert!(uri.is_https());
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!(decode_cloud_id("no-colon-here"), Err(CloudIdError::MissingSeparator)));
    }

    #[test]
    fn pool_forces_ssl_and_binds_auth_header() {
        let pool = CloudNodePool::from_cloud_id(&sample_cloud_id(), Some("secret")).unwrap();
        assert!(pool.using_ssl());
        assert_eq!(pool.authorization_header(), Some("ApiKey secret"));
        assert_eq!(pool.nodes().len(), 1);
    }
}
