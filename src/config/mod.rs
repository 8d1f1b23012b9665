// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration binding: global options, per-request overlays, and their
//! immutable merge.

mod file;

pub use file::{TransportConfigFile, ENV_TRANSPORT_CONFIG, ENV_TRANSPORT_ENDPOINTS};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;

use crate::node::NodeUri;
use crate::response::{ErrorDeserializer, ResponseBuilderHook};

/// Credentials attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Basic { username: String, password: String },
    ApiKey(String),
    Bearer(String),
}

/// Paths to a client certificate/key pair for mTLS.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientCertificates {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub ca_path: Option<String>,
}

const DEFAULT_ACCEPT: &str = "application/json";
const DEFAULT_CONTENT_TYPE: &str = "application/json";
const DEFAULT_DEAD_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_DEAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Global, process-lifetime transport configuration.
///
/// Immutable once built: every `with_*` method consumes `self` and returns a
/// new value, matching the fluent builder convention used throughout the
/// rest of the crate.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub request_timeout: Duration,
    pub ping_timeout: Duration,
    pub max_retry_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub force_node: Option<NodeUri>,
    pub disable_sniff: bool,
    pub disable_pings: bool,
    pub disable_audit_trail: bool,
    pub disable_direct_streaming: bool,
    pub throw_exceptions: bool,
    pub accept: String,
    pub content_type: String,
    pub allowed_status_codes: Vec<i32>,
    pub headers: HeaderMap,
    pub opaque_id: Option<String>,
    pub run_as: Option<String>,
    pub authentication: Option<Authentication>,
    pub client_certificates: Option<ClientCertificates>,
    pub http_compression: bool,
    pub http_pipelining_enabled: bool,
    pub transfer_encoding_chunked: bool,
    pub skip_deserialization_for_status_codes: Vec<u16>,
    pub parse_all_headers: bool,
    pub response_headers_to_parse: Vec<String>,
    pub enable_tcp_stats: bool,
    pub enable_thread_pool_stats: bool,
    pub user_agent: String,
    pub request_metadata: HashMap<String, String>,
    pub sniffs_on_startup: bool,
    pub sniffs_on_connection_fault: bool,
    pub sniff_information_life_span: Option<Duration>,
    pub dead_timeout: Duration,
    pub max_dead_timeout: Duration,
    /// Global response builder chain, consulted after any request-local
    /// hooks and before the product-provided ones.
    pub response_builders: Vec<Arc<dyn ResponseBuilderHook>>,
    /// Global error-envelope readers, same chain ordering as `response_builders`.
    pub error_deserializers: Vec<Arc<dyn ErrorDeserializer>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            max_retry_timeout: None,
            max_retries: None,
            force_node: None,
            disable_sniff: false,
            disable_pings: false,
            disable_audit_trail: false,
            disable_direct_streaming: false,
            throw_exceptions: false,
            accept: DEFAULT_ACCEPT.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            allowed_status_codes: Vec::new(),
            headers: HeaderMap::new(),
            opaque_id: None,
            run_as: None,
            authentication: None,
            client_certificates: None,
            http_compression: false,
            http_pipelining_enabled: false,
            transfer_encoding_chunked: false,
            skip_deserialization_for_status_codes: Vec::new(),
            parse_all_headers: false,
            response_headers_to_parse: Vec::new(),
            enable_tcp_stats: false,
            enable_thread_pool_stats: false,
            user_agent: format!(
                "elastic-transport-rs/{} ({}; rust; tokio)",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ),
            request_metadata: HashMap::new(),
            sniffs_on_startup: true,
            sniffs_on_connection_fault: true,
            sniff_information_life_span: None,
            dead_timeout: DEFAULT_DEAD_TIMEOUT,
            max_dead_timeout: DEFAULT_MAX_DEAD_TIMEOUT,
            response_builders: Vec::new(),
            error_deserializers: Vec::new(),
        }
    }
}

impl Configuration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.max_retry_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn with_force_node(mut self, node: NodeUri) -> Self {
        self.force_node = Some(node);
        self
    }

    #[must_use]
    pub fn with_disable_sniff(mut self, disable: bool) -> Self {
        self.disable_sniff = disable;
        self
    }

    #[must_use]
    pub fn with_disable_pings(mut self, disable: bool) -> Self {
        self.disable_pings = disable;
        self
    }

    #[must_use]
    pub fn with_throw_exceptions(mut self, throw: bool) -> Self {
        self.throw_exceptions = throw;
        self
    }

    #[must_use]
    pub fn with_authentication(mut self, auth: Authentication) -> Self {
        self.authentication = Some(auth);
        self
    }

    #[must_use]
    pub fn with_opaque_id(mut self, id: impl Into<String>) -> Self {
        self.opaque_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_sniff_information_life_span(mut self, life_span: Duration) -> Self {
        self.sniff_information_life_span = Some(life_span);
        self
    }

    #[must_use]
    pub fn with_response_builder(mut self, hook: Arc<dyn ResponseBuilderHook>) -> Self {
        self.response_builders.push(hook);
        self
    }

    #[must_use]
    pub fn with_error_deserializer(mut self, hook: Arc<dyn ErrorDeserializer>) -> Self {
        self.error_deserializers.push(hook);
        self
    }

    /// The `maxRetries` effectively in force once `forceNode` is taken into account.
    #[must_use]
    pub fn effective_max_retries(&self, pool_max_retries: u32) -> u32 {
        if self.force_node.is_some() {
            return 0;
        }
        self.max_retries.unwrap_or(pool_max_retries).min(pool_max_retries)
    }
}

/// A sparse per-request overlay: every field absent falls back to the global
/// [`Configuration`].
#[derive(Debug, Clone, Default)]
pub struct RequestOverlay {
    pub request_timeout: Option<Duration>,
    pub ping_timeout: Option<Duration>,
    pub max_retry_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub force_node: Option<NodeUri>,
    pub disable_sniff: Option<bool>,
    pub disable_pings: Option<bool>,
    pub disable_audit_trail: Option<bool>,
    pub disable_direct_streaming: Option<bool>,
    pub throw_exceptions: Option<bool>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub allowed_status_codes: Option<Vec<i32>>,
    pub headers: Option<HeaderMap>,
    pub opaque_id: Option<String>,
    pub run_as: Option<String>,
    pub authentication: Option<Authentication>,
    pub response_builders: Vec<Arc<dyn ResponseBuilderHook>>,
    pub error_deserializers: Vec<Arc<dyn ErrorDeserializer>>,
}

impl RequestOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_force_node(mut self, node: NodeUri) -> Self {
        self.force_node = Some(node);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_opaque_id(mut self, id: impl Into<String>) -> Self {
        self.opaque_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_response_builder(mut self, hook: Arc<dyn ResponseBuilderHook>) -> Self {
        self.response_builders.push(hook);
        self
    }

    #[must_use]
    pub fn with_error_deserializer(mut self, hook: Arc<dyn ErrorDeserializer>) -> Self {
        self.error_deserializers.push(hook);
        self
    }

    #[must_use]
    pub fn is_immutable_cache_key(&self) -> bool {
        // Overlays built through this type are always plain data, so they are
        // always eligible for the transport's bound-configuration cache.
        true
    }
}

/// An immutable merge of global [`Configuration`] and an optional per-request
/// [`RequestOverlay`]. Pure data; produced without I/O. Identical inputs
/// produce equal bindings (see `Transport`'s bound-configuration cache).
#[derive(Debug, Clone)]
pub struct BoundConfiguration {
    pub request_timeout: Duration,
    pub ping_timeout: Duration,
    pub max_retry_timeout: Duration,
    pub max_retries_override: Option<u32>,
    pub force_node: Option<NodeUri>,
    pub disable_sniff: bool,
    pub disable_pings: bool,
    pub disable_audit_trail: bool,
    pub disable_direct_streaming: bool,
    pub throw_exceptions: bool,
    pub accept: String,
    pub content_type: String,
    pub allowed_status_codes: Vec<i32>,
    pub headers: HeaderMap,
    pub opaque_id: Option<String>,
    pub run_as: Option<String>,
    pub authentication: Option<Authentication>,
    pub sniffs_on_startup: bool,
    pub sniffs_on_connection_fault: bool,
    pub sniff_information_life_span: Option<Duration>,
    pub dead_timeout: Duration,
    pub max_dead_timeout: Duration,
    pub user_agent: String,
    pub skip_deserialization_for_status_codes: Vec<u16>,
    pub parse_all_headers: bool,
    pub response_headers_to_parse: Vec<String>,
    pub http_compression: bool,
    pub http_pipelining_enabled: bool,
    pub transfer_encoding_chunked: bool,
    pub enable_tcp_stats: bool,
    pub enable_thread_pool_stats: bool,
    pub request_metadata: HashMap<String, String>,
    /// Request-local hooks, in registration order, followed by the global
    /// ones. Product-provided hooks are consulted after this chain (see
    /// `ProductRegistration::response_builders`).
    pub response_builders: Vec<Arc<dyn ResponseBuilderHook>>,
    /// Same chain ordering as `response_builders`; `ProductRegistration::
    /// try_get_server_error_reason` is the final, product-provided tier.
    pub error_deserializers: Vec<Arc<dyn ErrorDeserializer>>,
}

impl BoundConfiguration {
    /// Merge `global` and an optional `overlay`: per-request wins when
    /// present, else global, else the documented default.
    ///
    /// `pool_authorization_header` is the node pool's own pre-bound
    /// `Authorization` value, if any (e.g. [`crate::pool::CloudNodePool`]'s
    /// cloud-id-derived API key). It is applied only when neither the
    /// overlay nor the global configuration set an explicit authentication
    /// or `Authorization` header.
    #[must_use]
    pub fn bind(
        global: &Configuration,
        overlay: Option<&RequestOverlay>,
        pool_authorization_header: Option<&str>,
    ) -> Arc<Self> {
        let overlay = overlay.cloned().unwrap_or_default();

        let mut headers = global.headers.clone();
        if let Some(overlay_headers) = &overlay.headers {
            for (name, value) in overlay_headers {
                headers.insert(name.clone(), value.clone());
            }
        }
        let opaque_id = overlay.opaque_id.or_else(|| global.opaque_id.clone());
        if let Some(id) = &opaque_id {
            if let Ok(value) = http::HeaderValue::from_str(id) {
                headers.insert("X-Opaque-Id", value);
            }
        }
        if let Some(run_as) = overlay.run_as.as_ref().or(global.run_as.as_ref()) {
            if let Ok(value) = http::HeaderValue::from_str(run_as) {
                headers.insert("es-security-runas-user", value);
            }
        }

        let authentication = overlay.authentication.clone().or_else(|| global.authentication.clone());
        if authentication.is_none() && !headers.contains_key(http::header::AUTHORIZATION) {
            if let Some(header) = pool_authorization_header {
                if let Ok(value) = http::HeaderValue::from_str(header) {
                    headers.insert(http::header::AUTHORIZATION, value);
                }
            }
        }

        Arc::new(Self {
            request_timeout: overlay.request_timeout.unwrap_or(global.request_timeout),
            ping_timeout: overlay.ping_timeout.unwrap_or(global.ping_timeout),
            max_retry_timeout: overlay
                .max_retry_timeout
                .or(global.max_retry_timeout)
                .unwrap_or(overlay.request_timeout.unwrap_or(global.request_timeout)),
            max_retries_override: overlay.max_retries.or(global.max_retries),
            force_node: overlay.force_node.or_else(|| global.force_node.clone()),
            disable_sniff: overlay.disable_sniff.unwrap_or(global.disable_sniff),
            disable_pings: overlay.disable_pings.unwrap_or(global.disable_pings),
            disable_audit_trail: overlay.disable_audit_trail.unwrap_or(global.disable_audit_trail),
            disable_direct_streaming: overlay
                .disable_direct_streaming
                .unwrap_or(global.disable_direct_streaming),
            throw_exceptions: overlay.throw_exceptions.unwrap_or(global.throw_exceptions),
            accept: overlay.accept.unwrap_or_else(|| global.accept.clone()),
            content_type: overlay.content_type.unwrap_or_else(|| global.content_type.clone()),
            allowed_status_codes: overlay
                .allowed_status_codes
                .unwrap_or_else(|| global.allowed_status_codes.clone()),
            headers,
            opaque_id,
            run_as: overlay.run_as.or_else(|| global.run_as.clone()),
            authentication,
            sniffs_on_startup: global.sniffs_on_startup,
            sniffs_on_connection_fault: global.sniffs_on_connection_fault,
            sniff_information_life_span: global.sniff_information_life_span,
            dead_timeout: global.dead_timeout,
            max_dead_timeout: global.max_dead_timeout,
            user_agent: global.user_agent.clone(),
            skip_deserialization_for_status_codes: global.skip_deserialization_for_status_codes.clone(),
            parse_all_headers: global.parse_all_headers,
            response_headers_to_parse: global.response_headers_to_parse.clone(),
            http_compression: global.http_compression,
            http_pipelining_enabled: global.http_pipelining_enabled,
            transfer_encoding_chunked: global.transfer_encoding_chunked,
            enable_tcp_stats: global.enable_tcp_stats,
            enable_thread_pool_stats: global.enable_thread_pool_stats,
            request_metadata: global.request_metadata.clone(),
            response_builders: overlay
                .response_builders
                .iter()
                .cloned()
                .chain(global.response_builders.iter().cloned())
                .collect(),
            error_deserializers: overlay
                .error_deserializers
                .iter()
                .cloned()
                .chain(global.error_deserializers.iter().cloned())
                .collect(),
        })
    }

    /// `maxRetries` once `forceNode` has been accounted for (0 when set).
    #[must_use]
    pub fn max_retries(&self, pool_max_retries: u32) -> u32 {
        if self.force_node.is_some() {
            return 0;
        }
        self.max_retries_override.unwrap_or(pool_max_retries).min(pool_max_retries)
    }

    /// Accepts any MIME whose trimmed form equals or starts with the trimmed
    /// `accept` value (case-insensitive), plus a generic `application/json`
    /// fallback for Elasticsearch's vendored media type.
    #[must_use]
    pub fn validate_response_content_type(&self, mime: &str) -> bool {
        let trimmed_mime = mime.trim().to_ascii_lowercase();
        let trimmed_accept = self.accept.trim().to_ascii_lowercase();
        if trimmed_mime == trimmed_accept || trimmed_mime.starts_with(&trimmed_accept) {
            return true;
        }
        trimmed_accept == "application/json"
            && trimmed_mime.starts_with("application/vnd.elasticsearch+json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overlay_then_global_then_default() {
        let global = Configuration::new().with_request_timeout(Duration::from_secs(30));
        let bound = BoundConfiguration::bind(&global, None, None);
        assert_eq!(bound.request_timeout, Duration::from_secs(30));

        let overlay = RequestOverlay::new().with_request_timeout(Duration::from_secs(5));
        let bound = BoundConfiguration::bind(&global, Some(&overlay), None);
        assert_eq!(bound.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn force_node_overlay_zeroes_max_retries() {
        let global = Configuration::new();
        let overlay = RequestOverlay::new().with_force_node(NodeUri::parse("http://localhost:9200").unwrap());
        let bound = BoundConfiguration::bind(&global, Some(&overlay), None);
        assert_eq!(bound.max_retries(4), 0);
    }

    #[test]
    fn opaque_id_sets_header() {
        let global = Configuration::new().with_opaque_id("req-123");
        let bound = BoundConfiguration::bind(&global, None, None);
        assert_eq!(bound.headers.get("X-Opaque-Id").unwrap(), "req-123");
    }

    #[test]
    fn content_type_validation_is_case_insensitive_prefix_match() {
        let global = Configuration::new();
        let bound = BoundConfiguration::bind(&global, None, None);
        assert!(bound.validate_response_content_type("Application/JSON; charset=utf-8"));
        assert!(bound.validate_response_content_type("application/vnd.elasticsearch+json;compatible-with=8"));
        assert!(!bound.validate_response_content_type("text/html"));
    }

    #[test]
    fn pool_authorization_header_is_applied_when_nothing_else_sets_one() {
        let global = Configuration::new();
        let bound = BoundConfiguration::bind(&global, None, Some("ApiKey from-pool"));
        assert_eq!(bound.headers.get(http::header::AUTHORIZATION).unwrap(), "ApiKey from-pool");
        assert!(bound.authentication.is_none());
    }

    #[test]
    fn explicit_authentication_wins_over_pool_authorization_header() {
        let global = Configuration::new().with_authentication(Authentication::Bearer("token".to_string()));
        let bound = BoundConfiguration::bind(&global, None, Some("ApiKey from-pool"));
        assert!(bound.headers.get(http::header::AUTHORIZATION).is_none());
        assert_eq!(bound.authentication, Some(Authentication::Bearer("token".to_string())));
    }

    #[test]
    fn identical_inputs_produce_equal_bindings() {
        let global = Configuration::new();
        let a = BoundConfiguration::bind(&global, None, None);
        let b = BoundConfiguration::bind(&global, None, None);
        assert_eq!(a.request_timeout, b.request_timeout);
        assert_eq!(a.accept, b.accept);
    }
}
