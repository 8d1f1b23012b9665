// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Instant;

use serde::de::DeserializeOwned;

use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::invoker::RawResponse;
use crate::product::ProductRegistration;
use crate::response::{ApiCallDetails, Response, ResponseBody, ResponseShape};

/// A pluggable override consulted, in order, before the built-in shape-based
/// materialization below runs. Each hook gets a chance to rewrite the raw
/// body (and/or its declared MIME type) — e.g. to unwrap a non-standard
/// envelope or strip a vendor prefix — before the generic deserializer sees
/// it. Returning `None` declines and lets the chain continue.
pub trait ResponseBuilderHook: Send + Sync + std::fmt::Debug {
    fn rewrite_body(
        &self,
        shape: Option<ResponseShape>,
        raw: &RawResponse,
        endpoint: &Endpoint,
    ) -> Option<(bytes::Bytes, Option<String>)>;
}

/// A pluggable typed error-envelope reader, consulted (request-local, then
/// global, then product-provided) when a response's status code is not a
/// success. `ProductRegistration::try_get_server_error_reason` acts as the
/// final, product-provided tier of this same chain.
pub trait ErrorDeserializer: Send + Sync + std::fmt::Debug {
    fn try_deserialize_error(&self, raw: &RawResponse) -> Option<String>;
}

/// Turns a [`RawResponse`] into a [`Response`] per the algorithm in the
/// component design: status classification, content-type validation, body
/// materialization, and generic or special-shape deserialization.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseBuilder;

impl ResponseBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build a response. `shape` selects one of the well-known body shapes;
    /// `None` runs the generic JSON deserializer into `T`.
    pub fn build<T: DeserializeOwned>(
        &self,
        shape: Option<ResponseShape>,
        raw: RawResponse,
        endpoint: &Endpoint,
        bound_config: &BoundConfiguration,
        registration: &dyn ProductRegistration,
    ) -> Result<Response<T>> {
        let mut raw = raw;
        for hook in bound_config.response_builders.iter().chain(registration.response_builders().iter()) {
            if let Some((body, mime_type)) = hook.rewrite_body(shape, &raw, endpoint) {
                raw.body = body;
                if mime_type.is_some() {
                    raw.mime_type = mime_type;
                }
                break;
            }
        }

        let method = endpoint.method().clone();

        // Step 1: hasSuccessfulStatusCode.
        let has_successful_status_code = match raw.status_code {
            Some(code) => {
                if bound_config.allowed_status_codes.contains(&-1)
                    || bound_config.allowed_status_codes.contains(&i32::from(code))
                {
                    true
                } else {
                    registration.status_code_classifier(&method, code)
                }
            }
            None => false,
        };

        // Step 2: hasExpectedContentType.
        let may_have_no_body = raw.status_code == Some(204)
            || method == http::Method::HEAD
            || raw.content_length == Some(0);
        let has_expected_content_type = if may_have_no_body {
            true
        } else {
            bound_config.validate_response_content_type(raw.mime_type.as_deref().unwrap_or(""))
        };

        let mut details = ApiCallDetails {
            uri: endpoint.uri(),
            method,
            http_status_code: raw.status_code,
            has_successful_status_code,
            has_expected_content_type,
            request_body_bytes: None,
            response_body_bytes: None,
            response_mime_type: raw.mime_type.clone(),
            parsed_headers: if bound_config.parse_all_headers { raw.headers.clone() } else { None },
            audit_trail: Vec::new(),
            tcp_stats: raw.tcp_stats.clone(),
            thread_pool_stats: raw.thread_pool_stats.clone(),
            server_error_reason: None,
            original_exception: None,
            deserialization_time: None,
        };

        if !has_successful_status_code {
            details.server_error_reason = bound_config
                .error_deserializers
                .iter()
                .find_map(|hook| hook.try_deserialize_error(&raw))
                .or_else(|| registration.try_get_server_error_reason(&raw));
        }

        // Step 3: skip deserialization entirely for configured status codes.
        if let Some(code) = raw.status_code {
            if bound_config.skip_deserialization_for_status_codes.contains(&code) {
                return Ok(Response { body: ResponseBody::None, details });
            }
        }

        // Steps 4-5: materialize a well-known shape, or run the generic deserializer.
        let started = Instant::now();
        let body = match shape {
            Some(ResponseShape::String) => {
                details.response_body_bytes = Some(raw.body.clone());
                ResponseBody::String(String::from_utf8_lossy(&raw.body).into_owned())
            }
            Some(ResponseShape::Bytes) => {
                details.response_body_bytes = Some(raw.body.clone());
                ResponseBody::Bytes(raw.body)
            }
            Some(ResponseShape::Void) => ResponseBody::Void,
            Some(ResponseShape::Stream) => {
                details.response_body_bytes = Some(raw.body.clone());
                ResponseBody::Stream(raw.body)
            }
            Some(ResponseShape::Dynamic) => {
                details.response_body_bytes = Some(raw.body.clone());
                if raw
                    .mime_type
                    .as_deref()
                    .is_some_and(|m| m.to_ascii_lowercase().contains("json"))
                {
                    let value: serde_json::Value = serde_json::from_slice(&raw.body)
                        .unwrap_or(serde_json::Value::Null);
                    ResponseBody::Dynamic(value)
                } else {
                    let mut map = serde_json::Map::new();
                    map.insert("body".to_string(), serde_json::Value::String(String::from_utf8_lossy(&raw.body).into_owned()));
                    ResponseBody::Dynamic(serde_json::Value::Object(map))
                }
            }
            None => {
                // Disabling direct streaming forces materialization even on the typed path.
                if bound_config.disable_direct_streaming {
                    details.response_body_bytes = Some(raw.body.clone());
                }
                if tokens_present(&raw.body) {
                    let value: T = serde_json::from_slice(&raw.body)?;
                    ResponseBody::Typed(value)
                } else {
                    ResponseBody::None
                }
            }
        };
        details.deserialization_time = Some(started.elapsed());

        Ok(Response { body, details })
    }
}

/// Whether the body contains at least one non-whitespace byte, i.e. "input
/// contains no JSON tokens" per the generic deserializer's bail-out rule.
fn tokens_present(body: &bytes::Bytes) -> bool {
    body.iter().any(|b| !b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeUri};
    use crate::product::ElasticsearchRegistration;
    use bytes::Bytes;
    use std::sync::Arc;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Health {
        status: String,
    }

    fn endpoint() -> Endpoint {
        let node = Arc::new(Node::new(NodeUri::parse("http://localhost:9200").unwrap()));
        Endpoint::new(http::Method::GET, "/_cluster/health", node)
    }

    fn bound() -> Arc<BoundConfiguration> {
        BoundConfiguration::bind(&crate::config::Configuration::new(), None, None)
    }

    #[test]
    fn typed_response_deserializes_json_body() {
        let raw = RawResponse {
            status_code: Some(200),
            mime_type: Some("application/json".to_string()),
            body: Bytes::from_static(br#"{"status":"green"}"#),
            content_length: Some(18),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<Health> = builder
            .build(None, raw, &endpoint(), &bound(), &ElasticsearchRegistration)
            .unwrap();
        assert!(response.is_success());
        match response.body {
            ResponseBody::Typed(health) => assert_eq!(health.status, "green"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn empty_body_with_no_tokens_yields_none() {
        let raw = RawResponse {
            status_code: Some(204),
            content_length: Some(0),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<Health> = builder
            .build(None, raw, &endpoint(), &bound(), &ElasticsearchRegistration)
            .unwrap();
        assert!(response.details.has_expected_content_type);
        assert!(matches!(response.body, ResponseBody::None));
    }

    #[test]
    fn string_shape_decodes_utf8() {
        let raw = RawResponse {
            status_code: Some(200),
            mime_type: Some("text/plain".to_string()),
            body: Bytes::from_static(b"hello"),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<()> = builder
            .build(Some(ResponseShape::String), raw, &endpoint(), &bound(), &ElasticsearchRegistration)
            .unwrap();
        match response.body {
            ResponseBody::String(s) => assert_eq!(s, "hello"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn bad_status_code_extracts_server_error_reason() {
        let raw = RawResponse {
            status_code: Some(400),
            mime_type: Some("application/json".to_string()),
            body: Bytes::from_static(br#"{"error":{"reason":"illegal_argument"}}"#),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<()> = builder
            .build(Some(ResponseShape::Void), raw, &endpoint(), &bound(), &ElasticsearchRegistration)
            .unwrap();
        assert!(!response.is_success());
        assert_eq!(response.details.server_error_reason.as_deref(), Some("illegal_argument"));
    }

    #[derive(Debug)]
    struct FixedReasonDeserializer(&'static str);

    impl ErrorDeserializer for FixedReasonDeserializer {
        fn try_deserialize_error(&self, _raw: &RawResponse) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn error_deserializer_chain_wins_over_product_default() {
        let mut config = crate::config::Configuration::new();
        config.error_deserializers.push(std::sync::Arc::new(FixedReasonDeserializer("custom-reason")));
        let bound = BoundConfiguration::bind(&config, None, None);

        let raw = RawResponse {
            status_code: Some(400),
            mime_type: Some("application/json".to_string()),
            body: Bytes::from_static(br#"{"error":{"reason":"illegal_argument"}}"#),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<()> =
            builder.build(Some(ResponseShape::Void), raw, &endpoint(), &bound, &ElasticsearchRegistration).unwrap();
        assert_eq!(response.details.server_error_reason.as_deref(), Some("custom-reason"));
    }

    #[derive(Debug)]
    struct UppercaseBodyHook;

    impl ResponseBuilderHook for UppercaseBodyHook {
        fn rewrite_body(
            &self,
            _shape: Option<ResponseShape>,
            raw: &RawResponse,
            _endpoint: &Endpoint,
        ) -> Option<(Bytes, Option<String>)> {
            let upper = String::from_utf8_lossy(&raw.body).to_ascii_uppercase();
            Some((Bytes::from(upper), None))
        }
    }

    #[test]
    fn response_builder_hook_rewrites_body_before_materialization() {
        let mut config = crate::config::Configuration::new();
        config.response_builders.push(std::sync::Arc::new(UppercaseBodyHook));
        let bound = BoundConfiguration::bind(&config, None, None);

        let raw = RawResponse {
            status_code: Some(200),
            mime_type: Some("text/plain".to_string()),
            body: Bytes::from_static(b"hello"),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<()> =
            builder.build(Some(ResponseShape::String), raw, &endpoint(), &bound, &ElasticsearchRegistration).unwrap();
        match response.body {
            ResponseBody::String(s) => assert_eq!(s, "HELLO"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn request_local_response_builder_wins_over_global() {
        let mut config = crate::config::Configuration::new();
        config.response_builders.push(std::sync::Arc::new(UppercaseBodyHook));

        #[derive(Debug)]
        struct NoopHook;
        impl ResponseBuilderHook for NoopHook {
            fn rewrite_body(&self, _: Option<ResponseShape>, _: &RawResponse, _: &Endpoint) -> Option<(Bytes, Option<String>)> {
                Some((Bytes::from_static(b"from request-local"), None))
            }
        }
        let overlay = crate::config::RequestOverlay::new().with_response_builder(std::sync::Arc::new(NoopHook));
        let bound = BoundConfiguration::bind(&config, Some(&overlay), None);

        let raw = RawResponse {
            status_code: Some(200),
            mime_type: Some("text/plain".to_string()),
            body: Bytes::from_static(b"hello"),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<()> =
            builder.build(Some(ResponseShape::String), raw, &endpoint(), &bound, &ElasticsearchRegistration).unwrap();
        match response.body {
            ResponseBody::String(s) => assert_eq!(s, "from request-local"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn skip_deserialization_for_configured_status_codes() {
        let mut config = crate::config::Configuration::new();
        config.skip_deserialization_for_status_codes = vec![304];
        let bound = BoundConfiguration::bind(&config, None, None);
        let raw = RawResponse {
            status_code: Some(304),
            body: Bytes::from_static(br#"{"status":"green"}"#),
            ..Default::default()
        };
        let builder = ResponseBuilder::new();
        let response: Response<Health> = builder
            .build(None, raw, &endpoint(), &bound, &ElasticsearchRegistration)
            .unwrap();
        assert!(matches!(response.body, ResponseBody::None));
    }

    #[test]
    fn head_request_has_expected_content_type_even_without_body() {
        let raw = RawResponse {
            status_code: Some(200),
            mime_type: None,
            ..Default::default()
        };
        let node = Arc::new(Node::new(NodeUri::parse("http://localhost:9200").unwrap()));
        let head_endpoint = Endpoint::new(http::Method::HEAD, "/", node);
        let builder = ResponseBuilder::new();
        let response: Response<()> = builder
            .build(Some(ResponseShape::Void), raw, &head_endpoint, &bound(), &ElasticsearchRegistration)
            .unwrap();
        assert!(response.details.has_expected_content_type);
    }
}
