// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;

use crate::config::{Authentication, BoundConfiguration};
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::invoker::{Invoker, RawResponse};

/// The concrete [`Invoker`] shipped with the crate, backed by `reqwest`.
///
/// Honors `requestTimeout`/`pingTimeout`, headers, body, and authentication
/// from the bound configuration. Connection pooling, TLS, and proxy handling
/// are delegated entirely to the underlying `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
}

impl HttpInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .gzip(true)
                .build()
                .expect("failed to build the default reqwest client"),
        }
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Invoker for HttpInvoker {
    async fn request(
        &self,
        endpoint: &Endpoint,
        bound_config: &BoundConfiguration,
        body: Option<Bytes>,
    ) -> Result<RawResponse> {
        let uri = endpoint
            .uri()
            .ok_or_else(|| TransportError::Unexpected("cannot invoke the empty endpoint".to_string()))?;

        let method = reqwest::Method::from_bytes(endpoint.method().as_str().as_bytes())
            .map_err(|e| TransportError::Unexpected(e.to_string()))?;

        let mut request = self
            .client
            .request(method, &uri)
            .timeout(bound_config.request_timeout)
            .header(http::header::ACCEPT, &bound_config.accept)
            .header(http::header::USER_AGENT, &bound_config.user_agent);

        if !bound_config.http_compression {
            request = request.header(http::header::ACCEPT_ENCODING, "identity");
        }

        if !bound_config.request_metadata.is_empty() {
            let mut entries: Vec<_> = bound_config.request_metadata.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str());
            let joined = entries.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
            request = request.header("x-request-metadata", joined);
        }

        for (name, value) in &bound_config.headers {
            request = request.header(name, value);
        }

        request = match &bound_config.authentication {
            Some(Authentication::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            Some(Authentication::Bearer(token)) => request.bearer_auth(token),
            Some(Authentication::ApiKey(key)) => {
                request.header(http::header::AUTHORIZATION, format!("ApiKey {key}"))
            }
            None => request,
        };

        if let Some(body) = body {
            request = request.header(http::header::CONTENT_TYPE, &bound_config.content_type);
            request = if bound_config.transfer_encoding_chunked {
                let stream = tokio_stream::once(Ok::<Bytes, std::io::Error>(body));
                request.header(http::header::TRANSFER_ENCODING, "chunked").body(reqwest::Body::wrap_stream(stream))
            } else {
                request.body(body)
            };
        }

        let response = request.send().await?;

        let status_code = Some(response.status().as_u16());
        let headers = Some(response.headers().clone());
        let mime_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status_code,
            headers,
            content_length: content_length.or(Some(body.len() as u64)),
            mime_type,
            body,
            tcp_stats: None,
            thread_pool_stats: None,
        })
    }
}
