use super::{BatchTransport, OuterRequest, TransportError, TransportResponse};
use crate::multipart::{outer_framing, serialize_body};
use crate::types::Method;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Proxy;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport that serializes the outer `multipart/mixed` body.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout_secs = env::var("BATCHELOR_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));

        if let Ok(proxy_url) = env::var("BATCHELOR_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn send(&self, request: OuterRequest) -> Result<TransportResponse> {
        let (boundary, content_type) = outer_framing(
            request
                .header("content-type")
                .unwrap_or(crate::config::DEFAULT_OUTER_CONTENT_TYPE),
        );
        let body = serialize_body(&boundary, &request.parts);
        debug!(
            uri = %request.uri,
            parts = request.parts.len(),
            bytes = body.len(),
            "sending batch request"
        );

        let mut req = self
            .client
            .request(Self::method(request.method), &request.uri)
            .header(reqwest::header::CONTENT_TYPE, content_type);

        for (name, value) in &request.headers {
            if !name.eq_ignore_ascii_case("content-type") {
                req = req.header(name.as_str(), value.as_str());
            }
        }

        if let Some(token) = request.auth.as_ref().and_then(|a| a.bearer_token()) {
            req = req.bearer_auth(token);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));

        Ok(TransportResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
