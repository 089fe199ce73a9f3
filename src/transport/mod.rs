//! 传输层：发送外层 multipart 请求并返回响应流。
//!
//! Transport for the single outer batch request.
//!
//! The core only depends on [`BatchTransport`]; [`HttpTransport`] is the
//! reqwest-backed default. Timeouts and cancellation are the transport's
//! concern and surface as [`TransportError`]s.

mod http;

pub use http::HttpTransport;

use crate::multipart::EncodedPart;
use crate::types::{Auth, Method};
use crate::{BoxStream, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Everything needed to issue one outer batch request.
#[derive(Debug, Clone)]
pub struct OuterRequest {
    pub uri: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub parts: Vec<EncodedPart>,
    pub auth: Option<Auth>,
    pub timeout: Option<std::time::Duration>,
}

impl OuterRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response to the outer request. Header names are lowercased.
pub struct TransportResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: BoxStream<'static, Bytes>,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or_default()
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Issues the outer request and hands back the status, headers and body stream.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send(&self, request: OuterRequest) -> Result<TransportResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
