//! Response demultiplexing: multipart stream -> routed [`ResponsePart`]s.
//!
//! Parts are split with `multer` and each embedded HTTP response head is
//! parsed with `httparse`.

use crate::multipart::extract_boundary;
use crate::types::{AggregateResult, BatchOutcome, PartCallback, ResponsePart, CONTENT_ID};
use crate::{BoxStream, Error, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use tracing::{debug, warn};

const RESPONSE_PREFIX: &str = "response-";

/// Upper bound on headers in one embedded response.
const MAX_PART_HEADERS: usize = 64;

/// Correlation state captured from the client when a batch is dispatched.
#[derive(Clone, Default)]
pub struct CorrelationRoutes {
    pub callbacks: HashMap<String, PartCallback>,
    pub extension_data: HashMap<String, Value>,
    /// Correlation ids of the outbound batch; empty disables unmatched-id checks.
    pub expected_ids: HashSet<String>,
}

impl CorrelationRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(mut self, id: impl Into<String>, callback: F) -> Self
    where
        F: Fn(ResponsePart, Option<Value>) + Send + Sync + 'static,
    {
        self.callbacks.insert(id.into(), std::sync::Arc::new(callback));
        self
    }

    pub fn with_extension_data(mut self, id: impl Into<String>, data: Value) -> Self {
        self.extension_data.insert(id.into(), data);
        self
    }

    pub fn with_expected_id(mut self, id: impl Into<String>) -> Self {
        self.expected_ids.insert(id.into());
        self
    }

    fn is_unmatched(&self, id: &str) -> bool {
        !self.expected_ids.is_empty() && !self.expected_ids.contains(id)
    }
}

impl std::fmt::Debug for CorrelationRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationRoutes")
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .field("extension_data", &self.extension_data)
            .field("expected_ids", &self.expected_ids)
            .finish()
    }
}

/// Normalize a part's `content-id` header values into a correlation id.
///
/// A single value loses a leading `response-` marker, inside its angle
/// brackets when it has them (`<response-x>` becomes `<x>`). Several values
/// are joined with `,` untouched.
pub fn normalize_content_id(values: &[String]) -> Option<String> {
    match values {
        [] => None,
        [single] => {
            let id = single.trim();
            let id = match id.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                Some(inner) => format!("<{}>", inner.strip_prefix(RESPONSE_PREFIX).unwrap_or(inner)),
                None => id.strip_prefix(RESPONSE_PREFIX).unwrap_or(id).to_string(),
            };
            Some(id)
        }
        many => Some(many.join(",")),
    }
}

/// Decode the embedded HTTP response of one part.
///
/// `correlation_id` comes from the part envelope; any `Content-ID` in the
/// embedded response is dropped so the envelope value is the only one exposed.
pub fn decode_part(correlation_id: Option<&str>, payload: &[u8]) -> Result<ResponsePart> {
    let label = correlation_id.unwrap_or("<no content-id>");
    let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    let offset = match response.parse(payload) {
        Ok(httparse::Status::Complete(offset)) => offset,
        Ok(httparse::Status::Partial) => {
            return Err(Error::multipart(format!(
                "incomplete HTTP response head in part {label}"
            )))
        }
        Err(e) => {
            return Err(Error::multipart(format!(
                "invalid HTTP response in part {label}: {e}"
            )))
        }
    };

    let raw_body = &payload[offset..];
    let body = if raw_body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let value = serde_json::from_slice::<Value>(raw_body).map_err(|source| Error::Decode {
            correlation_id: correlation_id.map(str::to_string),
            source,
        })?;
        Some(value)
    };

    let mut part = ResponsePart {
        protocol: response.version.map(|v| format!("HTTP/1.{}", v)),
        status: response.code,
        status_message: response
            .reason
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        headers: response
            .headers
            .iter()
            .filter(|h| !h.name.eq_ignore_ascii_case(CONTENT_ID))
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect(),
        body,
    };
    if let Some(id) = correlation_id {
        part.headers.insert(CONTENT_ID.to_string(), id.to_string());
    }
    Ok(part)
}

fn stream_error(err: multer::Error) -> Error {
    match err {
        // Errors from the body stream itself keep their original type.
        multer::Error::StreamReadFailed(source) => match source.downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Error::multipart(other.to_string()),
        },
        other => Error::multipart(other.to_string()),
    }
}

/// Collect every part of the stream, fully decoded, in the order observed,
/// each with the correlation id read from its envelope.
async fn collect_parts(
    body: BoxStream<'static, Bytes>,
    boundary: &str,
) -> Result<Vec<(Option<String>, ResponsePart)>> {
    let mut body = body.peekable();
    if Pin::new(&mut body).peek().await.is_none() {
        return Ok(Vec::new());
    }

    let mut multipart = multer::Multipart::new(body, boundary);
    let mut parts = Vec::new();
    while let Some(mut field) = multipart.next_field().await.map_err(stream_error)? {
        let content_ids: Vec<String> = field
            .headers()
            .get_all("content-id")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let correlation_id = normalize_content_id(&content_ids);

        let mut payload = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(stream_error)? {
            payload.extend_from_slice(&chunk);
        }

        let part = decode_part(correlation_id.as_deref(), &payload)?;
        debug!(
            correlation_id = correlation_id.as_deref().unwrap_or("-"),
            status = ?part.status,
            "decoded batch part"
        );
        parts.push((correlation_id, part));
    }

    Ok(parts)
}

/// Demultiplex a batch response body.
///
/// Every part is decoded before any callback runs, so a malformed part or a
/// broken stream fails the whole batch without side effects. Parts with a
/// registered callback are handed to it together with their extension data;
/// all others land in the aggregate list in the order they were observed.
pub async fn demultiplex(
    body: BoxStream<'static, Bytes>,
    content_type: &str,
    routes: &CorrelationRoutes,
) -> Result<BatchOutcome> {
    let boundary = extract_boundary(content_type)?;
    let parts = collect_parts(body, &boundary).await?;
    if !routes.expected_ids.is_empty() && parts.len() > routes.expected_ids.len() {
        warn!(
            parts = parts.len(),
            requests = routes.expected_ids.len(),
            "batch response has more parts than requests sent"
        );
    }

    let mut aggregate = AggregateResult::default();
    let mut routed = 0usize;
    for (correlation_id, part) in parts {
        let callback = correlation_id
            .as_deref()
            .and_then(|id| routes.callbacks.get(id));
        match (callback, correlation_id.as_deref()) {
            (Some(callback), Some(id)) => {
                let extension = routes.extension_data.get(id).cloned();
                callback(part, extension);
                routed += 1;
            }
            (_, id) => {
                match id {
                    Some(id) if routes.is_unmatched(id) => {
                        warn!(correlation_id = id, "batch part matches no queued request")
                    }
                    Some(_) => {}
                    None => warn!("batch part carried no content-id"),
                }
                aggregate.parts.push(part);
            }
        }
    }

    debug!(
        routed,
        aggregated = aggregate.parts.len(),
        "demultiplexed batch response"
    );

    Ok(BatchOutcome {
        result: aggregate,
        extension_data: routes.extension_data.clone(),
    })
}
