//! Sub-request encoding and outer `multipart/mixed` body serialization.

use crate::multipart::extract_boundary;
use crate::types::{Method, SubRequest};
use crate::Result;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

/// Envelope content type of every encoded part.
pub const PART_CONTENT_TYPE: &str = "application/http";

/// One outer-body part: envelope headers plus a raw HTTP request text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPart {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl EncodedPart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_id(&self) -> Option<&str> {
        self.header("Content-ID")
    }
}

/// Encode queued sub-requests, one part each, in queue order.
pub fn encode(requests: &[SubRequest]) -> Result<Vec<EncodedPart>> {
    let parts = requests
        .iter()
        .map(encode_part)
        .collect::<Result<Vec<_>>>()?;
    debug!(parts = parts.len(), "encoded batch parts");
    Ok(parts)
}

/// Encode a single sub-request as an `application/http` part.
///
/// GET-like requests become `METHOD path` plus an optional bearer line.
/// Requests with parameters additionally carry the body content type and
/// the JSON-serialized body after a blank line. The bearer line is kept in
/// both forms.
pub fn encode_part(request: &SubRequest) -> Result<EncodedPart> {
    let mut body = format!("{} {}\n", request.method, request.path);

    if let Some(token) = request.bearer_token() {
        body.push_str("Authorization: Bearer ");
        body.push_str(token);
        body.push('\n');
    }

    if request.method != Method::Get {
        if let Some(params) = &request.parameters {
            body.push_str("Content-Type: ");
            body.push_str(&params.content_type);
            body.push_str("\n\n");
            body.push_str(&serde_json::to_string(&params.body)?);
        }
    }

    Ok(EncodedPart {
        headers: vec![
            ("Content-Type".to_string(), PART_CONTENT_TYPE.to_string()),
            (
                "Content-ID".to_string(),
                request.correlation_id().to_string(),
            ),
        ],
        body,
    })
}

/// Outer `Content-Type` for a body delimited by `boundary`.
pub fn outer_content_type(configured: &str, boundary: &str) -> String {
    let base = configured.trim().trim_end_matches(';').trim_end();
    format!("{}; boundary={}", base, boundary)
}

/// Boundary and outer `Content-Type` for one outer body.
///
/// A boundary already named by the configured value frames the body as-is;
/// otherwise a fresh one is generated and appended.
pub fn outer_framing(configured: &str) -> (String, String) {
    match extract_boundary(configured) {
        Ok(boundary) => (boundary, configured.trim().to_string()),
        Err(_) => {
            let boundary = generate_boundary();
            let content_type = outer_content_type(configured, &boundary);
            (boundary, content_type)
        }
    }
}

/// Fresh boundary token for one outer body.
pub fn generate_boundary() -> String {
    format!("batch_{}", uuid::Uuid::new_v4().simple())
}

/// Serialize parts into a `multipart/mixed` body.
pub fn serialize_body(boundary: &str, parts: &[EncodedPart]) -> Bytes {
    let mut buf = BytesMut::new();
    for part in parts {
        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"\r\n");
        for (name, value) in &part.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(part.body.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"--");
    buf.put_slice(boundary.as_bytes());
    buf.put_slice(b"--\r\n");
    buf.freeze()
}
