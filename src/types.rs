//! Core data model: queued sub-requests and demultiplexed response parts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Header map of a parsed embedded HTTP message.
pub type Headers = BTreeMap<String, String>;

/// Callback invoked with one sub-request's parsed result and its extension data.
pub type PartCallback = Arc<dyn Fn(ResponsePart, Option<Value>) + Send + Sync>;

/// Default content type of a sub-request body.
pub const DEFAULT_BODY_CONTENT_TYPE: &str = "application/json;";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Methods whose sub-requests must carry `parameters.body`.
    pub fn requires_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Bearer credentials, either for the outer request or a single sub-request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
}

impl Auth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    /// The token, if present and non-empty.
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_deref().filter(|t| !t.is_empty())
    }
}

/// Body of a non-GET sub-request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(
        default = "default_body_content_type",
        alias = "contentType",
        alias = "Content-Type"
    )]
    pub content_type: String,
    #[serde(default)]
    pub body: Value,
}

fn default_body_content_type() -> String {
    DEFAULT_BODY_CONTENT_TYPE.to_string()
}

impl Parameters {
    pub fn json(body: Value) -> Self {
        Self {
            content_type: default_body_content_type(),
            body,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Null, empty strings, and empty objects or arrays count as a missing body.
    pub fn has_body(&self) -> bool {
        match &self.body {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Object(m) => !m.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        }
    }
}

/// One queued API call.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SubRequest {
    #[serde(
        default,
        alias = "requestId",
        alias = "content_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(skip)]
    pub callback: Option<PartCallback>,
    #[serde(default, alias = "extend", skip_serializing_if = "Option::is_none")]
    pub extension_data: Option<Value>,
}

impl SubRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_parameters(Parameters::json(body))
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::bearer(token));
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ResponsePart, Option<Value>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn with_extension_data(mut self, data: Value) -> Self {
        self.extension_data = Some(data);
        self
    }

    /// Correlation id; empty until the request has been queued.
    pub fn correlation_id(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or_default()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.auth.as_ref().and_then(Auth::bearer_token)
    }
}

impl fmt::Debug for SubRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubRequest")
            .field("correlation_id", &self.correlation_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("parameters", &self.parameters)
            .field("has_auth", &self.bearer_token().is_some())
            .field("has_callback", &self.callback.is_some())
            .field("extension_data", &self.extension_data)
            .finish()
    }
}

/// A single demultiplexed result: the embedded HTTP response of one part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ResponsePart {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Correlation id written by the demultiplexer, if the part carried one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.headers.get(CONTENT_ID).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }
}

/// Header key under which the normalized correlation id is exposed.
pub const CONTENT_ID: &str = "Content-ID";

/// Parts that had no dedicated callback, in the order they were observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub parts: Vec<ResponsePart>,
    pub errors: usize,
}

/// Final result of one `run()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub result: AggregateResult,
    pub extension_data: HashMap<String, Value>,
}
