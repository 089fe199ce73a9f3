//! Outer-request options and their loaders.
//!
//! Options can be built in code or loaded from YAML/JSON documents such as:
//!
//! ```yaml
//! uri: https://www.googleapis.com/batch/gmail/v1/
//! method: POST
//! headers:
//!   Content-Type: multipart/mixed
//! auth:
//!   bearer: ya29.token
//! ```

use crate::error::ErrorContext;
use crate::types::{Auth, Method};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Content type of the outer request when none is configured.
pub const DEFAULT_OUTER_CONTENT_TYPE: &str = "multipart/mixed;";

const CONTENT_TYPE: &str = "Content-Type";

fn default_outer_method() -> Method {
    Method::Post
}

/// Options for the single outer request that carries a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_outer_method")]
    pub method: Method,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    /// Per-request timeout handed to the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl BatchOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: default_outer_method(),
            headers: BTreeMap::new(),
            auth: None,
            timeout_secs: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::bearer(token));
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load options from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE)
            .unwrap_or(DEFAULT_OUTER_CONTENT_TYPE)
    }

    /// Validate the options and fill in the outer `Content-Type` default.
    pub(crate) fn prepare(mut self) -> Result<Self> {
        if self.uri.trim().is_empty() {
            return Err(Error::validation(
                "options.uri is required",
                ErrorContext::new()
                    .with_field_path("uri")
                    .with_source("batch_options"),
            ));
        }
        url::Url::parse(&self.uri).map_err(|e| {
            Error::configuration(
                format!("options.uri is not a valid URL: {}", e),
                ErrorContext::new()
                    .with_field_path("uri")
                    .with_details(self.uri.clone())
                    .with_source("batch_options"),
            )
        })?;
        let blank_content_type = self
            .header(CONTENT_TYPE)
            .map_or(true, |v| v.trim().is_empty());
        if blank_content_type {
            self.headers
                .retain(|k, _| !k.eq_ignore_ascii_case(CONTENT_TYPE));
            self.headers.insert(
                CONTENT_TYPE.to_string(),
                DEFAULT_OUTER_CONTENT_TYPE.to_string(),
            );
        }
        Ok(self)
    }
}
