use crate::client::core::Batchelor;
use crate::config::BatchOptions;
use crate::transport::{BatchTransport, HttpTransport};
use crate::types::Method;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Builder for [`Batchelor`] clients.
///
/// Options can come from code, a loaded [`BatchOptions`], or both; later
/// calls override earlier ones.
pub struct BatchelorBuilder {
    options: Option<BatchOptions>,
    transport: Option<Arc<dyn BatchTransport>>,
}

impl BatchelorBuilder {
    pub fn new() -> Self {
        Self {
            options: None,
            transport: None,
        }
    }

    /// Start from a full set of options.
    pub fn options(mut self, options: BatchOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Load options from a YAML or JSON file.
    pub fn options_path(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        self.options = Some(BatchOptions::from_path(path)?);
        Ok(self)
    }

    fn options_mut(&mut self) -> &mut BatchOptions {
        self.options.get_or_insert_with(|| BatchOptions::new(""))
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.options_mut().uri = uri.into();
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.options_mut().method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options_mut().headers.insert(name.into(), value.into());
        self
    }

    /// Bearer token for the outer request.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.options_mut().auth = Some(crate::types::Auth::bearer(token));
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.options_mut().timeout_secs = Some(secs);
        self
    }

    /// Use a custom transport instead of the default [`HttpTransport`].
    pub fn transport(mut self, transport: Arc<dyn BatchTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Batchelor> {
        let options = self.options.ok_or_else(|| {
            Error::validation(
                "options.uri is required",
                ErrorContext::new()
                    .with_field_path("uri")
                    .with_source("builder"),
            )
        })?;
        let transport: Arc<dyn BatchTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };
        Batchelor::with_transport(options, transport)
    }
}

impl Default for BatchelorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_uri() {
        let err = BatchelorBuilder::new().build().unwrap_err();
        assert!(err.is_validation());
        let err = BatchelorBuilder::new().method(Method::Put).build().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_builder_overrides_loaded_options() {
        let client = BatchelorBuilder::new()
            .options(BatchOptions::from_yaml_str("uri: https://example.com/batch\nmethod: PUT\n").unwrap())
            .method(Method::Post)
            .header("X-Goog-User-Project", "demo")
            .bearer("tok")
            .timeout_secs(10)
            .build()
            .unwrap();
        let opts = client.options();
        assert_eq!(opts.method, Method::Post);
        assert_eq!(opts.header("x-goog-user-project"), Some("demo"));
        assert_eq!(opts.content_type(), "multipart/mixed;");
        assert_eq!(opts.timeout_secs, Some(10));
    }
}
