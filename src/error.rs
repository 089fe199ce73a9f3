use thiserror::Error;

/// Structured error context for validation and configuration failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "options.uri", "requests[2].parameters.body")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected value, method in use)
    pub details: Option<String>,
    /// Source of the error (e.g., "add", "options_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for batch assembly, dispatch and demultiplexing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Request did not return 200 OK: {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Problem getting boundary data from content-type {content_type:?}")]
    BoundaryNotFound { content_type: String },

    #[error("Malformed multipart response: {message}")]
    Multipart { message: String },

    #[error("Failed to decode JSON body of part {}: {source}", .correlation_id.as_deref().unwrap_or("<no content-id>"))]
    Decode {
        correlation_id: Option<String>,
        #[source]
        source: serde_json::Error,
    },

    #[error("A batch is already in flight on this client")]
    BatchInFlight,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub(crate) fn multipart(msg: impl Into<String>) -> Self {
        Error::Multipart {
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Failures of the outer request itself: socket errors, timeouts and non-200 statuses.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::UnexpectedStatus { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_includes_context() {
        let err = Error::validation(
            "options.path is a required argument",
            ErrorContext::new()
                .with_field_path("path")
                .with_source("add"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Validation error: options.path is a required argument"));
        assert!(msg.contains("field: path"));
        assert!(msg.contains("source: add"));
        assert!(err.is_validation());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_context_absent_for_wire_errors() {
        let err = Error::BoundaryNotFound {
            content_type: "text/plain".into(),
        };
        assert!(err.context().is_none());
        assert!(err.to_string().contains("text/plain"));
    }

    #[test]
    fn test_unexpected_status_is_transport() {
        let err = Error::UnexpectedStatus { status: 503 };
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Request did not return 200 OK: 503");
    }

    #[test]
    fn test_empty_context_formats_cleanly() {
        let err = Error::configuration("bad uri", ErrorContext::default());
        assert_eq!(err.to_string(), "Configuration error: bad uri");
    }
}
