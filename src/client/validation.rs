//! 子请求校验：入队前检查必填字段，失败即同步返回错误。
//!
//! Add-time sub-request validation.

use crate::types::SubRequest;
use crate::{Error, ErrorContext, Result};
use std::collections::HashSet;

fn invalid(message: impl Into<String>, field: &str, request: &SubRequest) -> Error {
    Error::validation(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_details(format!("{} {}", request.method, request.path))
            .with_source("add"),
    )
}

/// Check the fields every queued sub-request must carry.
///
/// `path` is always required. Methods that carry a body (POST, PUT, PATCH)
/// also need `parameters` with a non-empty `body`. A caller-supplied
/// correlation id must not collide with one already queued.
pub(crate) fn validate_sub_request(request: &SubRequest, queued_ids: &HashSet<String>) -> Result<()> {
    if request.path.trim().is_empty() {
        return Err(invalid("options.path is a required argument", "path", request));
    }

    if request.method.requires_body() {
        let params = request.parameters.as_ref().ok_or_else(|| {
            invalid(
                format!("when using {}: options.parameters is required", request.method),
                "parameters",
                request,
            )
        })?;
        if !params.has_body() {
            return Err(invalid(
                format!("when using {}: options.parameters.body is required", request.method),
                "parameters.body",
                request,
            ));
        }
    }

    if let Some(id) = request.correlation_id.as_deref() {
        if id.trim().is_empty() {
            return Err(invalid("correlation id must not be blank", "correlation_id", request));
        }
        if queued_ids.contains(id) {
            return Err(invalid(
                format!("correlation id {:?} is already queued in this batch", id),
                "correlation_id",
                request,
            ));
        }
    }

    Ok(())
}
