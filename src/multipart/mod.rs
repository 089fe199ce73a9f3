//! multipart/mixed 编码：子请求编码、边界解析与外层请求体序列化。
//!
//! # Multipart Encoding
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`encode`] | Sub-requests to `application/http` parts, outer body serialization |
//! | [`extract_boundary`] | Boundary token from a `Content-Type` header |
//!
//! Response parts are split by [`crate::demux`].

pub mod boundary;
pub mod encode;

pub use boundary::extract_boundary;
pub use encode::{
    encode, encode_part, generate_boundary, outer_content_type, outer_framing, serialize_body,
    EncodedPart, PART_CONTENT_TYPE,
};
