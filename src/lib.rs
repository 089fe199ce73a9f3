//! # batchelor
//!
//! 将多个独立的 HTTP API 调用合并为一个 multipart 批量请求，并把响应拆分回各自的调用方。
//!
//! Batch many small HTTP API calls into a single `multipart/mixed` request,
//! send it to a batch-capable endpoint (such as Google's batch APIs), and
//! demultiplex the multipart response back to the caller of each call.
//!
//! ## Overview
//!
//! Each queued [`SubRequest`] becomes one `application/http` part tagged
//! with a `Content-ID`. The response parts are matched back by that id:
//! parts with a per-request callback are handed to it, the rest are
//! collected in an ordered [`AggregateResult`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchelor::{BatchOptions, Batchelor, SubRequest};
//!
//! #[tokio::main]
//! async fn main() -> batchelor::Result<()> {
//!     let client = Batchelor::new(
//!         BatchOptions::new("https://www.googleapis.com/batch/gmail/v1/").with_bearer("ya29.token"),
//!     )?;
//!
//!     client
//!         .add(SubRequest::get("/gmail/v1/users/me/messages/172166a90d50fe37"))?
//!         .add(SubRequest::get("/gmail/v1/users/me/messages/172163f16b503c65"))?;
//!
//!     let outcome = client.run().await?;
//!     for part in &outcome.result.parts {
//!         println!("{:?} {:?}", part.status, part.body);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Batchelor`] façade: add / run / reset |
//! | [`multipart`] | Part encoding, boundary parsing, outer body framing |
//! | [`demux`] | Response demultiplexing and correlation routing |
//! | [`transport`] | Outer request transport (reqwest by default) |
//! | [`config`] | Outer request options and loaders |
//! | [`types`] | Sub-requests, response parts and outcomes |

pub mod client;
pub mod config;
pub mod demux;
pub mod multipart;
pub mod transport;
pub mod types;

pub use client::{Batchelor, BatchelorBuilder, ClientState};
pub use config::BatchOptions;
pub use types::{
    AggregateResult, Auth, BatchOutcome, Method, Parameters, PartCallback, ResponsePart,
    SubRequest,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
