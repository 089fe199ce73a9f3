//! Batch client: queue sub-requests, run them as one multipart request.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod state;
mod validation;

pub use builder::BatchelorBuilder;
pub use core::Batchelor;
pub use state::ClientState;
