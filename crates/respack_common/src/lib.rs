//! Shared foundational types used across the respack resource pipeline.
//!
//! This crate provides the 128-bit content digest used for change detection,
//! the deduplicating error collector returned at the end of every run, and the
//! cooperative cancellation token checked by long-running walks.

#![warn(missing_docs)]

pub mod cancel;
pub mod digest;
pub mod errors;

pub use cancel::CancelToken;
pub use digest::{Digest, DigestBuilder, ParseDigestError};
pub use errors::ErrorSet;
