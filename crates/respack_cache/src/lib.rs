//! Change detection and build artifact caching.
//!
//! [`ContentHasher`] computes and persists the digests that decide whether a
//! directory needs rebuilding. [`BuildCacheClient`] stores and retrieves the
//! output of a rebuild under a [`CacheKey`], either in a local directory
//! ([`LocalStore`]) or on a remote [`CacheServer`].

#![warn(missing_docs)]

pub mod artifact;
pub mod client;
pub mod error;
pub mod hasher;
pub mod key;
pub mod manifest;
pub mod protocol;
pub mod remote;
pub mod server;
pub mod store;

pub use artifact::{ArtifactDescription, ArtifactRecord, ArtifactSet};
pub use client::{BuildCacheClient, CacheBackend};
pub use error::CacheError;
pub use hasher::ContentHasher;
pub use key::CacheKey;
pub use manifest::StoreManifest;
pub use remote::RemoteCache;
pub use server::CacheServer;
pub use store::LocalStore;
