//! Embedding provider contract and the remote service client.
//!
//! The [`EmbeddingProvider`] trait is the capability seam between the
//! corpus builder and whatever computes vectors: the remote contextual
//! service implemented here, or alternative backends (static word
//! vectors, an externally hosted model) supplied by other crates. The
//! backend is selected once at startup; nothing in the hot path
//! type-switches.
//!
//! ## Components
//!
//! - [`EmbeddingProvider`] - the four-operation session contract
//! - [`EmbeddingMatrix`] - the dense `tokens x dim` destination
//! - [`ServiceClient`] - pipelined client for the remote service
//! - [`wire`] - length-prefixed multipart framing and header types

pub mod wire;

mod matrix;
mod provider;
mod service;

pub use matrix::{l2_normalize, EmbeddingMatrix};
pub use provider::EmbeddingProvider;
pub use service::{ServiceClient, ServiceEndpoints};
