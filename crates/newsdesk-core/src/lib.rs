//! Core types and trait definitions for the newsdesk content pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the entity model, the error taxonomy shared by every stage, the
//! [`store::PipelineStore`] abstraction, and the pure algorithms that the
//! stages run: text normalisation, duplicate hashing, fact extraction,
//! reliability scoring and the post-builder transforms.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analysis;
pub mod audit;
pub mod build;
pub mod dedupe;
pub mod error;
pub mod extract;
pub mod fact;
pub mod normalize;
pub mod post;
pub mod source;
pub mod store;
pub mod topic;
pub mod verification;
pub mod verify;

pub use error::{Entity, Error, ErrorKind, Result};
pub use topic::Topic;
