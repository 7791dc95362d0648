//! Batch-and-stream file processing server.
//!
//! Clients submit files together with an ordered list of operations
//! (validate, metadata, OCR, resize, compress, convert, store). Every
//! (file, operation) pair is scheduled onto a bounded worker pool and the
//! per-operation results are returned either as one aggregated summary or
//! streamed back as they complete.
//!
//! Layering, leaves first:
//! - [`operations`]: pure byte-in/byte-out transforms, no scheduling awareness.
//! - [`workflow`]: task model, adaptive worker pool, workflow executor.
//! - [`metrics`]: atomic counters for tasks and requests.
//! - [`api`]: the Rocket wire surface adapting HTTP to the core.

pub mod api;
pub mod common;
pub mod config;
pub mod metrics;
pub mod models;
pub mod operations;
pub mod workflow;
