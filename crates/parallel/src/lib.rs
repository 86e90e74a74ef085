//! # GeoLocus Parallel
//!
//! Parallel processing strategies for per-observation analyses.
//!
//! This crate provides:
//! - Index-range fan-out with ordered collection (one result slot per observation)
//! - Sequential, all-core and fixed-size pool modes using Rayon
//! - Cooperative cancellation checked at fan-out boundaries
//!
//! Without the `parallel` feature every mode runs sequentially.

pub mod cancel;
pub mod strategy;

pub use cancel::CancelToken;
pub use strategy::{available_threads, Execution, ParallelStrategy, ProcessingMode};
