//! ceflags - Combined-elimination compiler flag auto-tuner
//!
//! ceflags searches a C compiler's flag space for a configuration that optimizes
//! a quantitative objective (execution time, binary size, ...) using Combined
//! Elimination: a greedy hill-climb that perturbs every flag once per iteration
//! and promotes the single best improving change.
//!
//! # Architecture
//!
//! - **Flag model**: multi-valued categorical flags with per-state exclusions
//! - **Worker contexts**: pluggable compile/benchmark backends
//! - **Build/benchmark pool**: parallel workers sharing a content-addressed result cache
//! - **CEEngine / MinimizeEngine**: the tuning driver and its bisection companion

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod gen;
pub mod minimize;
pub mod pool;
pub mod validator;
pub mod workspace;

pub use config::FlagSetConfig;
pub use context::WorkerContext;
pub use engine::CEEngine;
pub use error::TunerError;

/// Result type used throughout ceflags
pub type Result<T> = anyhow::Result<T>;
