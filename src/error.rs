//! Typed errors for fatal, setup-level failures.
//!
//! Per-job compile/benchmark failures are never represented here — they are
//! data (`score: None`), not errors, and never unwind past the worker pool.
//! These variants cover only the configuration- and setup-level failures
//! that abort the process.

use thiserror::Error;

/// A fatal, setup-level failure. Converts into `anyhow::Error` at every call
/// site via `?`; the driver binaries print it and exit non-zero.
#[derive(Debug, Error)]
pub enum TunerError {
    /// `--benchmark` named an objective the selected context doesn't advertise.
    #[error("unknown benchmark '{name}'; this context supports: {}", .available.join(", "))]
    UnknownBenchmark { name: String, available: Vec<String> },

    /// The starting configuration's baseline failed to compile or benchmark.
    #[error("baseline configuration failed to compile or benchmark")]
    BaselineUnmeasurable,

    /// A loaded or generated `FlagSetConfig` violated its own invariants.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// At least one worker failed to initialize its workspace.
    #[error("worker {worker} failed to initialize its workspace: {message}")]
    WorkspaceInit { worker: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_benchmark_message_lists_alternatives() {
        let err = TunerError::UnknownBenchmark {
            name: "bogus".to_string(),
            available: vec!["execution".to_string(), "size".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("execution, size"));
    }

    #[test]
    fn baseline_unmeasurable_has_a_stable_message() {
        assert_eq!(
            TunerError::BaselineUnmeasurable.to_string(),
            "baseline configuration failed to compile or benchmark"
        );
    }
}
