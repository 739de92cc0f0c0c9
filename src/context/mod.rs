//! Worker context abstraction
//!
//! A `WorkerContext` is responsible for turning a flag vector into a built
//! artifact and then into a score. Different contexts use different build
//! pipelines (a single translation unit, an archive driven by `make`, ...) to
//! achieve varying levels of realism for the thing being tuned.
//!
//! # Architecture
//!
//! The `WorkerContext` trait provides a uniform interface so the build/benchmark
//! pool can stay agnostic to what is actually being compiled and measured,
//! enabling the `--context` flag to select among implementations at runtime.
//!
//! # Context kinds
//!
//! - **single_file**: compiles a two-file C microbenchmark, runs it under a
//!   timeout (or sizes it), baseline-simple and always available.
//! - **archive**: unpacks a source tarball and drives a `make`-based build,
//!   for tuning a real multi-file target.
//!
//! # Example
//!
//! ```no_run
//! use ceflags::context::{WorkerContext, Direction};
//! use ceflags::context::single_file::SingleFileContext;
//!
//! let mut ctx = SingleFileContext::new("cc".into(), "execution".into(), std::path::PathBuf::from("/tmp/w0"));
//! ctx.init_workspace().expect("failed to initialize workspace");
//! let outcome = ctx.compile(&["-O2".to_string()]).expect("compile failed");
//! if outcome.ok {
//!     let _score = ctx.benchmark();
//! }
//! ```

use crate::Result;

/// Outcome of a single compile invocation.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// Whether the compiler accepted the flags and produced an artifact.
    pub ok: bool,
    /// SHA-256 digest (hex) of the produced artifact. Only meaningful when `ok`.
    pub checksum: String,
}

impl CompileOutcome {
    pub fn failed() -> Self {
        Self {
            ok: false,
            checksum: String::new(),
        }
    }
}

/// Which way a score is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lower score is better (e.g. wall-clock time).
    Minimize,
    /// Higher score is better (e.g. throughput).
    Maximize,
}

impl Direction {
    /// True if `challenger` is strictly better than `incumbent` in this direction.
    pub fn better(&self, challenger: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => challenger < incumbent,
            Direction::Maximize => challenger > incumbent,
        }
    }

    pub fn worst_sortable(&self) -> f64 {
        match self {
            Direction::Minimize => f64::INFINITY,
            Direction::Maximize => f64::NEG_INFINITY,
        }
    }
}

/// Pluggable build+benchmark backend for the combined-elimination search.
///
/// # Lifecycle
///
/// 1. Construct via a concrete type's own constructor (one instance per worker).
/// 2. `init_workspace()` once, before any jobs are submitted.
/// 3. For each job: `compile()` then, if `ok`, `benchmark()`.
///
/// # Thread Safety
///
/// Each worker owns an exclusive context instance and workspace directory;
/// contexts need not be `Sync`, only `Send`.
///
/// # Error Handling
///
/// `compile` returns `Err` only for unexpected failures (e.g. the workspace
/// directory disappeared); an ordinary compiler rejection is reported as
/// `CompileOutcome { ok: false, .. }`, not an `Err`.
pub trait WorkerContext: Send {
    /// One-time setup in the worker's exclusive directory (unpack sources,
    /// write harness files, etc). May run concurrently across workers.
    fn init_workspace(&mut self) -> Result<()>;

    /// Objective names this context knows how to measure.
    fn available_benchmark_types(&self) -> &'static [&'static str];

    /// Compile the target with the given command-line flags.
    fn compile(&mut self, flags: &[String]) -> Result<CompileOutcome>;

    /// Measure the artifact produced by the most recent successful `compile`.
    /// Returns `None` on failure or timeout.
    fn benchmark(&mut self) -> Option<f64>;

    /// Which way the benchmark's score is better.
    fn direction(&self) -> Direction;

    /// The value used to sort a failed job to the bottom of the ranking.
    fn worst_sortable(&self) -> f64 {
        self.direction().worst_sortable()
    }
}

pub mod archive;
pub mod single_file;

/// SHA-256 digest (hex) of a file's contents, used as the result cache key.
pub fn sha256_file(path: &std::path::Path) -> Result<String> {
    use anyhow::Context as _;
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut file = std::fs::File::open(path)
        .with_context(|| format!("opening {} for checksumming", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Run a child process to completion, killing it if it outlives `timeout`.
/// Returns `None` if the process timed out or exited non-zero.
pub fn run_with_timeout(
    mut command: std::process::Command,
    timeout: std::time::Duration,
) -> Option<std::time::Duration> {
    use std::time::Instant;

    let start = Instant::now();
    let mut child = command.spawn().ok()?;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return if status.success() {
                    Some(start.elapsed())
                } else {
                    None
                };
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
            Err(_) => return None,
        }
    }
}

/// Build a context from its CLI name.
pub fn create_context(
    kind: crate::config::cli::ContextKind,
    cc: String,
    benchmark: String,
    workspace: std::path::PathBuf,
) -> Result<Box<dyn WorkerContext>> {
    use crate::config::cli::ContextKind;
    match kind {
        ContextKind::SingleFile => Ok(Box::new(single_file::SingleFileContext::new(
            cc, benchmark, workspace,
        ))),
        ContextKind::Archive => Ok(Box::new(archive::ArchiveContext::new(
            cc, benchmark, workspace,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimize_direction_prefers_lower() {
        assert!(Direction::Minimize.better(1.0, 2.0));
        assert!(!Direction::Minimize.better(2.0, 1.0));
        assert_eq!(Direction::Minimize.worst_sortable(), f64::INFINITY);
    }

    #[test]
    fn maximize_direction_prefers_higher() {
        assert!(Direction::Maximize.better(2.0, 1.0));
        assert!(!Direction::Maximize.better(1.0, 2.0));
        assert_eq!(Direction::Maximize.worst_sortable(), f64::NEG_INFINITY);
    }
}
