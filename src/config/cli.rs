//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Objective direction a worker context optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContextKind {
    /// Two-file C microbenchmark: compile, run, time it.
    SingleFile,
    /// Archive/`make`-driven build + run pipeline.
    Archive,
}

/// ceflags - Combined-elimination compiler flag auto-tuner
#[derive(Parser, Debug)]
#[command(name = "ceflags")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Compiler to drive (must understand `-v`, `-Q --help=params`, `-Q --help=optimizers`)
    #[arg(long, default_value = "cc")]
    pub cc: String,

    /// Worker context to build and benchmark with
    #[arg(long, value_enum, default_value = "single-file")]
    pub context: ContextKind,

    /// Objective to optimize (must be one the chosen context advertises)
    #[arg(long, default_value = "execution")]
    pub benchmark: String,

    /// Number of parallel build/benchmark workers
    #[arg(short = 'j', long = "processes")]
    pub processes: Option<usize>,

    /// Starting flag-set configuration (TOML). When absent, flags are
    /// generated by introspecting the compiler.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory under which a timestamped run directory is created
    #[arg(long, default_value = "workspace")]
    pub workspace_root: PathBuf,

    /// Only initialize worker workspaces and exit (smoke test the context)
    #[arg(long)]
    pub setup_workspace_only: bool,

    /// After promoting a flag, also exclude every perturbation that did not
    /// beat the baseline this iteration
    #[arg(long)]
    pub drop_pessimizing_flags: bool,

    /// Maximum number of CE iterations (0 = unbounded, stop only at a local optimum)
    #[arg(long, default_value = "0")]
    pub max_iterations: usize,

    /// Print per-job diagnostics (compiler stdout/stderr, subprocess timing)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cc.trim().is_empty() {
            anyhow::bail!("--cc must name a compiler executable");
        }
        if self.benchmark.trim().is_empty() {
            anyhow::bail!("--benchmark must not be empty");
        }
        if let Some(processes) = self.processes {
            if processes == 0 {
                anyhow::bail!("--processes must be at least 1");
            }
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.processes.unwrap_or_else(num_cpus::get)
    }
}

/// minimize-flags - bisect a flag set down to the minimal subset reproducing a target score
#[derive(Parser, Debug)]
#[command(name = "minimize-flags")]
#[command(version, about, long_about = None)]
pub struct MinimizeCli {
    /// Compiler to drive
    #[arg(long, default_value = "cc")]
    pub cc: String,

    /// Worker context to build and benchmark with
    #[arg(long, value_enum, default_value = "single-file")]
    pub context: ContextKind,

    /// Objective to optimize
    #[arg(long, default_value = "execution")]
    pub benchmark: String,

    /// Exact score the minimized subset must reproduce
    #[arg(long)]
    pub target: f64,

    /// Flag-set configuration to minimize from (only flags not at state 0 are candidates)
    #[arg(long)]
    pub starting_flags: PathBuf,

    /// Print per-job diagnostics
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl MinimizeCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cc.trim().is_empty() {
            anyhow::bail!("--cc must name a compiler executable");
        }
        if !self.target.is_finite() {
            anyhow::bail!("--target must be a finite number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_processes() {
        let cli = Cli {
            cc: "cc".into(),
            context: ContextKind::SingleFile,
            benchmark: "execution".into(),
            processes: Some(0),
            config: None,
            workspace_root: "workspace".into(),
            setup_workspace_only: false,
            drop_pessimizing_flags: false,
            max_iterations: 0,
            verbose: false,
        };
        assert!(cli.validate().is_err());
    }
}
