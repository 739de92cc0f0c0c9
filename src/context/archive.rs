//! Archive worker context
//!
//! Unpacks a source tarball into the worker's workspace and drives a
//! `make`-based build + run pipeline, for tuning flags against a real
//! multi-file target rather than a synthetic microbenchmark.
//!
//! Modelled on a RISC-V core simulation context: the source archive and the
//! run/verify steps are both external to this crate (out of scope per the
//! build/benchmark-procedure boundary), configured here through environment
//! variables so no target-specific paths are hard-coded into the binary.

use super::{sha256_file, CompileOutcome, Direction, WorkerContext};
use crate::Result;
use anyhow::Context as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

const RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable naming the tarball to unpack into each worker's workspace.
pub const SOURCE_ARCHIVE_ENV: &str = "CEFLAGS_SOURCE_ARCHIVE";
/// Environment variable naming an extra directory injected into the build/run
/// environment (e.g. a toolchain root), forwarded to `make` verbatim.
pub const TARGET_ROOT_ENV: &str = "CEFLAGS_TARGET_ROOT";

pub struct ArchiveContext {
    cc: String,
    benchmark: String,
    workspace: PathBuf,
    binary_path: PathBuf,
}

impl ArchiveContext {
    pub fn new(cc: String, benchmark: String, workspace: PathBuf) -> Self {
        let binary_path = workspace.join("target.elf");
        Self {
            cc,
            benchmark,
            workspace,
            binary_path,
        }
    }

    fn target_root(&self) -> Option<String> {
        std::env::var(TARGET_ROOT_ENV).ok()
    }

    fn size_of_binary(&self) -> Option<f64> {
        let output = Command::new("size")
            .arg(&self.binary_path)
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let totals = stdout.lines().last()?;
        let text = totals.split_whitespace().next()?;
        text.parse::<f64>().ok()
    }

    fn run_and_count_ticks(&self) -> Option<f64> {
        let mut cmd = Command::new("make");
        cmd.current_dir(&self.workspace)
            .arg("run")
            .stdin(Stdio::null());
        if let Some(root) = self.target_root() {
            cmd.env("TARGET_ROOT", root);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());

        let start = std::time::Instant::now();
        let mut child = cmd.spawn().ok()?;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        return None;
                    }
                    break;
                }
                Ok(None) => {
                    if start.elapsed() >= RUN_TIMEOUT {
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(_) => return None,
            }
        }
        let stdout = child.stdout.take()?;
        use std::io::Read;
        let mut text = String::new();
        let mut stdout = stdout;
        stdout.read_to_string(&mut text).ok()?;
        parse_tick_count(&text)
    }
}

/// Extract the first `Total ticks : N` style line from simulator output.
fn parse_tick_count(output: &str) -> Option<f64> {
    for line in output.lines() {
        if let Some(idx) = line.find("Total ticks") {
            let rest = &line[idx..];
            if let Some(colon) = rest.find(':') {
                let digits: String = rest[colon + 1..]
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(value) = digits.parse::<f64>() {
                    return Some(value);
                }
            }
        }
    }
    None
}

impl WorkerContext for ArchiveContext {
    fn init_workspace(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.workspace)
            .with_context(|| format!("creating workspace {}", self.workspace.display()))?;

        if let Ok(archive) = std::env::var(SOURCE_ARCHIVE_ENV) {
            let status = Command::new("tar")
                .args(["xf", &archive, "-C"])
                .arg(&self.workspace)
                .stdin(Stdio::null())
                .status()
                .context("unpacking source archive")?;
            if !status.success() {
                anyhow::bail!("failed to unpack source archive {archive}");
            }
        }
        Ok(())
    }

    fn available_benchmark_types(&self) -> &'static [&'static str] {
        &["execution", "size"]
    }

    fn compile(&mut self, flags: &[String]) -> Result<CompileOutcome> {
        let mut cmd = Command::new("make");
        cmd.current_dir(&self.workspace)
            .env("CC", &self.cc)
            .env("CFLAGS", flags.join(" "))
            .stdin(Stdio::null());
        if let Some(root) = self.target_root() {
            cmd.env("TARGET_ROOT", root);
        }
        let output = cmd.output().context("spawning make")?;

        if !output.status.success() || !self.binary_path.exists() {
            return Ok(CompileOutcome::failed());
        }

        let checksum = sha256_file(&self.binary_path)?;
        Ok(CompileOutcome { ok: true, checksum })
    }

    fn benchmark(&mut self) -> Option<f64> {
        match self.benchmark.as_str() {
            "size" => self.size_of_binary(),
            _ => self.run_and_count_ticks(),
        }
    }

    fn direction(&self) -> Direction {
        Direction::Minimize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tick_count_line() {
        let output = "some noise\nTotal ticks      : 128933\nmore noise\n";
        assert_eq!(parse_tick_count(output), Some(128933.0));
    }

    #[test]
    fn missing_tick_line_returns_none() {
        assert_eq!(parse_tick_count("nothing useful here"), None);
    }

    #[test]
    fn advertises_execution_and_size() {
        let ctx = ArchiveContext::new("cc".into(), "execution".into(), "/tmp".into());
        assert_eq!(ctx.available_benchmark_types(), &["execution", "size"]);
    }
}
