//! Single-file worker context
//!
//! Compiles a two-file C microbenchmark (`main.c` drives `work.c` in a loop)
//! and either times its execution or sizes the resulting binary.

use super::{sha256_file, CompileOutcome, Direction, WorkerContext};
use crate::Result;
use anyhow::Context as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

const MAIN_C: &str = r#"
#include <stdio.h>
#include <time.h>

extern void work(void);

int main(void) {
    for (long i = 0; i < 2000000L; i++) {
        work();
    }
    return 0;
}
"#;

const WORK_C: &str = r#"
volatile long sink;

void work(void) {
    long acc = 0;
    for (int i = 0; i < 64; i++) {
        acc += i * i;
    }
    sink = acc;
}
"#;

const BENCHMARK_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SingleFileContext {
    cc: String,
    benchmark: String,
    workspace: PathBuf,
    binary_path: PathBuf,
}

impl SingleFileContext {
    pub fn new(cc: String, benchmark: String, workspace: PathBuf) -> Self {
        let binary_path = workspace.join("work");
        Self {
            cc,
            benchmark,
            workspace,
            binary_path,
        }
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
        let data_line = stdout.lines().nth(1)?;
        let text = data_line.split_whitespace().next()?;
        text.parse::<f64>().ok()
    }

    fn run_timed(&self) -> Option<f64> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        super::run_with_timeout(cmd, BENCHMARK_TIMEOUT).map(|d| d.as_secs_f64())
    }
}

impl WorkerContext for SingleFileContext {
    fn init_workspace(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.workspace)
            .with_context(|| format!("creating workspace {}", self.workspace.display()))?;
        std::fs::write(self.workspace.join("main.c"), MAIN_C)?;
        std::fs::write(self.workspace.join("work.c"), WORK_C)?;
        Ok(())
    }

    fn available_benchmark_types(&self) -> &'static [&'static str] {
        &["execution", "size"]
    }

    fn compile(&mut self, flags: &[String]) -> Result<CompileOutcome> {
        let output = Command::new(&self.cc)
            .current_dir(&self.workspace)
            .args(flags)
            .args(["main.c", "work.c", "-o", "work"])
            .stdin(Stdio::null())
            .output()
            .context("spawning compiler")?;

        if !output.status.success() {
            return Ok(CompileOutcome::failed());
        }

        let checksum = sha256_file(&self.binary_path)?;
        Ok(CompileOutcome { ok: true, checksum })
    }

    fn benchmark(&mut self) -> Option<f64> {
        match self.benchmark.as_str() {
            "size" => self.size_of_binary(),
            _ => self.run_timed(),
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
    fn init_workspace_writes_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = SingleFileContext::new(
            "cc".to_string(),
            "execution".to_string(),
            dir.path().to_path_buf(),
        );
        ctx.init_workspace().unwrap();
        assert!(dir.path().join("main.c").exists());
        assert!(dir.path().join("work.c").exists());
    }

    #[test]
    fn advertises_execution_and_size() {
        let ctx = SingleFileContext::new("cc".into(), "execution".into(), "/tmp".into());
        assert_eq!(ctx.available_benchmark_types(), &["execution", "size"]);
    }

    #[test]
    fn direction_is_minimize() {
        let ctx = SingleFileContext::new("cc".into(), "execution".into(), "/tmp".into());
        assert_eq!(ctx.direction(), Direction::Minimize);
    }
}
