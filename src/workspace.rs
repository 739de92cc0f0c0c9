//! Run directory layout and iteration artifacts
//!
//! Every invocation creates one timestamped run directory holding a worker
//! subdirectory per pool slot, a mirrored log file, per-iteration snapshots,
//! and an append-only leaderboard.

use crate::config::FlagSetConfig;
use crate::Result;
use anyhow::Context as _;
use chrono::Local;
use rand::Rng;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RunWorkspace {
    root: PathBuf,
    log_file: File,
    leaderboard: File,
}

impl RunWorkspace {
    /// Create `<workspace_root>/YYYYMMDD-HHMMSS-XXXX/` plus one subdirectory
    /// per worker, the log file, and the live leaderboard.
    pub fn create(workspace_root: &Path, worker_count: usize) -> Result<Self> {
        let root = workspace_root.join(run_directory_name());
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating run directory {}", root.display()))?;

        for idx in 0..worker_count {
            std::fs::create_dir_all(root.join(idx.to_string()))
                .with_context(|| format!("creating worker directory {idx}"))?;
        }

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(root.join("log.txt"))
            .context("opening log.txt")?;

        let leaderboard = OpenOptions::new()
            .create(true)
            .append(true)
            .open(root.join("global_leaderboard.live"))
            .context("opening global_leaderboard.live")?;

        Ok(Self {
            root,
            log_file,
            leaderboard,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn worker_dir(&self, idx: usize) -> PathBuf {
        self.root.join(idx.to_string())
    }

    /// Print to stderr and append the same line to `log.txt`.
    pub fn log(&mut self, line: &str) {
        eprintln!("{line}");
        let _ = writeln!(self.log_file, "{line}");
        let _ = self.log_file.flush();
    }

    /// Append one `flags,score` row, flushed immediately.
    pub fn append_leaderboard(&mut self, flags: &[String], score: f64) {
        let _ = writeln!(self.leaderboard, "{},{score}", flags.join(" "));
        let _ = self.leaderboard.flush();
    }

    /// Write `iteration.N`, `iteration.N.flags`, and `iteration.N.config` for
    /// one completed CE iteration.
    pub fn write_iteration(
        &self,
        n: usize,
        summary: &str,
        config: &FlagSetConfig,
    ) -> Result<()> {
        std::fs::write(self.root.join(format!("iteration.{n}")), summary)
            .with_context(|| format!("writing iteration.{n}"))?;
        std::fs::write(
            self.root.join(format!("iteration.{n}.flags")),
            config.command_line().join(" "),
        )
        .with_context(|| format!("writing iteration.{n}.flags"))?;
        crate::config::toml::write_toml_file(
            &self.root.join(format!("iteration.{n}.config")),
            config,
        )
        .with_context(|| format!("writing iteration.{n}.config"))
    }
}

fn run_directory_name() -> String {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..4)
            .map(|_| {
                const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            })
            .collect()
    };
    format!("{timestamp}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_worker_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(dir.path(), 3).unwrap();
        for idx in 0..3 {
            assert!(ws.worker_dir(idx).exists());
        }
        assert!(ws.root().join("log.txt").exists());
        assert!(ws.root().join("global_leaderboard.live").exists());
    }

    #[test]
    fn run_directory_name_has_expected_shape() {
        let name = run_directory_name();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
    }
}
