//! Minimization engine
//!
//! Given a target score and a starting list of flags, finds the minimal
//! subset that reproduces that score exactly, via recursive bisection rather
//! than testing every subset.

use crate::pool::{BuildBenchmarkPool, Job};
use crate::Result;

pub struct MinimizeEngine {
    pool: BuildBenchmarkPool,
    target: f64,
}

impl MinimizeEngine {
    pub fn new(pool: BuildBenchmarkPool, target: f64) -> Self {
        Self { pool, target }
    }

    /// Bisect `starting` down to the minimal subset (order preserved) whose
    /// score matches `target` exactly.
    pub fn minimize(&mut self, starting: Vec<String>) -> Result<Vec<String>> {
        let mut current = starting;
        let mut compulsory: Vec<String> = Vec::new();

        loop {
            if self.score_matches(&compulsory)? {
                return Ok(compulsory);
            }
            if current.is_empty() {
                anyhow::bail!("exhausted candidate flags without reproducing the target score");
            }

            let mut idx_mid = current.len() / 2;
            loop {
                let include = current[..idx_mid].to_vec();
                let mut probe = compulsory.clone();
                probe.extend(include.iter().cloned());

                if self.score_matches(&probe)? {
                    current = include;
                    break;
                }

                if current.len() - idx_mid <= 1 {
                    let required = current[idx_mid].clone();
                    compulsory.push(required);
                    current = current[..idx_mid].to_vec();
                    break;
                }

                idx_mid = (idx_mid + current.len()) / 2;
            }
        }
    }

    fn score_matches(&mut self, flags: &[String]) -> Result<bool> {
        self.pool.submit(vec![Job {
            flags: flags.to_vec(),
            tag: None,
        }]);
        let result = self
            .pool
            .collect(1)
            .into_iter()
            .next()
            .expect("pool returned no result for minimize probe");
        Ok(result
            .score
            .map(|s| (s - self.target).abs() < f64::EPSILON)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::context::{CompileOutcome, Direction, WorkerContext};
    use std::sync::Arc;

    /// A context whose score equals the count of flags containing "keep".
    struct CountingContext {
        pending: usize,
    }

    impl WorkerContext for CountingContext {
        fn init_workspace(&mut self) -> Result<()> {
            Ok(())
        }
        fn available_benchmark_types(&self) -> &'static [&'static str] {
            &["execution"]
        }
        fn compile(&mut self, flags: &[String]) -> Result<CompileOutcome> {
            self.pending = flags.iter().filter(|f| f.contains("keep")).count();
            Ok(CompileOutcome {
                ok: true,
                checksum: format!("n{}", self.pending),
            })
        }
        fn benchmark(&mut self) -> Option<f64> {
            Some(self.pending as f64)
        }
        fn direction(&self) -> Direction {
            Direction::Minimize
        }
    }

    #[test]
    fn minimizes_to_the_flags_needed_for_the_target_count() {
        let pool = BuildBenchmarkPool::new(1, Arc::new(ResultCache::new()), |_| {
            Ok(Box::new(CountingContext { pending: 0 }) as Box<dyn WorkerContext>)
        })
        .unwrap();
        let mut engine = MinimizeEngine::new(pool, 2.0);

        let starting: Vec<String> = vec![
            "-fa".into(),
            "-fkeep1".into(),
            "-fb".into(),
            "-fkeep2".into(),
            "-fc".into(),
        ];
        let result = engine.minimize(starting).unwrap();
        let keep_count = result.iter().filter(|f| f.contains("keep")).count();
        assert_eq!(keep_count, 2);
    }

    #[test]
    fn bails_out_when_target_is_unreachable() {
        let pool = BuildBenchmarkPool::new(1, Arc::new(ResultCache::new()), |_| {
            Ok(Box::new(CountingContext { pending: 0 }) as Box<dyn WorkerContext>)
        })
        .unwrap();
        let mut engine = MinimizeEngine::new(pool, 99.0);
        assert!(engine.minimize(vec!["-fkeep".into()]).is_err());
    }
}
