//! Combined-elimination engine
//!
//! This module implements the core search: `CEEngine` orchestrates workers
//! and aggregates results into a monotonically-improving flag configuration.
//!
//! # Algorithm
//!
//! Each iteration: measure the baseline, perturb every flag to every one of
//! its other valid states, promote the single best improving perturbation,
//! optionally exclude every perturbation that did not beat the baseline, and
//! repeat until no perturbation improves on the baseline.
//!
//! # Termination
//!
//! The search always terminates: each promotion excludes the flag's prior
//! state, so the product of every flag's `valid_states().len()` strictly
//! decreases every time a promotion happens, and the loop halts immediately
//! once an iteration promotes nothing.

use crate::config::FlagSetConfig;
use crate::context::Direction;
use crate::pool::{BuildBenchmarkPool, Job};
use crate::workspace::RunWorkspace;
use crate::{Result, TunerError};

/// Drives the combined-elimination search to a local optimum.
pub struct CEEngine {
    config: FlagSetConfig,
    pool: BuildBenchmarkPool,
    workspace: RunWorkspace,
    direction: Direction,
    worst_sortable: f64,
    drop_pessimizing_flags: bool,
    max_iterations: usize,
}

/// A single measured perturbation.
struct Perturbation {
    flag_idx: usize,
    state_idx: usize,
    score: f64,
}

impl CEEngine {
    pub fn new(
        config: FlagSetConfig,
        pool: BuildBenchmarkPool,
        workspace: RunWorkspace,
        direction: Direction,
        worst_sortable: f64,
        drop_pessimizing_flags: bool,
        max_iterations: usize,
    ) -> Self {
        Self {
            config,
            pool,
            workspace,
            direction,
            worst_sortable,
            drop_pessimizing_flags,
            max_iterations,
        }
    }

    /// Run the search to completion (a local optimum, or `max_iterations`
    /// iterations if that limit is set and reached first).
    pub fn run(mut self) -> Result<FlagSetConfig> {
        let mut iteration = 0usize;
        loop {
            let baseline = self.measure_baseline()?;
            let Some(perturbations) = self.perturb_all(iteration, baseline)? else {
                self.workspace.log(&format!(
                    "iteration {iteration}: no remaining perturbations, stopping"
                ));
                break;
            };

            let Some(best) = self.best_improving(&perturbations, baseline) else {
                self.workspace.log(&format!(
                    "iteration {iteration}: baseline {baseline} is a local optimum, stopping"
                ));
                break;
            };

            self.promote(best.flag_idx, best.state_idx);
            if self.drop_pessimizing_flags {
                self.drop_regressors(&perturbations, baseline, best.flag_idx, best.state_idx);
            }

            self.workspace.write_iteration(
                iteration,
                &format!(
                    "baseline={baseline}\npromoted flag {} -> state {} (score {})\n",
                    best.flag_idx, best.state_idx, best.score
                ),
                &self.config,
            )?;

            iteration += 1;
            if self.max_iterations != 0 && iteration >= self.max_iterations {
                self.workspace.log(&format!(
                    "iteration {iteration}: reached --max-iterations, stopping"
                ));
                break;
            }
        }
        Ok(self.config)
    }

    fn measure_baseline(&mut self) -> Result<f64> {
        let flags = self.config.command_line();
        self.pool.submit(vec![Job { flags: flags.clone(), tag: None }]);
        let result = self
            .pool
            .collect(1)
            .into_iter()
            .next()
            .expect("pool returned no result for baseline job");
        match result.score {
            Some(score) => {
                self.workspace.append_leaderboard(&flags, score);
                Ok(score)
            }
            None => Err(TunerError::BaselineUnmeasurable.into()),
        }
    }

    /// Submit one job per `(flag, other state)` pair and collect all results.
    /// Returns `None` if there was nothing left to perturb.
    fn perturb_all(
        &mut self,
        _iteration: usize,
        _baseline: f64,
    ) -> Result<Option<Vec<Perturbation>>> {
        let mut jobs = Vec::new();
        for (flag_idx, flag) in self.config.flags.iter().enumerate() {
            for state_idx in flag.other_states() {
                let mut candidate = self.config.clone();
                candidate.flags[flag_idx].state = state_idx;
                jobs.push((flag_idx, state_idx, candidate.command_line()));
            }
        }

        if jobs.is_empty() {
            return Ok(None);
        }

        let pool_jobs: Vec<Job> = jobs
            .iter()
            .map(|(flag_idx, state_idx, flags)| Job {
                flags: flags.clone(),
                tag: Some((*flag_idx, *state_idx)),
            })
            .collect();
        self.pool.submit(pool_jobs);

        let results = self.pool.collect(jobs.len());
        let mut perturbations = Vec::with_capacity(jobs.len());
        for result in results {
            let (flag_idx, state_idx) = result.tag.expect("perturbation job missing its tag");
            let score = result.score.unwrap_or(self.worst_sortable);
            if let Some(idx) = jobs
                .iter()
                .position(|(f, s, _)| *f == flag_idx && *s == state_idx)
            {
                self.workspace.append_leaderboard(&jobs[idx].2, score);
            }
            perturbations.push(Perturbation {
                flag_idx,
                state_idx,
                score,
            });
        }
        Ok(Some(perturbations))
    }

    /// Rank perturbations by score (best first, ties broken by smallest flag
    /// index then smallest state index) and return the best one if it beats
    /// the baseline.
    fn best_improving(&self, perturbations: &[Perturbation], baseline: f64) -> Option<&Perturbation> {
        let direction = self.direction;
        perturbations.iter().min_by(|a, b| {
            let ord = if direction.better(a.score, b.score) {
                std::cmp::Ordering::Less
            } else if direction.better(b.score, a.score) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            };
            ord.then_with(|| a.flag_idx.cmp(&b.flag_idx))
                .then_with(|| a.state_idx.cmp(&b.state_idx))
        }).filter(|best| direction.better(best.score, baseline))
    }

    fn promote(&mut self, flag_idx: usize, state_idx: usize) {
        let flag = &mut self.config.flags[flag_idx];
        let prior = flag.state;
        flag.state = state_idx;
        flag.exclusions.insert(prior);
    }

    fn drop_regressors(
        &mut self,
        perturbations: &[Perturbation],
        baseline: f64,
        promoted_flag: usize,
        promoted_state: usize,
    ) {
        for p in perturbations {
            if p.flag_idx == promoted_flag && p.state_idx == promoted_state {
                continue;
            }
            if !self.direction.better(p.score, baseline) {
                self.config.flags[p.flag_idx].exclude(p.state_idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flag;

    fn make_perturbation(flag_idx: usize, state_idx: usize, score: f64) -> Perturbation {
        Perturbation {
            flag_idx,
            state_idx,
            score,
        }
    }

    #[test]
    fn best_improving_ties_broken_by_flag_then_state_index() {
        let config = FlagSetConfig::new(None);
        let direction = Direction::Minimize;
        let dummy = dummy_engine(config, direction);

        let perturbations = vec![
            make_perturbation(1, 0, 5.0),
            make_perturbation(0, 1, 5.0),
            make_perturbation(0, 0, 5.0),
        ];
        let best = dummy.best_improving(&perturbations, 10.0).unwrap();
        assert_eq!((best.flag_idx, best.state_idx), (0, 0));
    }

    #[test]
    fn best_improving_returns_none_when_nothing_beats_baseline() {
        let config = FlagSetConfig::new(None);
        let dummy = dummy_engine(config, Direction::Minimize);
        let perturbations = vec![make_perturbation(0, 1, 10.0)];
        assert!(dummy.best_improving(&perturbations, 10.0).is_none());
    }

    #[test]
    fn promote_moves_state_and_excludes_prior() {
        let mut config = FlagSetConfig::new(None);
        config
            .flags
            .push(Flag::new("x", vec!["a".into(), "b".into()]));
        let mut dummy = dummy_engine(config, Direction::Minimize);
        dummy.promote(0, 1);
        assert_eq!(dummy.config.flags[0].state, 1);
        assert!(dummy.config.flags[0].exclusions.contains(&0));
    }

    // Builds a CEEngine without ever touching the pool or workspace, for
    // exercising pure decision logic (best_improving/promote/drop_regressors).
    fn dummy_engine(config: FlagSetConfig, direction: Direction) -> CEEngine {
        use crate::cache::ResultCache;
        use crate::context::{CompileOutcome, WorkerContext};
        use std::sync::Arc;

        struct Noop;
        impl WorkerContext for Noop {
            fn init_workspace(&mut self) -> Result<()> {
                Ok(())
            }
            fn available_benchmark_types(&self) -> &'static [&'static str] {
                &[]
            }
            fn compile(&mut self, _flags: &[String]) -> Result<CompileOutcome> {
                Ok(CompileOutcome::failed())
            }
            fn benchmark(&mut self) -> Option<f64> {
                None
            }
            fn direction(&self) -> Direction {
                Direction::Minimize
            }
        }

        let pool = BuildBenchmarkPool::new(1, Arc::new(ResultCache::new()), |_| {
            Ok(Box::new(Noop) as Box<dyn WorkerContext>)
        })
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::create(dir.path(), 1).unwrap();
        CEEngine::new(config, pool, workspace, direction, direction.worst_sortable(), false, 0)
    }
}
