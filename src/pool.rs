//! Build/benchmark worker pool
//!
//! A fixed-size pool of workers, each owning an exclusive workspace directory
//! and `WorkerContext` instance, that consumes `(flags, tag)` jobs and emits
//! `(tag, score)` results. Every `compile`/`benchmark` call a worker makes is
//! itself a bounded child-process invocation, so a wedged compiler or
//! benchmark binary cannot stall the pool beyond its own timeout.

use crate::cache::ResultCache;
use crate::context::WorkerContext;
use crate::Result;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A unit of work: the flags to compile with and an optional tag identifying
/// which perturbation this job represents (`None` marks a baseline measurement).
#[derive(Debug, Clone)]
pub struct Job {
    pub flags: Vec<String>,
    pub tag: Option<(usize, usize)>,
}

/// The outcome of a `Job`: `score` is `None` on compile failure, benchmark
/// failure, or a panic inside the worker body.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub tag: Option<(usize, usize)>,
    pub score: Option<f64>,
}

enum WorkItem {
    Job(Job),
    Shutdown,
}

/// Pool of worker threads sharing a `ResultCache`, each driving its own
/// `WorkerContext`.
pub struct BuildBenchmarkPool {
    work_tx: Sender<WorkItem>,
    result_rx: Receiver<JobResult>,
    handles: Vec<JoinHandle<()>>,
}

impl BuildBenchmarkPool {
    /// Spawn `worker_count` workers, calling `make_context(idx)` once per
    /// worker to build its exclusive `WorkerContext`, then initializing each
    /// workspace before returning. See [`BuildBenchmarkPool::new`] for the
    /// non-verbose convenience constructor.
    pub fn with_verbose<F>(
        worker_count: usize,
        cache: Arc<ResultCache>,
        verbose: bool,
        make_context: F,
    ) -> Result<Self>
    where
        F: Fn(usize) -> Result<Box<dyn WorkerContext>>,
    {
        let worker_count = worker_count.max(1);
        let (work_tx, work_rx) = unbounded::<WorkItem>();
        let (result_tx, result_rx) = bounded::<JobResult>(4096);

        let mut handles = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let mut ctx = make_context(idx)?;
            ctx.init_workspace().map_err(|source| {
                crate::TunerError::WorkspaceInit {
                    worker: idx,
                    message: format!("{source:#}"),
                }
            })?;

            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let cache = Arc::clone(&cache);

            handles.push(thread::spawn(move || {
                worker_loop(idx, ctx.as_mut(), &work_rx, &result_tx, &cache, verbose)
            }));
        }

        Ok(Self {
            work_tx,
            result_rx,
            handles,
        })
    }

    /// Spawn a pool with per-job diagnostic printing disabled.
    pub fn new<F>(worker_count: usize, cache: Arc<ResultCache>, make_context: F) -> Result<Self>
    where
        F: Fn(usize) -> Result<Box<dyn WorkerContext>>,
    {
        Self::with_verbose(worker_count, cache, false, make_context)
    }

    /// Submit a batch of jobs. Does not block for completions.
    pub fn submit(&self, jobs: Vec<Job>) {
        for job in jobs {
            self.work_tx
                .send(WorkItem::Job(job))
                .expect("worker pool channel closed");
        }
    }

    /// Block until exactly `count` results have been collected.
    pub fn collect(&self, count: usize) -> Vec<JobResult> {
        (0..count)
            .map(|_| {
                self.result_rx
                    .recv()
                    .expect("worker pool result channel closed")
            })
            .collect()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for BuildBenchmarkPool {
    fn drop(&mut self) {
        for _ in &self.handles {
            let _ = self.work_tx.send(WorkItem::Shutdown);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    idx: usize,
    ctx: &mut dyn WorkerContext,
    work_rx: &Receiver<WorkItem>,
    result_tx: &Sender<JobResult>,
    cache: &ResultCache,
    verbose: bool,
) {
    loop {
        let item = match work_rx.recv() {
            Ok(item) => item,
            Err(_) => return,
        };
        let job = match item {
            WorkItem::Shutdown => return,
            WorkItem::Job(job) => job,
        };

        let tag = job.tag;
        if verbose {
            eprintln!("[worker {idx}] tag={tag:?} flags={}", job.flags.join(" "));
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| run_job(ctx, &job, cache)));
        let score = outcome.unwrap_or(None);
        if verbose {
            eprintln!("[worker {idx}] tag={tag:?} -> {score:?}");
        }

        if result_tx.send(JobResult { tag, score }).is_err() {
            return;
        }
    }
}

fn run_job(ctx: &mut dyn WorkerContext, job: &Job, cache: &ResultCache) -> Option<f64> {
    let outcome = ctx.compile(&job.flags).ok()?;
    if !outcome.ok {
        return None;
    }
    if let Some(cached) = cache.get(&outcome.checksum) {
        return Some(cached);
    }
    let score = ctx.benchmark();
    if let Some(score) = score {
        cache.put(outcome.checksum, score);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CompileOutcome, Direction};

    struct FakeContext {
        score: Option<f64>,
    }

    impl WorkerContext for FakeContext {
        fn init_workspace(&mut self) -> Result<()> {
            Ok(())
        }
        fn available_benchmark_types(&self) -> &'static [&'static str] {
            &["execution"]
        }
        fn compile(&mut self, _flags: &[String]) -> Result<CompileOutcome> {
            Ok(CompileOutcome {
                ok: true,
                checksum: "deadbeef".to_string(),
            })
        }
        fn benchmark(&mut self) -> Option<f64> {
            self.score
        }
        fn direction(&self) -> Direction {
            Direction::Minimize
        }
    }

    #[test]
    fn pool_runs_jobs_and_caches_identical_checksums() {
        let cache = Arc::new(ResultCache::new());
        let pool = BuildBenchmarkPool::new(2, cache, |_idx| {
            Ok(Box::new(FakeContext { score: Some(3.0) }) as Box<dyn WorkerContext>)
        })
        .unwrap();

        pool.submit(vec![
            Job {
                flags: vec![],
                tag: None,
            },
            Job {
                flags: vec!["-fx".into()],
                tag: Some((0, 1)),
            },
        ]);
        let results = pool.collect(2);
        assert_eq!(results.len(), 2);
        for r in &results {
            assert_eq!(r.score, Some(3.0));
        }
    }
}
