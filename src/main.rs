//! ceflags CLI entry point

use anyhow::{Context, Result};
use ceflags::cache::ResultCache;
use ceflags::config::cli::Cli;
use ceflags::config::{toml as flag_toml, FlagSetConfig};
use ceflags::context::create_context;
use ceflags::engine::CEEngine;
use ceflags::gen::generate_from_compiler;
use ceflags::pool::BuildBenchmarkPool;
use ceflags::validator::FlagValidator;
use ceflags::workspace::RunWorkspace;
use ceflags::TunerError;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("ceflags v{}", env!("CARGO_PKG_VERSION"));
    println!("Combined-elimination compiler flag auto-tuner");
    println!();

    let cli = Cli::parse_args();
    cli.validate()?;

    let worker_count = cli.worker_count();
    print_configuration(&cli, worker_count);

    let mut config = load_or_generate_config(&cli)?;

    let workspace = RunWorkspace::create(&cli.workspace_root, worker_count)
        .context("creating run workspace")?;

    let cc = cli.cc.clone();
    let benchmark = cli.benchmark.clone();
    let context_kind = cli.context;

    let validator = FlagValidator::new(&cc, worker_count, cli.verbose);
    validator.validate(&mut config)?;
    config.validate().map_err(TunerError::InvalidConfig)?;

    // Probe direction/worst-sortable from a throwaway context instance; these
    // are properties of the context type, not of any particular workspace.
    let probe = create_context(context_kind, cc.clone(), benchmark.clone(), "/tmp".into())?;
    if !probe
        .available_benchmark_types()
        .contains(&cli.benchmark.as_str())
    {
        return Err(TunerError::UnknownBenchmark {
            name: cli.benchmark.clone(),
            available: probe
                .available_benchmark_types()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
        .into());
    }
    let direction = probe.direction();
    let worst_sortable = probe.worst_sortable();
    drop(probe);

    let run_root = workspace.root().to_path_buf();

    if cli.setup_workspace_only {
        let cache = Arc::new(ResultCache::new());
        let pool = BuildBenchmarkPool::with_verbose(worker_count, cache, cli.verbose, {
            let cc = cc.clone();
            let benchmark = benchmark.clone();
            let run_root = run_root.clone();
            move |idx| {
                create_context(
                    context_kind,
                    cc.clone(),
                    benchmark.clone(),
                    run_root.join(idx.to_string()),
                )
            }
        })?;
        drop(pool);
        println!("workspace initialized at {}", workspace.root().display());
        return Ok(());
    }

    let cache = Arc::new(ResultCache::new());
    let pool = BuildBenchmarkPool::with_verbose(worker_count, cache, cli.verbose, {
        let cc = cc.clone();
        let benchmark = benchmark.clone();
        move |idx| {
            create_context(
                context_kind,
                cc.clone(),
                benchmark.clone(),
                run_root.join(idx.to_string()),
            )
        }
    })
    .context("starting build/benchmark pool")?;

    let engine = CEEngine::new(
        config,
        pool,
        workspace,
        direction,
        worst_sortable,
        cli.drop_pessimizing_flags,
        cli.max_iterations,
    );

    let final_config = engine.run()?;
    println!();
    println!("final configuration: {final_config}");
    Ok(())
}

fn load_or_generate_config(cli: &Cli) -> Result<FlagSetConfig> {
    match &cli.config {
        Some(path) => flag_toml::parse_toml_file(path),
        None => {
            println!("no --config given, introspecting {} for a starting flag set", cli.cc);
            generate_from_compiler(&cli.cc)
        }
    }
}

fn print_configuration(cli: &Cli, worker_count: usize) {
    println!("Configuration:");
    println!("  Compiler:    {}", cli.cc);
    println!("  Context:     {:?}", cli.context);
    println!("  Benchmark:   {}", cli.benchmark);
    println!("  Workers:     {worker_count}");
    println!(
        "  Config file: {}",
        cli.config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<generated>".to_string())
    );
    println!("  Drop regressors after promotion: {}", cli.drop_pessimizing_flags);
    println!();
}
