//! minimize-flags CLI entry point

use anyhow::{Context, Result};
use ceflags::cache::ResultCache;
use ceflags::config::cli::MinimizeCli;
use ceflags::config::toml as flag_toml;
use ceflags::context::create_context;
use ceflags::minimize::MinimizeEngine;
use ceflags::pool::BuildBenchmarkPool;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("minimize-flags v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let cli = MinimizeCli::parse_args();
    cli.validate()?;

    let config = flag_toml::parse_toml_file(&cli.starting_flags)
        .context("loading --starting-flags")?;
    let starting: Vec<String> = config
        .flags
        .iter()
        .filter(|flag| flag.state != 0)
        .flat_map(|flag| flag.render().split_whitespace().map(str::to_string))
        .collect();

    println!("starting from {} non-default flag tokens", starting.len());

    let cc = cli.cc.clone();
    let benchmark = cli.benchmark.clone();
    let context_kind = cli.context;
    let workspace = std::env::temp_dir().join(format!("ceflags-minimize-{}", std::process::id()));

    let cache = Arc::new(ResultCache::new());
    let pool = BuildBenchmarkPool::with_verbose(1, cache, cli.verbose, {
        let cc = cc.clone();
        let benchmark = benchmark.clone();
        let workspace = workspace.clone();
        move |_idx| create_context(context_kind, cc.clone(), benchmark.clone(), workspace.clone())
    })
    .context("starting build/benchmark pool")?;

    let mut engine = MinimizeEngine::new(pool, cli.target);
    let minimal = engine.minimize(starting)?;

    println!("minimal flag set ({} tokens):", minimal.len());
    println!("{}", minimal.join(" "));
    Ok(())
}
