//! Flag generation
//!
//! Introspects a live GCC-compatible compiler to produce a starting
//! `FlagSetConfig`, instead of requiring the caller to hand-author one.

pub mod gcc;

use crate::config::FlagSetConfig;
use crate::Result;
use gcc::GccDriver;

/// Build a starting `FlagSetConfig` by introspecting the given compiler: the
/// `-O` level, every `-f` optimizer, and every `--param`.
pub fn generate_from_compiler(cc: &str) -> Result<FlagSetConfig> {
    let driver = GccDriver::new(cc);
    let mut config = FlagSetConfig::new(None);

    config.flags.push(gcc::opt_level_flag("-O2"));

    for flag in driver.optimizers(&[])? {
        config.flags.push(flag);
    }
    for (name, info) in driver.params(&[])? {
        config.flags.push(gcc::discretize_param(&name, &info));
    }

    Ok(config)
}
