//! GCC-compatible compiler introspection
//!
//! Parses the textual output of `cc -v`, `cc -Q --help=params`, and
//! `cc -Q --help=optimizers` to build a starting flag set, and discretizes
//! bounded/unbounded `--param` ranges into a handful of representative
//! states.

use crate::config::Flag;
use crate::Result;
use anyhow::Context as _;
use regex::Regex;
use std::collections::BTreeMap;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// `--param` descriptions known to crash the compiler or otherwise make for
/// an unproductive tuning dimension.
const PARAM_BLOCKLIST: &[&str] = &[
    "asan-globals",
    "asan-instrument-allocas",
    "asan-instrument-reads",
    "asan-instrument-writes",
    "asan-memintrin",
    "asan-stack",
    "asan-use-after-return",
    "hwasan-instrument-stack",
    "tsan-distinguish-volatile",
    "tsan-instrument-func-entry-exit",
    "profile-func-internal-id",
    "lto-partitions",
];

/// `-f` optimizer flags known to be irrelevant to pure codegen tuning or
/// requiring infrastructure (profiling data, patching) this tuner does not
/// provide.
const OPTIMIZER_BLOCKLIST: &[&str] = &[
    "live-patching",
    "ipa-profile",
    "profile-use",
    "profile-generate",
    "profile-correction",
    "profile-reorder-functions",
    "profile-values",
    "branch-probabilities",
    "auto-profile",
    "exceptions",
    "save-optimization-record",
    "stack-protector",
    "stack-protector-all",
    "stack-protector-strong",
    "stack-protector-explicit",
];

pub struct GccDriver {
    cc: String,
}

impl GccDriver {
    pub fn new(cc: impl Into<String>) -> Self {
        Self { cc: cc.into() }
    }

    pub fn version(&self) -> Result<Version> {
        let output = Command::new(&self.cc)
            .arg("-v")
            .stdin(Stdio::null())
            .output()
            .context("running `cc -v`")?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let re = Regex::new(r"gcc version (\d+)\.(\d+)\.(\d+)").unwrap();
        let caps = re
            .captures(&stderr)
            .context("could not find a gcc version string in `cc -v` output")?;
        Ok(Version {
            major: caps[1].parse().unwrap_or(0),
            minor: caps[2].parse().unwrap_or(0),
            patch: caps[3].parse().unwrap_or(0),
        })
    }

    pub fn target(&self) -> Result<String> {
        let output = Command::new(&self.cc)
            .arg("-v")
            .stdin(Stdio::null())
            .output()
            .context("running `cc -v`")?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let re = Regex::new(r"Target:\s*(\S+)").unwrap();
        let caps = re
            .captures(&stderr)
            .context("could not find a target triple in `cc -v` output")?;
        Ok(caps[1].to_string())
    }

    /// Fetch every `--param` the compiler advertises, already filtered
    /// through the blocklist and the two known min-bump fixups applied.
    pub fn params(&self, cflags: &[String]) -> Result<BTreeMap<String, ParamInfo>> {
        let version = self.version()?;
        let output = Command::new(&self.cc)
            .args(cflags)
            .args(["-Q", "--help=params"])
            .stdin(Stdio::null())
            .output()
            .context("running `cc -Q --help=params`")?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut params = if version.major > 9 {
            parse_params_modern(&stdout)
        } else {
            parse_params_legacy(&stdout)
        };

        params.remove("min-nondebug-insn-uid");
        if let Some(p) = params.get_mut("logical-op-non-short-circuit") {
            p.min = p.min.min(0);
        }
        if let Some(p) = params.get_mut("vect-max-peeling-for-alignment") {
            p.min = p.min.min(0);
        }
        for name in PARAM_BLOCKLIST {
            params.remove(*name);
        }
        Ok(params)
    }

    /// Fetch every `-f` optimizer flag, ordered per flag so state 0 is the
    /// compiler's current default.
    pub fn optimizers(&self, cflags: &[String]) -> Result<Vec<Flag>> {
        let output = Command::new(&self.cc)
            .args(cflags)
            .args(["-Q", "--help=optimizers"])
            .stdin(Stdio::null())
            .output()
            .context("running `cc -Q --help=optimizers`")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_optimizers(&stdout))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    pub default: i64,
    pub min: i64,
    pub max: i64,
}

fn parse_params_modern(text: &str) -> BTreeMap<String, ParamInfo> {
    // `--param=NAME=<MIN,MAX>     DEFAULT` or `--param=NAME=       DEFAULT` (unbounded)
    let bounded = Regex::new(r"--param=([a-zA-Z0-9_-]+)=<(-?\d+),(\d+)>\s+(-?\d+)").unwrap();
    let unbounded = Regex::new(r"--param=([a-zA-Z0-9_-]+)=\s+(-?\d+)").unwrap();

    let mut params = BTreeMap::new();
    for caps in bounded.captures_iter(text) {
        let name = caps[1].to_string();
        let min: i64 = caps[2].parse().unwrap_or(0);
        let max: i64 = caps[3].parse().unwrap_or(0);
        let default: i64 = caps[4].parse().unwrap_or(0);
        params.insert(name, ParamInfo { default, min, max });
    }
    for caps in unbounded.captures_iter(text) {
        let name = caps[1].to_string();
        if params.contains_key(&name) {
            continue;
        }
        let default: i64 = caps[2].parse().unwrap_or(0);
        params.insert(
            name,
            ParamInfo {
                default,
                min: 0,
                max: i32::MAX as i64,
            },
        );
    }
    params
}

fn parse_params_legacy(text: &str) -> BTreeMap<String, ParamInfo> {
    let re = Regex::new(
        r"(?m)^\s*([a-zA-Z0-9_-]+)\s+default\s+(-?\d+)\s+minimum\s+(-?\d+)\s+maximum\s+(-?\d+)",
    )
    .unwrap();
    let mut params = BTreeMap::new();
    for caps in re.captures_iter(text) {
        let name = caps[1].to_string();
        let default: i64 = caps[2].parse().unwrap_or(0);
        let min: i64 = caps[3].parse().unwrap_or(0);
        let max: i64 = caps[4].parse().unwrap_or(0);
        params.insert(name, ParamInfo { default, min, max });
    }
    params
}

fn parse_optimizers(text: &str) -> Vec<Flag> {
    let re = Regex::new(r"-f([a-zA-Z0-9-]+)\s+(\[enabled\]|\[disabled\])?").unwrap();
    let mut flags = Vec::new();
    for caps in re.captures_iter(text) {
        let name = caps[1].to_string();
        if OPTIMIZER_BLOCKLIST.contains(&name.as_str()) {
            continue;
        }
        let enabled = caps.get(2).map(|m| m.as_str() == "[enabled]").unwrap_or(true);
        let values = if enabled {
            vec![format!("-f{name}"), format!("-fno-{name}")]
        } else {
            vec![format!("-fno-{name}"), format!("-f{name}")]
        };
        flags.push(Flag::new(format!("f{name}"), values));
    }
    flags
}

/// The `-O` optimization level as a tunable flag in its own right, default
/// first so state 0 leaves the compiler's invocation unchanged.
pub fn opt_level_flag(default: &str) -> Flag {
    let levels = ["-O0", "-O1", "-O2", "-O3", "-Ofast", "-Og", "-Os"];
    let mut values = vec![default.to_string()];
    values.extend(levels.iter().filter(|&&level| level != default).map(str::to_string));
    Flag::new("opt-level", values)
}

/// Discretize a bounded/unbounded `--param` range into a handful of
/// representative integer states, default always first.
pub fn discretize_param(name: &str, info: &ParamInfo) -> Flag {
    let mut states = vec![info.default];

    let unbounded = info.max >= i32::MAX as i64;
    if !unbounded {
        let span = info.max - info.min + 1;
        if span <= 25 {
            for v in info.min..=info.max {
                if v != info.default {
                    states.push(v);
                }
            }
        } else {
            let step = (span / 10).max(1);
            let mut v = info.min;
            while v < info.max {
                if v != info.default {
                    states.push(v);
                }
                v += step;
            }
            if info.max != info.default {
                states.push(info.max);
            }
        }
    } else if info.default == 0 {
        for v in (0..=100).step_by(5) {
            if v as i64 != info.default {
                states.push(v as i64);
            }
        }
    } else {
        let full_range = info.default * 2;
        let step = if full_range >= 10 { full_range / 10 } else { 1 };
        let mut v = 0i64;
        while v <= full_range {
            if v != info.default {
                states.push(v);
            }
            v += step;
        }
    }

    let values: Vec<String> = states
        .into_iter()
        .map(|v| format!("--param={name}={v}"))
        .collect();
    Flag::new(format!("param-{name}"), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_bounded_param() {
        let text = "  --param=max-inline-insns-auto=<0,1000>      40\n";
        let params = parse_params_modern(text);
        let p = params.get("max-inline-insns-auto").unwrap();
        assert_eq!(p.default, 40);
        assert_eq!(p.min, 0);
        assert_eq!(p.max, 1000);
    }

    #[test]
    fn parses_modern_unbounded_param() {
        let text = "  --param=large-function-growth=       100\n";
        let params = parse_params_modern(text);
        let p = params.get("large-function-growth").unwrap();
        assert_eq!(p.default, 100);
        assert_eq!(p.max, i32::MAX as i64);
    }

    #[test]
    fn parses_legacy_param_line() {
        let text = "  foo-bar  default 5 minimum 0 maximum 20\n";
        let params = parse_params_legacy(text);
        let p = params.get("foo-bar").unwrap();
        assert_eq!((p.default, p.min, p.max), (5, 0, 20));
    }

    #[test]
    fn optimizer_ordering_respects_enabled_state() {
        let text = "  -ftree-vrp                [enabled]\n  -fgcse                    [disabled]\n";
        let flags = parse_optimizers(text);
        let vrp = flags.iter().find(|f| f.name == "ftree-vrp").unwrap();
        assert_eq!(vrp.values, vec!["-ftree-vrp", "-fno-tree-vrp"]);
        let gcse = flags.iter().find(|f| f.name == "fgcse").unwrap();
        assert_eq!(gcse.values, vec!["-fno-gcse", "-fgcse"]);
    }

    #[test]
    fn optimizer_blocklist_is_dropped() {
        let text = "  -flive-patching           [disabled]\n";
        let flags = parse_optimizers(text);
        assert!(flags.is_empty());
    }

    #[test]
    fn small_bounded_range_enumerates_every_state() {
        let info = ParamInfo {
            default: 2,
            min: 0,
            max: 5,
        };
        let flag = discretize_param("x", &info);
        assert_eq!(flag.n_states(), 6);
        assert_eq!(flag.values[0], "--param=x=2");
    }

    #[test]
    fn large_bounded_range_samples_ten_steps() {
        let info = ParamInfo {
            default: 50,
            min: 0,
            max: 1000,
        };
        let flag = discretize_param("x", &info);
        assert!(flag.n_states() <= 13);
        assert_eq!(flag.values[0], "--param=x=50");
    }

    #[test]
    fn unbounded_zero_default_samples_0_to_100() {
        let info = ParamInfo {
            default: 0,
            min: 0,
            max: i32::MAX as i64,
        };
        let flag = discretize_param("x", &info);
        assert_eq!(flag.values[0], "--param=x=0");
        assert!(flag.n_states() > 1);
    }
}
