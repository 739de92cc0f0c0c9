//! Flag configuration model
//!
//! A compiler configuration is an ordered set of multi-valued categorical
//! flags. Each flag tracks the index of its currently selected value plus a
//! set of excluded indices (states that either miscompile or were vacated by
//! a promotion in the combined-elimination loop).

pub mod cli;
pub mod toml;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single multi-valued categorical compiler flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flag {
    /// Identifier used for diagnostics and artifact files (not necessarily a
    /// real compiler token by itself).
    pub name: String,
    /// Ordered variants; `values[state]` is the literal text emitted on the
    /// compiler command line (may be empty for a true no-op variant).
    pub values: Vec<String>,
    /// Index of the currently selected variant.
    pub state: usize,
    /// Indices that must never be selected.
    #[serde(default)]
    pub exclusions: BTreeSet<usize>,
}

impl Flag {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            state: 0,
            exclusions: BTreeSet::new(),
        }
    }

    pub fn n_states(&self) -> usize {
        self.values.len()
    }

    pub fn all_states(&self) -> impl Iterator<Item = usize> + '_ {
        0..self.values.len()
    }

    pub fn valid_states(&self) -> Vec<usize> {
        self.all_states()
            .filter(|i| !self.exclusions.contains(i))
            .collect()
    }

    pub fn other_states(&self) -> Vec<usize> {
        self.valid_states()
            .into_iter()
            .filter(|&i| i != self.state)
            .collect()
    }

    /// The command-line text for the currently selected variant.
    pub fn render(&self) -> &str {
        &self.values[self.state]
    }

    /// Exclude a state, resetting `state` to the first remaining valid state
    /// if the excluded state was the current one.
    pub fn exclude(&mut self, idx: usize) {
        self.exclusions.insert(idx);
        if self.state == idx {
            if let Some(&first) = self.valid_states().first() {
                self.state = first;
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.values.is_empty() {
            return Err(format!("flag '{}' has no values", self.name));
        }
        if self.state >= self.values.len() {
            return Err(format!(
                "flag '{}' has state {} but only {} values",
                self.name,
                self.state,
                self.values.len()
            ));
        }
        if self.exclusions.contains(&self.state) {
            return Err(format!(
                "flag '{}' has its current state {} excluded",
                self.name, self.state
            ));
        }
        if self.valid_states().is_empty() {
            return Err(format!("flag '{}' has no valid states remaining", self.name));
        }
        Ok(())
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {:?} (state {}/{}, excluded {:?})",
            self.name,
            self.values,
            self.state,
            self.values.len(),
            self.exclusions
        )
    }
}

/// A full compiler configuration: the global optimization token plus every
/// tunable flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSetConfig {
    /// Global optimization level, always emitted first (e.g. `"-O2"`).
    #[serde(default)]
    pub base_opt: Option<String>,
    #[serde(default)]
    pub flags: Vec<Flag>,
}

impl FlagSetConfig {
    pub fn new(base_opt: Option<String>) -> Self {
        Self {
            base_opt,
            flags: Vec::new(),
        }
    }

    /// Materialize the current configuration into compiler command-line
    /// arguments. Flags at state 0 are assumed to be the default and are
    /// omitted from the emitted line.
    pub fn command_line(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(opt) = &self.base_opt {
            out.push(opt.clone());
        }
        for flag in &self.flags {
            if flag.state != 0 {
                out.extend(flag.render().split_whitespace().map(str::to_string));
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), String> {
        for flag in &self.flags {
            flag.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for FlagSetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_states_excludes_current_and_excluded() {
        let mut flag = Flag::new("unroll", vec!["-fno-unroll".into(), "-funroll".into()]);
        assert_eq!(flag.other_states(), vec![1]);
        flag.exclude(1);
        assert!(flag.other_states().is_empty());
    }

    #[test]
    fn exclude_current_state_resets_to_first_valid() {
        let mut flag = Flag::new(
            "x",
            vec!["a".into(), "b".into(), "c".into()],
        );
        flag.state = 1;
        flag.exclude(1);
        assert_eq!(flag.state, 0);
    }

    #[test]
    fn validate_rejects_excluded_current_state() {
        let mut flag = Flag::new("x", vec!["a".into(), "b".into()]);
        flag.state = 1;
        flag.exclusions.insert(1);
        assert!(flag.validate().is_err());
    }

    #[test]
    fn command_line_skips_state_zero_flags() {
        let mut cfg = FlagSetConfig::new(Some("-O2".into()));
        cfg.flags.push(Flag::new("a", vec!["-fno-a".into(), "-fa".into()]));
        cfg.flags.push(Flag::new("b", vec!["-fno-b".into(), "-fb".into()]));
        cfg.flags[1].state = 1;
        assert_eq!(cfg.command_line(), vec!["-O2", "-fb"]);
    }

    #[test]
    fn single_value_flag_never_perturbs() {
        let flag = Flag::new("fixed", vec!["-ffixed".into()]);
        assert!(flag.other_states().is_empty());
    }
}
