//! TOML (de)serialization for flag configurations

use super::FlagSetConfig;
use crate::TunerError;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse a flag-set configuration from a TOML file on disk.
pub fn parse_toml_file(path: &Path) -> Result<FlagSetConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse a flag-set configuration from a TOML string.
pub fn parse_toml_string(contents: &str) -> Result<FlagSetConfig> {
    let config: FlagSetConfig =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    config
        .validate()
        .map_err(TunerError::InvalidConfig)?;

    Ok(config)
}

/// Serialize a flag-set configuration to a TOML string.
pub fn to_toml_string(config: &FlagSetConfig) -> Result<String> {
    ::toml::to_string_pretty(config).context("Failed to serialize configuration to TOML")
}

/// Write a flag-set configuration to a TOML file.
pub fn write_toml_file(path: &Path, config: &FlagSetConfig) -> Result<()> {
    let contents = to_toml_string(config)?;
    fs::write(path, contents)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flag;

    #[test]
    fn round_trips_a_flag_set() {
        let mut config = FlagSetConfig::new(Some("-O2".to_string()));
        let mut flag = Flag::new("unroll", vec!["-fno-unroll".into(), "-funroll".into()]);
        flag.state = 1;
        flag.exclusions.insert(0);
        config.flags.push(flag);

        let serialized = to_toml_string(&config).unwrap();
        let decoded = parse_toml_string(&serialized).unwrap();

        assert_eq!(decoded.base_opt, config.base_opt);
        assert_eq!(decoded.flags.len(), 1);
        assert_eq!(decoded.flags[0], config.flags[0]);
    }

    #[test]
    fn parses_minimal_document() {
        let toml = r#"
            base_opt = "-O3"

            [[flags]]
            name = "unroll"
            values = ["-fno-unroll", "-funroll"]
            state = 0
        "#;
        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.base_opt.as_deref(), Some("-O3"));
        assert_eq!(config.flags[0].name, "unroll");
        assert_eq!(config.flags[0].exclusions.len(), 0);
    }

    #[test]
    fn rejects_configuration_with_excluded_current_state() {
        let toml = r#"
            [[flags]]
            name = "bad"
            values = ["a", "b"]
            state = 1
            exclusions = [1]
        "#;
        assert!(parse_toml_string(toml).is_err());
    }
}
