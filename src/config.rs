//! Checker configuration.
//!
//! Configuration is built in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML text, via [`CheckConfig::from_yaml_str`]
//! 3. Environment variables, via [`CheckConfig::apply_env_overrides`]

use fsmgen_token::{ReaderOptions, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};

/// Checker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Source reader configuration.
    pub reader: ReaderConfig,
    /// Which validation passes run.
    pub checks: ChecksConfig,
}

impl CheckConfig {
    /// Parses configuration from YAML text. Missing fields keep their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CheckConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies `FSMGEN_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.reader.apply_overrides(&var);
        self.checks.apply_overrides(&var);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reader.max_depth == 0 {
            return Err(ConfigError::Validation(
                "reader.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source reader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Accept `//` and `/* */` comments in specification files.
    pub allow_comments: bool,
    /// Maximum nesting depth of arrays and objects.
    pub max_depth: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            allow_comments: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ReaderConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(allow) = var("FSMGEN_ALLOW_COMMENTS") {
            if let Some(parsed) = parse_bool(&allow) {
                self.allow_comments = parsed;
            }
        }

        // Zero would reject every document, so it is ignored like unparseable values.
        if let Some(depth) = var("FSMGEN_MAX_DEPTH") {
            if let Some(n) = depth.parse().ok().filter(|&n: &usize| n > 0) {
                self.max_depth = n;
            }
        }
    }

    pub fn options(&self) -> ReaderOptions {
        ReaderOptions {
            allow_comments: self.allow_comments,
            max_depth: self.max_depth,
        }
    }
}

/// Validation pass switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Path exploration: totality, stalls and reachability.
    pub paths: bool,
    /// Timers that no state ever starts.
    pub unused_timers: bool,
    /// Callback naming consistency.
    pub callback_names: bool,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            paths: true,
            unused_timers: true,
            callback_names: true,
        }
    }
}

impl ChecksConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        let switches = [
            ("FSMGEN_CHECK_PATHS", &mut self.paths),
            ("FSMGEN_CHECK_UNUSED_TIMERS", &mut self.unused_timers),
            ("FSMGEN_CHECK_CALLBACK_NAMES", &mut self.callback_names),
        ];
        for (key, switch) in switches {
            if let Some(parsed) = var(key).as_deref().and_then(parse_bool) {
                *switch = parsed;
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CheckConfig::default();
        assert!(config.reader.allow_comments);
        assert_eq!(config.reader.max_depth, 128);
        assert!(config.checks.paths);
        assert!(config.checks.unused_timers);
        assert!(config.checks.callback_names);
    }

    #[test]
    fn test_yaml_partial() {
        let text = "checks:\n  unused_timers: false\n";
        let config: CheckConfig = serde_yaml::from_str(text).unwrap();
        assert!(!config.checks.unused_timers);
        assert!(config.checks.paths);
        assert_eq!(config.reader, ReaderConfig::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = CheckConfig {
            reader: ReaderConfig {
                allow_comments: false,
                max_depth: 16,
            },
            ..CheckConfig::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: CheckConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_yaml_errors() {
        assert!(matches!(
            CheckConfig::from_yaml_str("reader: [1, 2]"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CheckConfig::from_yaml_str("reader:\n  max_depth: 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FSMGEN_ALLOW_COMMENTS", "off"),
            ("FSMGEN_MAX_DEPTH", "32"),
            ("FSMGEN_CHECK_PATHS", "false"),
            ("FSMGEN_CHECK_CALLBACK_NAMES", "maybe"),
        ]
        .into_iter()
        .collect();

        let mut config = CheckConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert!(!config.reader.allow_comments);
        assert_eq!(config.reader.max_depth, 32);
        assert!(!config.checks.paths);
        assert!(config.checks.unused_timers);
        // Unparseable values are ignored.
        assert!(config.checks.callback_names);
    }

    #[test]
    fn test_zero_depth_override_is_ignored() {
        let mut config = CheckConfig::default();
        config.apply_overrides(|key| (key == "FSMGEN_MAX_DEPTH").then(|| "0".to_string()));
        assert_eq!(config.reader.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.validate().is_ok());
        let options = config.reader.options();
        assert!(fsmgen_token::read_str("{}", &options).is_ok());

        let mut config = CheckConfig::default();
        config.apply_overrides(|key| (key == "FSMGEN_MAX_DEPTH").then(|| "-3".to_string()));
        assert_eq!(config.reader.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_reader_options() {
        let options = ReaderConfig::default().options();
        assert_eq!(options, ReaderOptions::default());
    }
}
