// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Run configuration, loadable from TOML.
//!
//! ```toml
//! jobs = 4
//! expect_error = "match"
//! language_tags = ["js", "javascript"]
//!
//! [policy]
//! timeout_ms = 2000
//! max_steps = 500000
//! allow = ["print", "assert", "timers"]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::policy::PolicyConfig;

/// How an `expect-error=<Name>` annotation is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectErrorPolicy {
    /// Any throw satisfies the annotation.
    #[serde(rename = "any")]
    AnyThrow,
    /// A declared name must equal the thrown error's name.
    #[default]
    #[serde(rename = "match")]
    MatchDeclared,
}

impl fmt::Display for ExpectErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExpectErrorPolicy::AnyThrow => "any",
            ExpectErrorPolicy::MatchDeclared => "match",
        })
    }
}

impl FromStr for ExpectErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(ExpectErrorPolicy::AnyThrow),
            "match" => Ok(ExpectErrorPolicy::MatchDeclared),
            other => Err(ConfigError::Invalid(format!(
                "unknown expect-error policy '{}' (expected 'any' or 'match')",
                other
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for a whole batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Worker threads; `None` uses the available parallelism.
    pub jobs: Option<usize>,
    pub policy: PolicyConfig,
    pub expect_error: ExpectErrorPolicy,
    /// Fence tags treated as the script language.
    pub language_tags: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            policy: PolicyConfig::default(),
            expect_error: ExpectErrorPolicy::default(),
            language_tags: vec!["js".to_string(), "javascript".to_string()],
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == Some(0) {
            return Err(ConfigError::Invalid("jobs must be at least 1".to_string()));
        }
        if self.policy.timeout_ms == 0 {
            return Err(ConfigError::Invalid("policy.timeout_ms must be positive".to_string()));
        }
        if self.language_tags.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("language_tags must name at least one tag".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litmus_interp::Capability;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_full_file() {
        let config = RunConfig::from_toml_str(
            r#"
jobs = 2
expect_error = "any"
language_tags = ["mjs"]

[policy]
timeout_ms = 100
max_steps = 5000
allow = ["print", "fs"]
random_seed = 9
"#,
        )
        .unwrap();
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.expect_error, ExpectErrorPolicy::AnyThrow);
        assert_eq!(config.language_tags, vec!["mjs"]);
        assert_eq!(config.policy.max_steps, Some(5000));
        assert!(config.policy.allow.allows(Capability::Fs));
        assert_eq!(config.policy.random_seed, 9);
        assert_eq!(config.policy.max_call_depth, PolicyConfig::default().max_call_depth);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            RunConfig::from_toml_str("jobs = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("[policy]\ntimeout_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("[policy]\nallow = [\"disk\"]"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("colour = true"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_expect_error_policy_from_str() {
        assert_eq!("any".parse::<ExpectErrorPolicy>().unwrap(), ExpectErrorPolicy::AnyThrow);
        assert_eq!("match".parse::<ExpectErrorPolicy>().unwrap(), ExpectErrorPolicy::MatchDeclared);
        assert!("strict".parse::<ExpectErrorPolicy>().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RunConfig::load(Path::new("/nonexistent/litmus.toml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to read /nonexistent/litmus.toml"));
    }
}
