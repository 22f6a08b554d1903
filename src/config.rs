//! Runner configuration
//!
//! Loaded from a JSON file whose every field is optional:
//!
//! ```json
//! {
//!   "sandbox": { "timeoutMs": 2000, "maxOperations": 10000000 },
//!   "strip": { "enums": false }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sandbox::SandboxConfig;
use crate::strip::StripRules;
use crate::test_runner::Orchestrator;

/// Smallest accepted worker stack
const MIN_STACK_SIZE: usize = 1024 * 1024;

/// Optional rewrites on top of the core stripping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StripConfig {
    /// `as`, `satisfies`, non-null `!`, class member modifiers and the like
    pub expression_types: bool,
    /// Rewrite `enum` declarations into lookup objects
    pub enums: bool,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            expression_types: true,
            enums: true,
        }
    }
}

impl StripConfig {
    fn optional(&self) -> StripRules {
        let mut rules = StripRules::empty();
        rules.set(StripRules::EXPRESSION_TYPES, self.expression_types);
        rules.set(StripRules::ENUMS, self.enums);
        rules
    }

    /// Rules applied to learner submissions.
    pub fn learner_rules(&self) -> StripRules {
        (StripRules::LEARNER - StripRules::EXPRESSION_TYPES - StripRules::ENUMS) | self.optional()
    }

    /// Rules applied to mission test scripts.
    pub fn test_rules(&self) -> StripRules {
        self.learner_rules() | StripRules::IMPORTS
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub sandbox: SandboxConfig,
    pub strip: StripConfig,
}

impl RunnerConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration text.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let sandbox = &self.sandbox;
        if sandbox.max_operations == 0 {
            return Err(Error::ConfigError("maxOperations must be positive".into()));
        }
        if sandbox.max_call_depth == 0 {
            return Err(Error::ConfigError("maxCallDepth must be positive".into()));
        }
        if sandbox.stack_size < MIN_STACK_SIZE {
            return Err(Error::ConfigError(format!(
                "stackSize must be at least {} bytes",
                MIN_STACK_SIZE
            )));
        }
        Ok(())
    }

    /// An orchestrator using these settings.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.sandbox.clone())
            .with_rules(self.strip.learner_rules(), self.strip.test_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::from_json("{}").unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.strip.learner_rules(), StripRules::LEARNER);
        assert_eq!(config.strip.test_rules(), StripRules::TEST_CODE);
    }

    #[test]
    fn test_partial_override() {
        let config = RunnerConfig::from_json(r#"{"sandbox": {"timeoutMs": 250}, "strip": {"enums": false}}"#).unwrap();
        assert_eq!(config.sandbox.timeout_ms, 250);
        assert_eq!(config.sandbox.max_call_depth, 400);
        assert!(!config.strip.learner_rules().contains(StripRules::ENUMS));
        assert!(config.strip.learner_rules().contains(StripRules::EXPRESSION_TYPES));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RunnerConfig::from_json("{ not json"),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            RunnerConfig::from_json(r#"{"sandbox": {"maxOperations": 0}}"#),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            RunnerConfig::from_json(r#"{"sandbox": {"stackSize": 1024}}"#),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sandbox": {{"randomSeed": 7}}}}"#).unwrap();
        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.sandbox.random_seed, 7);

        let missing = RunnerConfig::load("/nonexistent/mission-runner.json");
        assert!(matches!(missing, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_orchestrator_uses_config() {
        let config = RunnerConfig::from_json(r#"{"sandbox": {"maxOperations": 1000}}"#).unwrap();
        let report = config
            .orchestrator()
            .run("", "test('spin', () => { while (true) {} })");
        assert!(report.error.unwrap_or_default().contains("OperationLimit"));
    }
}
