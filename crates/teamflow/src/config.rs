use std::path::Path;
use std::{fmt, fs, io};

use serde::Deserialize;
use teamflow_core::{AgentBuilder, WorkflowBuilder};

/// A member of the roster, as written in a workflow file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberConfig {
    /// The identity of the member.
    pub role: String,
    /// What the member is capable of.
    pub description: String,
}

/// A workflow, as written in a JSON file.
///
/// ```json
/// {
///   "members": [{ "role": "Reporter", "description": "Writes reports" }],
///   "description": "Write a report about the weather",
///   "output": "A markdown report",
///   "knowledge": "It is raining",
///   "max_iterations": 20
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// The roster.
    pub members: Vec<MemberConfig>,
    /// The work to be done.
    pub description: String,
    /// The expected output.
    pub output: String,
    /// Knowledge shared with every member.
    #[serde(default)]
    pub knowledge: Option<String>,
    /// The iteration budget, the engine's default if absent.
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

/// An error that occurred while loading a workflow file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file can't be read.
    Io(io::Error),
    /// The file is not a valid workflow.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read workflow: {err}"),
            ConfigError::Parse(err) => write!(f, "invalid workflow: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl WorkflowConfig {
    /// Parses a workflow from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(ConfigError::Parse)?;
        if config.members.is_empty() {
            warn!("the workflow has no members, every task will fail");
        }
        Ok(config)
    }

    /// Reads a workflow from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&json)
    }

    /// Applies this configuration to a workflow builder.
    pub fn apply(self, mut builder: WorkflowBuilder) -> WorkflowBuilder {
        for member in self.members {
            builder = builder.with_member(
                AgentBuilder::new(member.role, member.description).build(),
            );
        }
        builder = builder
            .with_description(self.description)
            .with_output(self.output);
        if let Some(knowledge) = self.knowledge {
            builder = builder.with_knowledge(knowledge);
        }
        if let Some(max_iterations) = self.max_iterations {
            builder = builder.with_max_iterations(max_iterations);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use teamflow_test_model::TestModelProvider;

    use super::*;

    #[test]
    fn test_bundled_workflow() {
        let json = include_str!("../workflows/pre_visit_note.json");
        let config = WorkflowConfig::from_json(json).unwrap();
        let roles: Vec<_> =
            config.members.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["Nurse", "Reporter"]);
        assert_eq!(config.knowledge, None);
        assert_eq!(config.max_iterations, Some(50));
    }

    #[test]
    fn test_apply() {
        let config = WorkflowConfig::from_json(
            r#"{
                "members": [{ "role": "Poet", "description": "Writes" }],
                "description": "Write a haiku",
                "output": "Three lines",
                "knowledge": "Autumn"
            }"#,
        )
        .unwrap();
        let workflow = config
            .apply(WorkflowBuilder::with_model_provider(
                TestModelProvider::default(),
            ))
            .build();

        assert_eq!(workflow.members()[0].role(), "Poet");
        assert_eq!(workflow.description(), "Write a haiku");
        assert_eq!(workflow.knowledge(), Some("Autumn"));
        assert_eq!(workflow.max_iterations(), 50);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = WorkflowConfig::from_json(
            r#"{ "members": [], "description": "", "output": "", "model": "x" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
