use serde_json::Value;
use teamflow_model::ModelProvider;

use super::Agent;
use crate::model_client::ModelClient;
use crate::tool::{Tool, ToolRegistry};

/// [`Agent`] builder.
pub struct AgentBuilder {
    role: String,
    description: String,
    tools: ToolRegistry,
    model_client: Option<ModelClient>,
    output_schema: Option<Value>,
}

impl AgentBuilder {
    /// Creates a new builder for an agent with the given identity and
    /// capability description.
    ///
    /// The description is what the supervisor reads when it picks an
    /// agent for a task, and what the agent is told about itself.
    #[inline]
    pub fn new<S1: Into<String>, S2: Into<String>>(
        role: S1,
        description: S2,
    ) -> Self {
        Self {
            role: role.into(),
            description: description.into(),
            tools: ToolRegistry::default(),
            model_client: None,
            output_schema: None,
        }
    }

    /// Backs the agent with its own model provider, instead of the
    /// workflow's default one.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        mut self,
        provider: P,
    ) -> Self {
        self.model_client = Some(ModelClient::new(provider));
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.add_tool(tool);
        self
    }

    /// Sets the JSON schema of the agent's deliverable.
    ///
    /// By default, the agent answers with plain text.
    #[inline]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent {
            role: self.role,
            description: self.description,
            tools: self.tools,
            model_client: self.model_client,
            output_schema: self.output_schema,
        }
    }
}
