mod builder;
mod turn;

use serde_json::Value;

use crate::model_client::ModelClient;
use crate::tool::ToolRegistry;
pub use builder::AgentBuilder;
pub(crate) use turn::{TurnOutcome, run_turn};

/// A member of a team: a named capability profile backed by a model
/// provider and an optional set of tools.
///
/// Agents are immutable once built. Cloning an agent is cheap.
#[derive(Clone, Debug)]
pub struct Agent {
    pub(crate) role: String,
    pub(crate) description: String,
    pub(crate) tools: ToolRegistry,
    pub(crate) model_client: Option<ModelClient>,
    pub(crate) output_schema: Option<Value>,
}

impl Agent {
    /// Returns the identity of this agent.
    #[inline]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the capability description of this agent.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the tools of this agent.
    #[inline]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Returns the model client of this agent, falling back to the given
    /// default when the agent doesn't have its own provider.
    #[inline]
    pub(crate) fn client_or<'a>(
        &'a self,
        default: &'a ModelClient,
    ) -> &'a ModelClient {
        self.model_client.as_ref().unwrap_or(default)
    }
}
