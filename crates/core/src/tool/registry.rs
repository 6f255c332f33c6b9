use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use teamflow_model::ModelTool;

use crate::tool::{AnyTool, Tool, ToolObject};

/// A set of uniquely named tools owned by one agent.
///
/// Cloning the registry is cheap, tools are shared between clones.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    pub(crate) tools: BTreeMap<String, Arc<dyn ToolObject>>,
}

impl ToolRegistry {
    /// Registers a tool.
    ///
    /// Tool names are unique within a registry, registering a tool with
    /// a name that is already taken replaces the previous one.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        if self.tools.contains_key(&name) {
            warn!("replacing tool: {name}");
        }
        self.tools.insert(name, Arc::new(AnyTool(tool)));
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the names of the registered tools, in sorted order.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Returns the definitions to offer to the model.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}
