//! Tool call supports.

mod error;
mod executor;
mod registry;

use std::future::ready;
use std::pin::Pin;

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use registry::ToolRegistry;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the working directory or the
/// current user. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    ///
    /// Arguments are validated against this schema before they are
    /// decoded into [`Tool::Input`]. A `null` schema skips validation.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        &self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        &self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        if let Err(reason) =
            validate_arguments(self.0.parameter_schema(), &arguments)
        {
            return Box::pin(ready(Err(
                Error::invalid_input().with_reason(reason)
            )));
        }
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(ready(Err(
                    Error::invalid_input().with_reason(reason)
                )));
            }
        };
        Box::pin(self.0.execute(input))
    }
}

/// Validates the arguments against a JSON schema, returning all the
/// violations joined as a single reason.
fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    if schema.is_null() {
        return Ok(());
    }

    // The `$schema` keyword is dropped so that schemas generated for newer
    // drafts are checked with the validator's default draft.
    let mut schema = schema.clone();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }

    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| format!("invalid parameter schema: {err}"))?;
    let result = compiled.validate(arguments).map_err(|errors| {
        errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    });
    result
}
