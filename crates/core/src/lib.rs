//! The engine coordinating a team of model-backed agents: transcripts,
//! tools, agent turns, the supervisor policy and the workflow state
//! machine.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod engine;
mod error;
mod model_client;
pub mod observer;
pub mod state;
pub mod supervisor;
pub mod tool;
mod workflow;

pub use agent::{Agent, AgentBuilder};
pub use engine::{advance, iterate, run};
pub use error::{Error, ErrorKind};
pub use model_client::{ChatOutcome, ModelClient};
pub use state::{AgentRef, Status, WorkflowState, root_state, solution};
pub use teamflow_model::{
    MessageContent, ModelMessage, Role, ToolCallRequest, ToolCallResult,
};
pub use workflow::{Workflow, WorkflowBuilder};
