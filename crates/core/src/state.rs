//! Workflow states, the values the engine transforms.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use teamflow_model::{MessageContent, ModelMessage, ToolCallRequest};

use crate::Workflow;

/// The lifecycle status of a state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Nothing happened yet.
    #[default]
    Idle,
    /// The active agent (or the supervisor) acts next.
    Running,
    /// Tool calls at the tail of the transcript wait for execution.
    Paused,
    /// The work is done.
    Finished,
    /// The last model round-trip failed. The engine turns this into
    /// `Finished` on the next step.
    Failed,
    /// The iteration budget is exhausted, a forced finalization is next.
    Interrupted,
}

impl Status {
    /// Returns `true` if the run has an outcome, successful or not.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Failed)
    }
}

/// Who is acting in a state.
///
/// The reserved system roles can't collide with user-defined agents,
/// even if a member is named "supervisor".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRef {
    /// Decomposes the work and routes tasks to members.
    Supervisor,
    /// Produces the best-effort answer once the budget is exhausted.
    FinalBoss,
    /// A member of the roster, by role name.
    Member(String),
}

impl AgentRef {
    /// Creates a reference to a roster member.
    #[inline]
    pub fn member<S: Into<String>>(role: S) -> Self {
        AgentRef::Member(role.into())
    }
}

impl Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRef::Supervisor => write!(f, "<supervisor>"),
            AgentRef::FinalBoss => write!(f, "<final boss>"),
            AgentRef::Member(role) => write!(f, "{role}"),
        }
    }
}

/// A node of the state tree.
///
/// A state with children is a fan-out node: its transcript only becomes
/// authoritative again after all children finished, at which point their
/// transcripts are appended in child order and the children are cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The lifecycle status.
    pub status: Status,
    /// The acting agent.
    pub agent: AgentRef,
    /// The transcript, in causal order.
    pub messages: Vec<ModelMessage>,
    /// Concurrent branches, in declaration order.
    pub children: Vec<WorkflowState>,
}

impl WorkflowState {
    /// Creates an idle state for the given agent, with an empty
    /// transcript and no children.
    #[inline]
    pub fn new(agent: AgentRef) -> Self {
        Self {
            status: Status::Idle,
            agent,
            messages: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets the status.
    #[inline]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Sets the acting agent.
    #[inline]
    pub fn with_agent(mut self, agent: AgentRef) -> Self {
        self.agent = agent;
        self
    }

    /// Sets the transcript.
    #[inline]
    pub fn with_messages(mut self, messages: Vec<ModelMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Appends messages to the transcript.
    #[inline]
    pub fn append<I: IntoIterator<Item = ModelMessage>>(
        mut self,
        messages: I,
    ) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Sets the children.
    #[inline]
    pub fn with_children(mut self, children: Vec<WorkflowState>) -> Self {
        self.children = children;
        self
    }

    /// Returns the node at `path`, where each item is a child index.
    ///
    /// An empty path addresses this state.
    pub fn node(&self, path: &[usize]) -> Option<&WorkflowState> {
        path.iter()
            .try_fold(self, |node, idx| node.children.get(*idx))
    }

    /// Returns the number of messages in this state and all its
    /// descendants.
    pub fn transcript_len(&self) -> usize {
        self.messages.len()
            + self
                .children
                .iter()
                .map(WorkflowState::transcript_len)
                .sum::<usize>()
    }

    /// Appends every child transcript, in child order, and clears the
    /// children.
    pub(crate) fn merge_children(mut self) -> Self {
        let children = std::mem::take(&mut self.children);
        for child in children {
            self.messages.extend(child.messages);
        }
        self
    }

    /// Returns the tool calls waiting at the tail of the transcript.
    pub(crate) fn pending_tool_calls(
        &self,
    ) -> Option<(&str, &[ToolCallRequest])> {
        match self.messages.last()?.content() {
            MessageContent::ToolCalls { agent, calls } => {
                Some((agent.as_str(), calls.as_slice()))
            }
            _ => None,
        }
    }
}

/// Creates the initial state of a workflow run.
///
/// The supervisor acts first, on a transcript seeded with the workflow's
/// description and expected output.
pub fn root_state(workflow: &Workflow) -> WorkflowState {
    WorkflowState::new(AgentRef::Supervisor).with_messages(vec![
        ModelMessage::user(format!(
            "Here is description of my workflow and expected output:\n\
             <workflow>{}</workflow>\n\
             <output>{}</output>",
            workflow.description.trim(),
            workflow.output.trim(),
        )),
    ])
}

/// Returns the content of the last message of a state.
#[inline]
pub fn solution(state: &WorkflowState) -> Option<&MessageContent> {
    state.messages.last().map(ModelMessage::content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str) -> WorkflowState {
        WorkflowState::new(AgentRef::member("Writer"))
            .with_status(Status::Finished)
            .with_messages(vec![ModelMessage::assistant(text)])
    }

    #[test]
    fn test_node_addressing() {
        let inner = WorkflowState::new(AgentRef::Supervisor)
            .with_children(vec![leaf("a"), leaf("b")]);
        let root = WorkflowState::new(AgentRef::Supervisor)
            .with_children(vec![leaf("c"), inner]);

        assert_eq!(root.node(&[]), Some(&root));
        assert_eq!(root.node(&[1, 1]), Some(&leaf("b")));
        assert_eq!(root.node(&[1, 2]), None);
        assert_eq!(root.node(&[0, 0]), None);
        assert_eq!(root.transcript_len(), 3);
    }

    #[test]
    fn test_merge_children_keeps_child_order() {
        let parent = WorkflowState::new(AgentRef::Supervisor)
            .with_messages(vec![ModelMessage::user("split it")])
            .with_children(vec![leaf("first"), leaf("second")]);

        let merged = parent.merge_children();
        assert!(merged.children.is_empty());
        let texts: Vec<_> = merged
            .messages
            .iter()
            .map(|m| m.content().to_text().into_owned())
            .collect();
        assert_eq!(texts, ["split it", "first", "second"]);
    }

    #[test]
    fn test_reserved_roles_never_collide() {
        assert_ne!(AgentRef::Supervisor, AgentRef::member("supervisor"));
        assert_eq!(AgentRef::member("supervisor").to_string(), "supervisor");
        assert_eq!(AgentRef::Supervisor.to_string(), "<supervisor>");
    }
}
