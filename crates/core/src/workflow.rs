use std::fmt::{self, Debug};
use std::sync::Arc;

use teamflow_model::ModelProvider;

use crate::agent::Agent;
use crate::model_client::ModelClient;
use crate::observer::Observer;

const DEFAULT_MAX_ITERATIONS: usize = 50;

/// The immutable configuration of one run: the roster, the goal and the
/// budget.
///
/// The engine only ever reads a workflow, so one instance can be shared
/// by all concurrent branches of a run.
#[derive(Clone)]
pub struct Workflow {
    pub(crate) members: Vec<Agent>,
    pub(crate) description: String,
    pub(crate) output: String,
    pub(crate) knowledge: Option<String>,
    pub(crate) max_iterations: usize,
    pub(crate) model_client: ModelClient,
    pub(crate) observers: Vec<Arc<dyn Observer>>,
}

impl Workflow {
    /// Returns the roster.
    #[inline]
    pub fn members(&self) -> &[Agent] {
        &self.members
    }

    /// Looks up a member by role name.
    #[inline]
    pub fn member(&self, role: &str) -> Option<&Agent> {
        self.members.iter().find(|agent| agent.role == role)
    }

    /// Returns the description of the work.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the description of the expected output.
    #[inline]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Returns the shared knowledge, if any.
    #[inline]
    pub fn knowledge(&self) -> Option<&str> {
        self.knowledge.as_deref()
    }

    /// Returns the transcript length after which the run is finalized.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns the default model client of the workflow.
    #[inline]
    pub fn model_client(&self) -> &ModelClient {
        &self.model_client
    }

    /// Returns a copy of this workflow with an extra observer attached.
    pub fn with_observer<O: Observer + 'static>(&self, observer: O) -> Self {
        let mut workflow = self.clone();
        workflow.observers.push(Arc::new(observer));
        workflow
    }
}

impl Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("members", &self.members)
            .field("description", &self.description)
            .field("output", &self.output)
            .field("knowledge", &self.knowledge)
            .field("max_iterations", &self.max_iterations)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// [`Workflow`] builder.
pub struct WorkflowBuilder {
    members: Vec<Agent>,
    description: String,
    output: String,
    knowledge: Option<String>,
    max_iterations: usize,
    model_client: ModelClient,
    observers: Vec<Arc<dyn Observer>>,
}

impl WorkflowBuilder {
    /// Creates a new builder with the specified model provider.
    ///
    /// The provider drives the supervisor and the finalization, and backs
    /// every member that doesn't have its own provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            members: Vec::new(),
            description: String::new(),
            output: String::new(),
            knowledge: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_client: ModelClient::new(provider),
            observers: Vec::new(),
        }
    }

    /// Adds a member to the roster.
    #[inline]
    pub fn with_member(mut self, agent: Agent) -> Self {
        self.members.push(agent);
        self
    }

    /// Describes the work to be done.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Describes the expected output.
    #[inline]
    pub fn with_output<S: Into<String>>(mut self, output: S) -> Self {
        self.output = output.into();
        self
    }

    /// Attaches knowledge shared with every agent.
    #[inline]
    pub fn with_knowledge<S: Into<String>>(mut self, knowledge: S) -> Self {
        self.knowledge = Some(knowledge.into());
        self
    }

    /// Sets the transcript length after which the run is finalized.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Attaches an observer that is notified after every step.
    #[inline]
    pub fn with_observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Builds the workflow.
    pub fn build(self) -> Workflow {
        for (idx, agent) in self.members.iter().enumerate() {
            if self.members[..idx].iter().any(|a| a.role == agent.role) {
                warn!("duplicated member `{}` is unreachable", agent.role);
            }
        }
        Workflow {
            members: self.members,
            description: self.description,
            output: self.output,
            knowledge: self.knowledge,
            max_iterations: self.max_iterations,
            model_client: self.model_client,
            observers: self.observers,
        }
    }
}
