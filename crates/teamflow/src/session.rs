use teamflow_core::observer::{TracingObserver, Transition};
use teamflow_core::{
    Error, MessageContent, Status, Workflow, WorkflowBuilder, WorkflowState,
    iterate, root_state, solution,
};
use teamflow_model::ModelProvider;

use crate::config::WorkflowConfig;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    workflow_builder: WorkflowBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    ///
    /// Transitions are logged with `tracing` out of the box.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let workflow_builder = WorkflowBuilder::with_model_provider(provider)
            .with_observer(TracingObserver);
        Self { workflow_builder }
    }

    /// Configures the workflow from a workflow file.
    #[inline]
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.workflow_builder = config.apply(self.workflow_builder);
        self
    }

    /// Configures the workflow directly.
    #[inline]
    pub fn with_workflow(
        mut self,
        configure: impl FnOnce(WorkflowBuilder) -> WorkflowBuilder,
    ) -> Self {
        self.workflow_builder = configure(self.workflow_builder);
        self
    }

    /// Attaches a callback to be invoked after every step.
    #[inline]
    pub fn on_transition(
        mut self,
        on_transition: impl Fn(&WorkflowState, &WorkflowState)
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.workflow_builder =
            self.workflow_builder.with_observer(move |t: Transition<'_>| {
                on_transition(t.prev, t.next)
            });
        self
    }

    /// Builds a new session, positioned at the root state of the workflow.
    pub fn build(self) -> Session {
        let workflow = self.workflow_builder.build();
        let state = root_state(&workflow);
        Session { workflow, state }
    }
}

/// One run of a workflow, advanced step by step.
///
/// The session holds the workflow and its latest state, and is basically a
/// wrapper around [`iterate`].
pub struct Session {
    workflow: Workflow,
    state: WorkflowState,
}

impl Session {
    /// Returns the workflow of the session.
    #[inline]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns the latest state.
    #[inline]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Returns `true` once the run has an outcome.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.status.is_terminal()
    }

    /// Advances the run by one step.
    pub async fn step(&mut self) -> Result<&WorkflowState, Error> {
        self.state = iterate(&self.state, &self.workflow).await?;
        Ok(&self.state)
    }

    /// Returns the outcome of the run, once it is done.
    ///
    /// A failed run yields its error message prefixed with
    /// `Workflow failed:`.
    pub fn outcome(&self) -> Option<MessageContent> {
        let content = solution(&self.state)?;
        match self.state.status {
            Status::Finished => Some(content.clone()),
            Status::Failed => Some(MessageContent::Text(format!(
                "Workflow failed: {content}"
            ))),
            _ => None,
        }
    }

    /// Steps until the run is done and returns its outcome.
    pub async fn run(&mut self) -> Result<MessageContent, Error> {
        while !self.is_done() {
            self.step().await?;
        }
        self.outcome().ok_or_else(Error::empty_transcript)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use teamflow_core::{AgentBuilder, AgentRef};
    use teamflow_test_model::TestModelProvider;

    use super::*;

    #[tokio::test]
    async fn test_session_steps_to_completion() {
        let mut provider = TestModelProvider::default();
        provider
            .add_structured(
                "next_task",
                json!({ "reasoning": "Start", "task": "Write a haiku" }),
            )
            .add_structured(
                "select_agent",
                json!({ "reasoning": "Poems", "agent": "Poet" }),
            )
            .add_structured("complete", json!({ "result": "Leaves fall" }))
            .add_structured("complete", json!({ "reasoning": "Done" }));

        let steps = Arc::new(Mutex::new(0));
        let mut session = SessionBuilder::with_model_provider(provider)
            .with_workflow(|builder| {
                builder
                    .with_member(AgentBuilder::new("Poet", "Writes").build())
                    .with_description("Write a haiku")
                    .with_output("Three lines")
            })
            .on_transition({
                let steps = Arc::clone(&steps);
                move |_, _| *steps.lock().unwrap() += 1
            })
            .build();

        let state = session.step().await.unwrap();
        assert_eq!(state.agent, AgentRef::member("Poet"));
        assert!(session.outcome().is_none());

        let outcome = session.run().await.unwrap();
        assert_eq!(outcome, MessageContent::Text("Leaves fall".to_owned()));
        assert_eq!(*steps.lock().unwrap(), 3);
        assert!(session.is_done());
    }

    #[tokio::test]
    async fn test_failed_outcome() {
        let mut session =
            SessionBuilder::with_model_provider(TestModelProvider::default())
                .build();

        let outcome = session.run().await.unwrap();
        assert!(outcome.to_text().starts_with("Workflow failed: "));
        assert_eq!(session.state().status, Status::Failed);
    }
}
