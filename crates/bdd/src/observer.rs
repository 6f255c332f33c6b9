use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use teamflow_core::observer::{Observer, Transition};
use teamflow_core::{AgentRef, Status, WorkflowState};

use crate::suite::{TestRequest, TestSuite};

#[derive(Debug, Default)]
struct Recorder {
    routing: Vec<String>,
    requests: Vec<TestRequest>,
}

/// Watches a run and queues test requests for finished work.
///
/// A request for the workflow cases is queued when the whole workflow
/// finishes. A request for a member's cases is queued each time that
/// member finishes a piece of work, either a turn handed back to the
/// supervisor or a parallel branch.
#[derive(Clone, Debug)]
pub struct TestingObserver {
    suite: Arc<TestSuite>,
    recorder: Arc<Mutex<Recorder>>,
}

impl TestingObserver {
    /// Creates an observer for the given suite.
    pub fn new(suite: TestSuite) -> Self {
        Self {
            suite: Arc::new(suite),
            recorder: Arc::default(),
        }
    }

    /// Returns the agents that acted so far, in order.
    pub fn agents_routing(&self) -> Vec<String> {
        self.recorder().routing.clone()
    }

    /// Returns the queued requests and clears the queue.
    pub fn take_requests(&self) -> Vec<TestRequest> {
        std::mem::take(&mut self.recorder().requests)
    }

    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn observe(&self, transition: Transition<'_>) {
        let Transition {
            prev,
            next,
            finished_branches,
        } = transition;
        let mut recorder = self.recorder();
        recorder.routing.push(next.agent.to_string());
        if prev.children.is_empty() {
            let branches = next.children.iter().map(|c| c.agent.to_string());
            recorder.routing.extend(branches);
        }

        let workflow_done = next.status == Status::Finished
            && prev.status != Status::Finished
            && matches!(
                next.agent,
                AgentRef::Supervisor | AgentRef::FinalBoss
            );
        if workflow_done && !self.suite.workflow.is_empty() {
            info!("requesting the workflow test suite");
            let agents_routing = recorder.routing.clone();
            recorder.requests.push(TestRequest {
                state: next.clone(),
                tests: self.suite.workflow.clone(),
                agents_routing,
            });
        }

        // A member at the root hands back to the supervisor when its turn
        // completes.
        if let AgentRef::Member(role) = &prev.agent {
            if next.agent == AgentRef::Supervisor && next.children.is_empty() {
                let state = next
                    .clone()
                    .with_agent(prev.agent.clone())
                    .with_status(Status::Finished);
                self.request_member_tests(&mut recorder, role, state);
            }
        }

        for branch in finished_branches {
            if let AgentRef::Member(role) = &branch.agent {
                self.request_member_tests(&mut recorder, role, branch.clone());
            }
        }
    }

    fn request_member_tests(
        &self,
        recorder: &mut Recorder,
        role: &str,
        state: WorkflowState,
    ) {
        let Some(tests) = self.suite.team.get(role) else {
            return;
        };
        info!("requesting the test suite for agent [{role}]");
        recorder.requests.push(TestRequest {
            state,
            tests: tests.clone(),
            agents_routing: vec![role.to_owned()],
        });
    }
}

#[async_trait]
impl Observer for TestingObserver {
    async fn on_transition(&self, transition: Transition<'_>) {
        if transition.is_noop() {
            return;
        }
        self.observe(transition);
    }
}

#[cfg(test)]
mod tests {
    use teamflow_core::ModelMessage;

    use super::*;
    use crate::suite::TestCase;

    fn suite() -> TestSuite {
        TestSuite::new()
            .with_workflow_case(TestCase::new("1", "Has a title"))
            .with_member_case("Nurse", TestCase::new("2", "Asks once"))
    }

    fn branch(role: &str, status: Status) -> WorkflowState {
        WorkflowState::new(AgentRef::member(role))
            .with_status(status)
            .with_messages(vec![ModelMessage::user("Do it")])
    }

    #[tokio::test]
    async fn test_finished_branches_are_requested() {
        let observer = TestingObserver::new(suite());
        let prev = WorkflowState::new(AgentRef::Supervisor)
            .with_status(Status::Running)
            .with_messages(vec![ModelMessage::user("Write a note")])
            .with_children(vec![
                branch("Nurse", Status::Running),
                branch("Reporter", Status::Running),
            ]);
        let finished = [
            branch("Nurse", Status::Finished),
            branch("Reporter", Status::Finished),
        ];
        let merged = prev
            .clone()
            .with_children(Vec::new())
            .append(finished.iter().flat_map(|b| b.messages.clone()));

        observer
            .on_transition(
                Transition::new(&prev, &merged)
                    .with_finished_branches(&finished),
            )
            .await;

        let requests = observer.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].state, finished[0]);
        assert_eq!(requests[0].tests[0].id, "2");
        assert!(observer.take_requests().is_empty());
    }

    #[tokio::test]
    async fn test_root_turns_and_completion_are_requested() {
        let observer = TestingObserver::new(suite());
        let root = WorkflowState::new(AgentRef::Supervisor)
            .with_status(Status::Running)
            .with_messages(vec![ModelMessage::user("Write a note")]);
        let assigned = root.clone().with_agent(AgentRef::member("Nurse"));
        let delivered = assigned
            .clone()
            .with_agent(AgentRef::Supervisor)
            .append([ModelMessage::assistant("Fever")]);
        let finished = delivered.clone().with_status(Status::Finished);

        for (prev, next) in [
            (&root, &assigned),
            (&assigned, &delivered),
            (&delivered, &finished),
            (&finished, &finished),
        ] {
            observer.on_transition(Transition::new(prev, next)).await;
        }

        assert_eq!(
            observer.agents_routing(),
            ["Nurse", "<supervisor>", "<supervisor>"]
        );
        let requests = observer.take_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].state.agent, AgentRef::member("Nurse"));
        assert_eq!(requests[0].state.status, Status::Finished);
        assert_eq!(requests[1].state, finished);
        assert_eq!(requests[1].agents_routing.len(), 3);
    }
}
