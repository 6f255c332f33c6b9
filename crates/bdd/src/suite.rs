use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use teamflow_core::{Workflow, WorkflowState};

/// A check of a test case that runs as code, instead of being judged by
/// the model.
#[async_trait]
pub trait CustomCheck: Send + Sync {
    /// Checks the state the test case was requested for.
    async fn check(
        &self,
        workflow: &Workflow,
        state: &WorkflowState,
    ) -> SingleTestResult;
}

#[async_trait]
impl<F> CustomCheck for F
where
    F: Fn(&Workflow, &WorkflowState) -> SingleTestResult + Send + Sync,
{
    async fn check(
        &self,
        workflow: &Workflow,
        state: &WorkflowState,
    ) -> SingleTestResult {
        (self)(workflow, state)
    }
}

/// One expectation about a workflow run.
#[derive(Clone)]
pub struct TestCase {
    /// The identifier of the case, unique within a suite.
    pub id: String,
    /// What is expected, in plain words.
    pub case: String,
    /// The custom check, if the case isn't judged by the model.
    pub run: Option<Arc<dyn CustomCheck>>,
}

impl TestCase {
    /// Creates a case judged by the model.
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, case: S2) -> Self {
        Self {
            id: id.into(),
            case: case.into(),
            run: None,
        }
    }

    /// Creates a case checked by code.
    pub fn custom<S1, S2, C>(id: S1, case: S2, check: C) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        C: CustomCheck + 'static,
    {
        Self {
            id: id.into(),
            case: case.into(),
            run: Some(Arc::new(check)),
        }
    }
}

impl Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("id", &self.id)
            .field("case", &self.case)
            .field("custom", &self.run.is_some())
            .finish()
    }
}

/// How results with the same id are reduced when a case is checked more
/// than once in a run, e.g. because a member finished several tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// A single failure fails the case.
    #[default]
    FailOverrides,
    /// A single pass passes the case.
    PassOverrides,
}

impl MergePolicy {
    fn should_replace(
        self,
        current: &SingleTestResult,
        incoming: &SingleTestResult,
    ) -> bool {
        match self {
            MergePolicy::FailOverrides => current.passed && !incoming.passed,
            MergePolicy::PassOverrides => incoming.passed,
        }
    }

    /// Reduces results to one result per id, in order of first
    /// appearance.
    pub fn merge<I>(self, results: I) -> Vec<SingleTestResult>
    where
        I: IntoIterator<Item = SingleTestResult>,
    {
        let mut merged: Vec<SingleTestResult> = Vec::new();
        for result in results {
            match merged.iter_mut().find(|r| r.id == result.id) {
                Some(current) if self.should_replace(current, &result) => {
                    *current = result;
                }
                Some(_) => {}
                None => merged.push(result),
            }
        }
        merged
    }
}

/// Test cases for a whole workflow and for individual members.
#[derive(Clone, Debug, Default)]
pub struct TestSuite {
    /// Cases checked once the whole workflow finished.
    pub workflow: Vec<TestCase>,
    /// Cases checked every time the named member finished a branch of
    /// work.
    pub team: HashMap<String, Vec<TestCase>>,
    /// How repeated results are reduced.
    pub merge_policy: MergePolicy,
}

impl TestSuite {
    /// Creates an empty suite.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a case for the whole workflow.
    #[inline]
    pub fn with_workflow_case(mut self, case: TestCase) -> Self {
        self.workflow.push(case);
        self
    }

    /// Adds a case for the member with the given role.
    #[inline]
    pub fn with_member_case<S: Into<String>>(
        mut self,
        role: S,
        case: TestCase,
    ) -> Self {
        self.team.entry(role.into()).or_default().push(case);
        self
    }

    /// Sets the merge policy.
    #[inline]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }
}

/// The verdict on one test case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SingleTestResult {
    /// The id of the test case.
    pub id: String,
    /// Why the test case passed or not.
    pub reasoning: String,
    /// Whether the test case passed.
    pub passed: bool,
}

/// A batch of test cases to check against one state.
#[derive(Clone, Debug)]
pub struct TestRequest {
    /// The state to check.
    pub state: WorkflowState,
    /// The cases to check.
    pub tests: Vec<TestCase>,
    /// The agents that acted before the state, in order.
    pub agents_routing: Vec<String>,
}

/// The outcome of one [`TestRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestResults {
    /// The cases were judged.
    Suite(Vec<SingleTestResult>),
    /// The judge couldn't run the cases.
    Error {
        /// Why the cases couldn't be run.
        reasoning: String,
    },
}

/// The outcome of a whole test run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestSuiteResult {
    /// `true` if every case passed and every request could be judged.
    pub passed: bool,
    /// One result per case id, reduced with the suite's merge policy.
    pub results: Vec<SingleTestResult>,
    /// The raw outcome of every request.
    pub reports: Vec<TestResults>,
}
