//! Behaviour tests for workflows.
//!
//! A [`TestSuite`] lists expectations about a whole run and about the
//! work of individual members. [`testwork`] runs the workflow with a
//! [`TestingObserver`] attached, then has every queued request judged by
//! the workflow's model or checked by custom code.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod observer;
mod suite;
mod validate;

use futures_util::future::try_join_all;
use teamflow_core::{Status, Workflow, WorkflowState, iterate, root_state};

pub use error::{Error, ErrorKind};
pub use observer::TestingObserver;
pub use suite::*;
pub use validate::validate;

/// Runs the workflow from its root state and checks the suite.
pub async fn testwork(
    workflow: &Workflow,
    suite: TestSuite,
) -> Result<TestSuiteResult, Error> {
    testwork_from(workflow, suite, root_state(workflow)).await
}

/// Runs the workflow from `state` and checks the suite.
///
/// Fails if the workflow ends in a failed state.
pub async fn testwork_from(
    workflow: &Workflow,
    suite: TestSuite,
    state: WorkflowState,
) -> Result<TestSuiteResult, Error> {
    let policy = suite.merge_policy;
    let observer = TestingObserver::new(suite);
    let workflow = workflow.with_observer(observer.clone());

    let mut state = state;
    loop {
        state = iterate(&state, &workflow).await?;
        match state.status {
            Status::Finished => break,
            Status::Failed => {
                let reason = teamflow_core::solution(&state)
                    .map(|content| content.to_text().into_owned())
                    .unwrap_or_default();
                return Err(Error::workflow_failed(reason));
            }
            _ => {}
        }
    }

    let requests = observer.take_requests();
    for req in &requests {
        let ids: Vec<_> = req.tests.iter().map(|t| t.id.as_str()).collect();
        info!("running test suite [{}]", ids.join(", "));
    }
    let reports =
        try_join_all(requests.iter().map(|req| validate(&workflow, req)))
            .await?;

    let results = policy.merge(reports.iter().flat_map(|report| {
        match report {
            TestResults::Suite(tests) => tests.clone(),
            TestResults::Error { .. } => Vec::new(),
        }
    }));
    for result in &results {
        let verdict = if result.passed { "PASSED" } else { "FAIL" };
        info!("{}: {verdict} ({})", result.id, result.reasoning);
    }

    let passed = results.iter().all(|result| result.passed)
        && reports
            .iter()
            .all(|report| matches!(report, TestResults::Suite(_)));
    Ok(TestSuiteResult {
        passed,
        results,
        reports,
    })
}
