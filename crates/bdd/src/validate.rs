use futures_util::future::join_all;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use teamflow_core::{ChatOutcome, ModelMessage, Workflow};
use teamflow_model::{ModelRequest, ResponseFormat, StructuredResponse};

use crate::Error;
use crate::suite::{SingleTestResult, TestRequest, TestResults};

#[derive(Deserialize, JsonSchema)]
struct SuiteVerdict {
    /// The verdict on every test case of the suite.
    tests: Vec<SingleTestResult>,
}

#[derive(Deserialize, JsonSchema)]
struct SuiteError {
    /// Why the tests can't be completed.
    reasoning: String,
}

/// Checks the cases of a request against its state.
///
/// Cases without a custom check are judged by the workflow's model in one
/// round-trip. Custom checks run concurrently.
pub async fn validate(
    workflow: &Workflow,
    req: &TestRequest,
) -> Result<TestResults, Error> {
    let judged: Vec<_> =
        req.tests.iter().filter(|test| test.run.is_none()).collect();
    let verdict = if judged.is_empty() {
        Vec::new()
    } else {
        let suite = judged
            .iter()
            .map(|test| {
                format!(
                    "<test>\n  <id>{}</id>\n  <case>{}</case>\n</test>",
                    test.id, test.case
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        match judge(workflow, req, &suite).await? {
            TestResults::Suite(tests) => tests,
            error => return Ok(error),
        }
    };

    let custom = req
        .tests
        .iter()
        .filter_map(|test| test.run.as_ref())
        .map(|check| check.check(workflow, &req.state));
    let mut tests = verdict;
    tests.extend(join_all(custom).await);
    Ok(TestResults::Suite(tests))
}

async fn judge(
    workflow: &Workflow,
    req: &TestRequest,
    suite: &str,
) -> Result<TestResults, Error> {
    let mut messages = vec![
        ModelMessage::system(format!(
            "You are a LLM test agent.\n\n\
             Your job is to go through test cases and evaluate them against \
             the current state. If a test case is satisfied, mark it passed.\n\
             If you cannot mark a test case as passed, return it as not \
             passed.\n\n\
             Here is the test suite:\n<suite>\n{suite}\n</suite>"
        )),
        ModelMessage::assistant("What have been done so far?"),
        ModelMessage::user("Here is the work flow so far:"),
    ];
    messages.extend_from_slice(&req.state.messages);
    messages.extend([
        ModelMessage::assistant("What was the agent routing?"),
        ModelMessage::user(req.agents_routing.join(" => ")),
        ModelMessage::assistant("Who was finalizing the last task?"),
        ModelMessage::user(format!(
            "{} was working on the last task",
            req.state.agent
        )),
        ModelMessage::assistant("Is there anything else I need to know?"),
        ModelMessage::user(match workflow.knowledge() {
            Some(knowledge) => {
                format!("Here is all the knowledge available: {knowledge}")
            }
            None => {
                "No, I do not have any additional information.".to_owned()
            }
        }),
    ]);

    let req = ModelRequest {
        messages,
        tools: Vec::new(),
        response_format: ResponseFormat::new()
            .with_variant("suite", schema_for!(SuiteVerdict).to_value())
            .with_variant("error", schema_for!(SuiteError).to_value()),
        temperature: None,
    };
    let resp = match workflow.model_client().chat(req).await? {
        ChatOutcome::Response(resp) => resp,
        ChatOutcome::ToolCalls(_) => {
            return Err(teamflow_core::Error::malformed_response().into());
        }
    };

    if resp.kind == "error" {
        let error: SuiteError = decode(resp)?;
        warn!("the judge couldn't run the tests: {}", error.reasoning);
        return Ok(TestResults::Error {
            reasoning: error.reasoning,
        });
    }
    let verdict: SuiteVerdict = decode(resp)?;
    Ok(TestResults::Suite(verdict.tests))
}

fn decode<T: DeserializeOwned>(resp: StructuredResponse) -> Result<T, Error> {
    serde_json::from_value(resp.value).map_err(|err| {
        teamflow_core::Error::malformed_response()
            .with_reason(err.to_string())
            .into()
    })
}
