//! Task decomposition, agent selection and finalization.
//!
//! Each decision is a round-trip to the model with a small closed set of
//! answer shapes. The supervisor never guesses: an answer that names an
//! agent outside the roster is an error.

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use teamflow_model::{ModelMessage, ModelRequest, ResponseFormat};

use crate::Error;
use crate::agent::Agent;
use crate::model_client::{ChatOutcome, ModelClient, decode};

/// The next unit of work decided by the supervisor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Task {
    /// One task, to be performed by one member.
    Single(String),
    /// Independent tasks that can be performed concurrently, each by one
    /// member.
    Parallel(Vec<String>),
}

#[derive(Deserialize, JsonSchema)]
struct NextTaskStep {
    /// Why this is the next step.
    reasoning: String,
    /// The concrete task to perform next.
    task: String,
}

#[derive(Deserialize, JsonSchema)]
struct ParallelTasksStep {
    /// Why these tasks can be done at the same time.
    reasoning: String,
    /// Independent tasks, each to be performed by one team member.
    tasks: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
struct CompleteStep {
    /// Why the expected output has been achieved.
    reasoning: String,
}

#[derive(Deserialize, JsonSchema)]
struct AgentSelection {
    /// Why this member is the best fit.
    reasoning: String,
    /// The exact name of the chosen member.
    agent: String,
}

#[derive(Deserialize, JsonSchema)]
struct FinalAnswer {
    /// The best possible answer to the workflow.
    answer: String,
}

/// Asks the model whether the expected output has been achieved.
///
/// Returns `None` when the work is complete, otherwise the next task.
pub async fn get_next_task(
    client: &ModelClient,
    transcript: &[ModelMessage],
) -> Result<Option<Task>, Error> {
    let format = ResponseFormat::new()
        .with_variant("next_task", schema_for!(NextTaskStep).to_value())
        .with_variant(
            "parallel_tasks",
            schema_for!(ParallelTasksStep).to_value(),
        )
        .with_variant("complete", schema_for!(CompleteStep).to_value());

    let mut messages = Vec::with_capacity(transcript.len() + 2);
    messages.push(ModelMessage::system(
        "You are a planner that breaks down complex workflows into smaller, \
         well-defined tasks.\n\
         Your job is to review the work done so far and decide the next \
         step towards the expected output of the workflow.\n\
         If the expected output has been achieved, answer with `complete`.\n\
         If several independent tasks can be done at the same time, answer \
         with `parallel_tasks`. Otherwise, answer with `next_task`.\n\
         Describe each task so that it can be performed without reading \
         the other tasks.",
    ));
    messages.extend_from_slice(transcript);
    messages.push(ModelMessage::user("What is the next task?"));

    let resp = structured(client, messages, format).await?;
    match resp.kind.as_str() {
        "complete" => {
            let step: CompleteStep = decode(resp)?;
            debug!("workflow is complete: {}", step.reasoning);
            Ok(None)
        }
        "next_task" => {
            let step: NextTaskStep = decode(resp)?;
            debug!("next task: {} ({})", step.task, step.reasoning);
            Ok(Some(Task::Single(step.task)))
        }
        "parallel_tasks" => {
            let step: ParallelTasksStep = decode(resp)?;
            debug!("parallel tasks: {:?} ({})", step.tasks, step.reasoning);
            match step.tasks.len() {
                0 => Err(Error::malformed_response()
                    .with_reason("`parallel_tasks` without any task")),
                1 => Ok(step.tasks.into_iter().next().map(Task::Single)),
                _ => Ok(Some(Task::Parallel(step.tasks))),
            }
        }
        kind => Err(Error::malformed_response()
            .with_reason(format!("unexpected answer `{kind}`"))),
    }
}

/// Asks the model to pick the member best suited for `task`.
///
/// The answer must name a member of `roster`, otherwise this fails with
/// an [`UnknownAgent`](crate::ErrorKind::UnknownAgent) error.
pub async fn select_agent<'a>(
    client: &ModelClient,
    task: &str,
    roster: &'a [Agent],
) -> Result<&'a Agent, Error> {
    if roster.is_empty() {
        return Err(Error::unknown_agent("<none>")
            .with_reason("the roster is empty"));
    }

    let members = roster
        .iter()
        .map(|agent| {
            format!(
                "<agent name=\"{}\">{}</agent>",
                agent.role,
                agent.description.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let messages = vec![
        ModelMessage::system(format!(
            "You are an assistant responsible for picking the best agent \
             for the task.\n\
             Here are the available agents:\n\
             <agents>\n{members}\n</agents>\n\
             Answer with the exact name of one agent only.",
        )),
        ModelMessage::user(format!("Here is the task: <task>{task}</task>")),
    ];
    let format = ResponseFormat::new()
        .with_variant("select_agent", schema_for!(AgentSelection).to_value());

    let selection: AgentSelection =
        decode(structured(client, messages, format).await?)?;
    debug!("selected {} ({})", selection.agent, selection.reasoning);

    roster
        .iter()
        .find(|agent| agent.role == selection.agent)
        .ok_or_else(|| {
            error!("the model selected an unknown agent: {}", selection.agent);
            Error::unknown_agent(selection.agent)
        })
}

/// Asks the model for the best possible answer from the transcript as-is.
pub async fn finalize(
    client: &ModelClient,
    transcript: &[ModelMessage],
) -> Result<String, Error> {
    let mut messages = Vec::with_capacity(transcript.len() + 2);
    messages.push(ModelMessage::system(
        "You are exceptionally skilled at wrapping up work that ran out of \
         time.\n\
         The team could not finish the workflow within its iteration \
         budget. Based on the work done so far, give the best possible \
         answer matching the expected output of the workflow. Do not ask \
         for more work.",
    ));
    messages.extend_from_slice(transcript);
    messages.push(ModelMessage::user("What is the final answer?"));
    let format = ResponseFormat::new()
        .with_variant("final_answer", schema_for!(FinalAnswer).to_value());

    let answer: FinalAnswer =
        decode(structured(client, messages, format).await?)?;
    Ok(answer.answer)
}

async fn structured(
    client: &ModelClient,
    messages: Vec<ModelMessage>,
    response_format: ResponseFormat,
) -> Result<teamflow_model::StructuredResponse, Error> {
    let req = ModelRequest {
        messages,
        tools: Vec::new(),
        response_format,
        temperature: None,
    };
    match client.chat(req).await? {
        ChatOutcome::Response(resp) => Ok(resp),
        // The client rejects tool calls for requests without tools.
        ChatOutcome::ToolCalls(_) => Err(Error::malformed_response()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use teamflow_test_model::TestModelProvider;

    use super::*;
    use crate::{AgentBuilder, ErrorKind};

    fn roster() -> Vec<Agent> {
        vec![
            AgentBuilder::new("Nurse", "Asks the patient questions").build(),
            AgentBuilder::new("Reporter", "Writes reports").build(),
        ]
    }

    #[tokio::test]
    async fn test_next_task() {
        let mut provider = TestModelProvider::default();
        provider
            .add_structured(
                "next_task",
                json!({ "reasoning": "start", "task": "Interview" }),
            )
            .add_structured("complete", json!({ "reasoning": "done" }));
        let client = ModelClient::new(provider.clone());
        let transcript = vec![ModelMessage::user("Make a note")];

        let task = get_next_task(&client, &transcript).await.unwrap();
        assert_eq!(task, Some(Task::Single("Interview".to_owned())));
        let task = get_next_task(&client, &transcript).await.unwrap();
        assert_eq!(task, None);

        let req = &provider.requests()[0];
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.response_format.variants().len(), 3);
    }

    #[tokio::test]
    async fn test_parallel_tasks() {
        let mut provider = TestModelProvider::default();
        provider
            .add_structured(
                "parallel_tasks",
                json!({ "reasoning": "independent", "tasks": ["A", "B"] }),
            )
            .add_structured(
                "parallel_tasks",
                json!({ "reasoning": "just one", "tasks": ["A"] }),
            )
            .add_structured(
                "parallel_tasks",
                json!({ "reasoning": "nothing", "tasks": [] }),
            );
        let client = ModelClient::new(provider);

        let task = get_next_task(&client, &[]).await.unwrap();
        assert_eq!(
            task,
            Some(Task::Parallel(vec!["A".to_owned(), "B".to_owned()]))
        );
        let task = get_next_task(&client, &[]).await.unwrap();
        assert_eq!(task, Some(Task::Single("A".to_owned())));
        let err = get_next_task(&client, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_next_task_rejects_other_kinds() {
        let mut provider = TestModelProvider::default();
        provider.add_structured(
            "select_agent",
            json!({ "reasoning": "wrong question", "agent": "Nurse" }),
        );
        let client = ModelClient::new(provider);

        let err = get_next_task(&client, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_select_agent() {
        let mut provider = TestModelProvider::default();
        provider.add_structured(
            "select_agent",
            json!({ "reasoning": "writing", "agent": "Reporter" }),
        );
        let client = ModelClient::new(provider.clone());
        let roster = roster();

        let agent = select_agent(&client, "Write the note", &roster)
            .await
            .unwrap();
        assert_eq!(agent.role(), "Reporter");

        let requests = provider.requests();
        let system = requests[0].messages[0].content().to_text();
        assert!(system.contains("<agent name=\"Nurse\">"));
    }

    #[tokio::test]
    async fn test_select_unknown_agent() {
        let mut provider = TestModelProvider::default();
        provider.add_structured(
            "select_agent",
            json!({ "reasoning": "guess", "agent": "Surgeon" }),
        );
        let client = ModelClient::new(provider);

        let err = select_agent(&client, "Operate", &roster())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAgent);
        assert_eq!(err.reason(), "Surgeon");
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_finalize() {
        let mut provider = TestModelProvider::default();
        provider.add_structured("final_answer", json!({ "answer": "Best" }));
        let client = ModelClient::new(provider);

        let answer = finalize(&client, &[ModelMessage::user("Go")])
            .await
            .unwrap();
        assert_eq!(answer, "Best");
    }
}
