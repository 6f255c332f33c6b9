use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use teamflow_model::{ModelMessage, ModelRequest, ResponseFormat};

use super::Agent;
use crate::Error;
use crate::model_client::{ChatOutcome, ModelClient, decode};

const DELIVERABLE_KIND: &str = "complete";

#[derive(Deserialize, JsonSchema)]
struct Deliverable {
    /// The outcome of the task, in the format the task asked for.
    result: String,
}

/// How one model call of an agent ended.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TurnOutcome {
    /// The model asked for tools; carries the assistant message that
    /// records the calls.
    ToolCalls(ModelMessage),
    /// The model delivered; carries the deliverable.
    Completed(ModelMessage),
    /// The model call failed; carries the error as an assistant message.
    Failed(ModelMessage),
}

/// Sends the transcript to the agent's model together with its tools.
///
/// Tool calls are recorded but not executed here, the engine runs them
/// in its next step.
pub(crate) async fn run_turn(
    agent: &Agent,
    client: &ModelClient,
    transcript: &[ModelMessage],
    knowledge: Option<&str>,
) -> TurnOutcome {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ModelMessage::system(instructions(agent, knowledge)));
    messages.extend_from_slice(transcript);

    let req = ModelRequest {
        messages,
        tools: agent.tools.definitions(),
        response_format: deliverable_format(agent),
        temperature: None,
    };

    let result = client.chat(req).await.and_then(|outcome| match outcome {
        ChatOutcome::ToolCalls(calls) => {
            debug!("{} requested {} tool call(s)", agent.role, calls.len());
            Ok(TurnOutcome::ToolCalls(ModelMessage::tool_calls(
                &agent.role,
                calls,
            )))
        }
        ChatOutcome::Response(resp) => {
            let msg = match agent.output_schema {
                Some(_) => ModelMessage::assistant_value(resp.value),
                None => {
                    let deliverable: Deliverable = decode(resp)?;
                    ModelMessage::assistant(deliverable.result)
                }
            };
            Ok(TurnOutcome::Completed(msg))
        }
    });

    result.unwrap_or_else(|err: Error| {
        warn!("{} failed its turn: {err}", agent.role);
        TurnOutcome::Failed(ModelMessage::assistant(err.to_string()))
    })
}

fn deliverable_format(agent: &Agent) -> ResponseFormat {
    let schema = match &agent.output_schema {
        Some(schema) => schema.clone(),
        None => schema_for!(Deliverable).to_value(),
    };
    ResponseFormat::new().with_variant(DELIVERABLE_KIND, schema)
}

fn instructions(agent: &Agent, knowledge: Option<&str>) -> String {
    let mut prompt = format!(
        "You are {}.\n{}\n\n\
         Your job is to complete the task assigned to you by the team \
         supervisor, which is the last user message. Use the tools \
         available to you when you need them. When you are done, answer \
         with the deliverable of the task only.",
        agent.role,
        agent.description.trim(),
    );
    if let Some(knowledge) = knowledge {
        prompt.push_str("\n\nHere is all the knowledge available:\n");
        prompt.push_str(knowledge);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use teamflow_model::{MessageContent, Role, ToolCallRequest};
    use teamflow_test_model::{PresetResponse, TestModelProvider};

    use super::*;
    use crate::AgentBuilder;
    use crate::tool::{Tool, ToolResult};

    static EMPTY_SCHEMA: &serde_json::Value = &serde_json::Value::Null;

    struct ThesaurusTool;

    impl Tool for ThesaurusTool {
        type Input = serde_json::Value;

        fn name(&self) -> &str {
            "thesaurus"
        }

        fn description(&self) -> &str {
            "Finds synonyms"
        }

        fn parameter_schema(&self) -> &serde_json::Value {
            EMPTY_SCHEMA
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            std::future::ready(Ok("fall".to_owned()))
        }
    }

    fn transcript() -> Vec<ModelMessage> {
        vec![ModelMessage::user("Write a haiku about autumn")]
    }

    #[tokio::test]
    async fn test_completion() {
        let mut provider = TestModelProvider::default();
        provider.add_structured("complete", json!({ "result": "Leaves fall" }));
        let agent = AgentBuilder::new("Poet", "Writes poems").build();

        let outcome = run_turn(
            &agent,
            &ModelClient::new(provider.clone()),
            &transcript(),
            Some("Haikus have three lines"),
        )
        .await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed(ModelMessage::assistant("Leaves fall"))
        );

        let requests = provider.requests();
        let system = requests[0].messages[0].content().to_text();
        assert!(system.contains("You are Poet."));
        assert!(system.contains("Haikus have three lines"));
        assert_eq!(requests[0].messages.len(), 2);
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_structured_deliverable() {
        let mut provider = TestModelProvider::default();
        provider.add_structured("complete", json!({ "lines": 3 }));
        let agent = AgentBuilder::new("Poet", "Writes poems")
            .with_output_schema(json!({ "type": "object" }))
            .build();

        let outcome = run_turn(
            &agent,
            &ModelClient::new(provider),
            &transcript(),
            None,
        )
        .await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed(ModelMessage::assistant_value(
                json!({ "lines": 3 })
            ))
        );
    }

    #[tokio::test]
    async fn test_tool_calls_are_recorded() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::tool_calls([ToolCallRequest {
            id: "call:1".to_owned(),
            name: "thesaurus".to_owned(),
            arguments: json!({ "word": "autumn" }),
        }]));
        let agent = AgentBuilder::new("Poet", "Writes poems")
            .with_tool(ThesaurusTool)
            .build();

        let outcome = run_turn(
            &agent,
            &ModelClient::new(provider.clone()),
            &transcript(),
            None,
        )
        .await;
        let TurnOutcome::ToolCalls(msg) = outcome else {
            panic!("expected tool calls, got {outcome:?}");
        };
        assert_eq!(provider.requests()[0].tools[0].name, "thesaurus");
        assert_eq!(msg.role(), Role::Assistant);
        assert!(matches!(
            msg.content(),
            MessageContent::ToolCalls { agent, calls }
                if agent == "Poet" && calls[0].name == "thesaurus"
        ));
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let provider = TestModelProvider::default();
        let agent = AgentBuilder::new("Poet", "Writes poems").build();

        let outcome = run_turn(
            &agent,
            &ModelClient::new(provider),
            &transcript(),
            None,
        )
        .await;
        let TurnOutcome::Failed(msg) = outcome else {
            panic!("expected a failure, got {outcome:?}");
        };
        assert_eq!(msg.role(), Role::Assistant);
        assert!(msg.content().to_text().contains("no enough steps"));
    }
}
