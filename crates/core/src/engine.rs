//! The workflow state machine.
//!
//! [`advance`] computes exactly one next state from the previous one. It
//! never mutates its input, so a caller may retry a step, keep old states
//! around, or stop at any point.


use futures_util::future::{BoxFuture, FutureExt, join_all, try_join_all};
use teamflow_model::{MessageContent, ModelMessage};
use tracing::Instrument;

use crate::agent::{TurnOutcome, run_turn};
use crate::observer::{Transition, notify};
use crate::state::{AgentRef, Status, WorkflowState, solution};
use crate::supervisor::{Task, finalize, get_next_task, select_agent};
use crate::{Error, Workflow};

/// One computed step.
#[derive(Debug)]
struct Step {
    state: WorkflowState,
    /// Branches that finished during the step, in child order.
    finished: Vec<WorkflowState>,
}

impl From<WorkflowState> for Step {
    fn from(state: WorkflowState) -> Self {
        Self {
            state,
            finished: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Branch {
    /// The top-level state, handed back to the supervisor after each
    /// member turn.
    Root,
    /// A fan-out branch, finished by its member's first deliverable.
    Child,
}

/// Computes the next state.
///
/// Failures of model round-trips are recorded in the returned state. Only
/// contract violations, like the selection of an agent outside the
/// roster, are returned as errors.
pub async fn advance(
    state: &WorkflowState,
    workflow: &Workflow,
) -> Result<WorkflowState, Error> {
    Ok(step(state, workflow).await?.state)
}

/// Computes the next state and notifies the workflow's observers.
pub async fn iterate(
    state: &WorkflowState,
    workflow: &Workflow,
) -> Result<WorkflowState, Error> {
    let Step { state: next, finished } = step(state, workflow).await?;
    let transition =
        Transition::new(state, &next).with_finished_branches(&finished);
    notify(&workflow.observers, transition).await;
    Ok(next)
}

async fn step(
    state: &WorkflowState,
    workflow: &Workflow,
) -> Result<Step, Error> {
    advance_node(state, &[], workflow, Branch::Root)
        .instrument(debug_span!("advance", agent = %state.agent))
        .await
}

/// Drives the workflow from `state` until it finishes.
///
/// Returns the content of the last message. A failed run yields its error
/// message prefixed with `Workflow failed:`.
pub async fn run(
    workflow: &Workflow,
    state: WorkflowState,
) -> Result<MessageContent, Error> {
    let mut state = state;
    loop {
        match state.status {
            Status::Finished => {
                return solution(&state)
                    .cloned()
                    .ok_or_else(Error::empty_transcript);
            }
            Status::Failed => {
                let reason = solution(&state)
                    .map(|content| content.to_text().into_owned())
                    .unwrap_or_default();
                return Ok(MessageContent::Text(format!(
                    "Workflow failed: {reason}"
                )));
            }
            Status::Interrupted => {
                info!("the budget is exhausted, finalizing the workflow");
            }
            Status::Idle | Status::Running | Status::Paused => {}
        }
        state = iterate(&state, workflow).await?;
    }
}

fn advance_node<'a>(
    state: &'a WorkflowState,
    context: &'a [ModelMessage],
    workflow: &'a Workflow,
    branch: Branch,
) -> BoxFuture<'a, Result<Step, Error>> {
    async move {
        if branch == Branch::Root
            && state.agent != AgentRef::FinalBoss
            && state.transcript_len() > workflow.max_iterations
        {
            return exhaust_budget(state, workflow).await.map(Step::from);
        }

        if !state.children.is_empty() {
            return advance_children(state, context, workflow).await;
        }

        let next = match (state.status, &state.agent) {
            (Status::Finished, _) => Ok(state.clone()),
            (Status::Failed, _) => {
                Ok(state.clone().with_status(Status::Finished))
            }
            (Status::Paused, _) => resume(state, workflow).await,
            (Status::Interrupted, _) | (_, AgentRef::FinalBoss) => {
                wrap_up(state, context, workflow).await
            }
            (_, AgentRef::Supervisor) => {
                supervise(state, context, workflow).await
            }
            (_, AgentRef::Member(role)) => {
                delegate(state, role, context, workflow, branch).await
            }
        }?;
        Ok(Step::from(next))
    }
    .boxed()
}

async fn exhaust_budget(
    state: &WorkflowState,
    workflow: &Workflow,
) -> Result<WorkflowState, Error> {
    warn!(
        "{} messages exceed the budget of {}",
        state.transcript_len(),
        workflow.max_iterations
    );
    let status = match state.status {
        Status::Finished => Status::Finished,
        _ => Status::Interrupted,
    };
    let messages = settle(state, workflow).await?;
    Ok(WorkflowState::new(AgentRef::FinalBoss)
        .with_status(status)
        .with_messages(messages))
}

/// Flattens a subtree into one transcript, running the tool calls left
/// pending so that every call has its result.
fn settle<'a>(
    state: &'a WorkflowState,
    workflow: &'a Workflow,
) -> BoxFuture<'a, Result<Vec<ModelMessage>, Error>> {
    async move {
        let mut messages = state.messages.clone();
        if state.status == Status::Paused {
            messages.extend(run_pending_tools(state, workflow).await?);
        }
        let children =
            try_join_all(state.children.iter().map(|c| settle(c, workflow)))
                .await?;
        messages.extend(children.into_iter().flatten());
        Ok(messages)
    }
    .boxed()
}

async fn advance_children(
    state: &WorkflowState,
    context: &[ModelMessage],
    workflow: &Workflow,
) -> Result<Step, Error> {
    let context = [context, state.messages.as_slice()].concat();
    let steps = join_all(state.children.iter().map(|child| {
        advance_node(child, &context, workflow, Branch::Child)
    }))
    .await
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    let mut finished = Vec::new();
    let mut children = Vec::with_capacity(steps.len());
    for (child, step) in state.children.iter().zip(steps) {
        finished.extend(step.finished);
        if child.status != Status::Finished
            && step.state.status == Status::Finished
        {
            finished.push(step.state.clone());
        }
        children.push(step.state);
    }

    let next = state.clone().with_children(children);
    if next
        .children
        .iter()
        .all(|child| child.status == Status::Finished)
    {
        debug!("all {} branches finished, merging", next.children.len());
        return Ok(Step {
            state: next.merge_children(),
            finished,
        });
    }
    Ok(Step {
        state: next,
        finished,
    })
}

async fn resume(
    state: &WorkflowState,
    workflow: &Workflow,
) -> Result<WorkflowState, Error> {
    let results = run_pending_tools(state, workflow).await?;
    Ok(state.clone().append(results).with_status(Status::Running))
}

async fn run_pending_tools(
    state: &WorkflowState,
    workflow: &Workflow,
) -> Result<Vec<ModelMessage>, Error> {
    let Some((role, calls)) = state.pending_tool_calls() else {
        warn!("{} is paused without pending tool calls", state.agent);
        return Ok(Vec::new());
    };
    let agent = workflow
        .member(role)
        .ok_or_else(|| Error::unknown_agent(role))?;
    Ok(agent.tools.run_tools(calls.to_vec()).await)
}

async fn wrap_up(
    state: &WorkflowState,
    context: &[ModelMessage],
    workflow: &Workflow,
) -> Result<WorkflowState, Error> {
    let transcript = [context, state.messages.as_slice()].concat();
    match finalize(&workflow.model_client, &transcript).await {
        Ok(answer) => Ok(state
            .clone()
            .with_agent(AgentRef::FinalBoss)
            .append([ModelMessage::assistant(answer)])
            .with_status(Status::Finished)),
        Err(err) => fail(state, err),
    }
}

async fn supervise(
    state: &WorkflowState,
    context: &[ModelMessage],
    workflow: &Workflow,
) -> Result<WorkflowState, Error> {
    let client = &workflow.model_client;
    let transcript = [context, state.messages.as_slice()].concat();
    let task = match get_next_task(client, &transcript).await {
        Ok(task) => task,
        Err(err) => return fail(state, err),
    };

    match task {
        None => Ok(state.clone().with_status(Status::Finished)),
        Some(Task::Single(task)) => {
            let agent = match select_agent(client, &task, &workflow.members)
                .await
            {
                Ok(agent) => agent,
                Err(err) => return fail(state, err),
            };
            info!("assigned to {}: {task}", agent.role);
            Ok(state
                .clone()
                .append([ModelMessage::user(task)])
                .with_agent(AgentRef::member(&agent.role))
                .with_status(Status::Running))
        }
        Some(Task::Parallel(tasks)) => {
            let selections = join_all(
                tasks
                    .iter()
                    .map(|task| select_agent(client, task, &workflow.members)),
            )
            .await;

            let mut children = Vec::with_capacity(tasks.len());
            for (task, selection) in tasks.into_iter().zip(selections) {
                let agent = match selection {
                    Ok(agent) => agent,
                    Err(err) => return fail(state, err),
                };
                info!("assigned to {} in parallel: {task}", agent.role);
                children.push(
                    WorkflowState::new(AgentRef::member(&agent.role))
                        .with_status(Status::Running)
                        .with_messages(vec![ModelMessage::user(task)]),
                );
            }
            Ok(state
                .clone()
                .with_children(children)
                .with_status(Status::Running))
        }
    }
}

async fn delegate(
    state: &WorkflowState,
    role: &str,
    context: &[ModelMessage],
    workflow: &Workflow,
    branch: Branch,
) -> Result<WorkflowState, Error> {
    let agent = workflow
        .member(role)
        .ok_or_else(|| Error::unknown_agent(role))?;
    let client = agent.client_or(&workflow.model_client);
    let transcript = [context, state.messages.as_slice()].concat();

    let next = match run_turn(agent, client, &transcript, workflow.knowledge())
        .await
    {
        TurnOutcome::ToolCalls(msg) => {
            state.clone().append([msg]).with_status(Status::Paused)
        }
        TurnOutcome::Completed(msg) => {
            let next = state.clone().append([msg]);
            match branch {
                Branch::Root => next
                    .with_agent(AgentRef::Supervisor)
                    .with_status(Status::Running),
                Branch::Child => next.with_status(Status::Finished),
            }
        }
        TurnOutcome::Failed(msg) => {
            state.clone().append([msg]).with_status(Status::Failed)
        }
    };
    Ok(next)
}

/// Records a recoverable error in the transcript and fails the state.
fn fail(state: &WorkflowState, err: Error) -> Result<WorkflowState, Error> {
    if !err.is_recoverable() {
        return Err(err);
    }
    warn!("{} failed: {err}", state.agent);
    Ok(state
        .clone()
        .append([ModelMessage::assistant(err.to_string())])
        .with_status(Status::Failed))
}
