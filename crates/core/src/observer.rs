//! Observers of workflow transitions.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::state::WorkflowState;

/// One step of the engine.
#[derive(Clone, Copy, Debug)]
pub struct Transition<'a> {
    /// The state before the step.
    pub prev: &'a WorkflowState,
    /// The state the step produced.
    pub next: &'a WorkflowState,
    /// Fan-out branches that finished during the step, in child order.
    ///
    /// A step that finishes the last branch of a node also merges the
    /// node, so these branches may no longer be reachable from `next`.
    pub finished_branches: &'a [WorkflowState],
}

impl<'a> Transition<'a> {
    /// Creates a transition without finished branches.
    #[inline]
    pub fn new(prev: &'a WorkflowState, next: &'a WorkflowState) -> Self {
        Self {
            prev,
            next,
            finished_branches: &[],
        }
    }

    /// Sets the branches that finished during the step.
    #[inline]
    pub fn with_finished_branches(
        mut self,
        branches: &'a [WorkflowState],
    ) -> Self {
        self.finished_branches = branches;
        self
    }

    /// Returns `true` if the step didn't change anything.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.prev == self.next
    }
}

/// Receives every transition of a run, e.g. to log it or to queue
/// validations of finished work.
///
/// Observers only see borrowed snapshots and can't take part in the
/// control flow. A panicking observer is logged and ignored.
///
/// Observers are awaited one after another before the step returns, so
/// the engine waits for each of them. Slow work, like calling a model,
/// belongs on a spawned task or in a queue drained after the run.
#[async_trait]
pub trait Observer: Send + Sync {
    /// Called once per engine step, after the next state is computed.
    async fn on_transition(&self, transition: Transition<'_>);
}

#[async_trait]
impl<F> Observer for F
where
    F: for<'a> Fn(Transition<'a>) + Send + Sync,
{
    async fn on_transition(&self, transition: Transition<'_>) {
        (self)(transition)
    }
}

/// Logs transitions with `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

#[async_trait]
impl Observer for TracingObserver {
    async fn on_transition(&self, transition: Transition<'_>) {
        let Transition { prev, next, .. } = transition;
        if transition.is_noop() {
            trace!("nothing changed for {}", next.agent);
            return;
        }
        if prev.agent != next.agent {
            info!("routed from {} to {}", prev.agent, next.agent);
        }
        info!(
            agent = %next.agent,
            status = ?next.status,
            messages = next.messages.len(),
            children = next.children.len(),
            "workflow step"
        );
        for branch in transition.finished_branches {
            info!("branch of {} finished", branch.agent);
        }
        if let Some(last) = next.messages.last() {
            debug!("[{}] {}", last.role(), last.content());
        }
    }
}

pub(crate) async fn notify(
    observers: &[Arc<dyn Observer>],
    transition: Transition<'_>,
) {
    for observer in observers {
        let fut = observer.on_transition(transition);
        if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
            warn!("an observer panicked, ignoring it");
        }
    }
}
