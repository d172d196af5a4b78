//! Awaited operations of task-wait states.
//!
//! Task futures are owned by their states and polled from the thread that
//! owns the chart, so a settled operation is observed between steps and
//! never in the middle of one.

use super::faults::{isolate, FaultSite, Phase};
use super::Chart;
use crate::core::state::{Payload, StateId};
use crate::core::Event;
use std::future::Future;
use std::task::{Context, Poll};

impl Chart {
    /// Poll every running task once. Returns the task states whose
    /// operation settled, in arena order. A task that panics while polled
    /// counts as settled.
    pub(crate) fn poll_tasks(&mut self, cx: &mut Context<'_>) -> Vec<StateId> {
        self.orphans
            .retain_mut(|future| matches!(isolate(|| future.as_mut().poll(cx)), Ok(Poll::Pending)));

        let Chart {
            states,
            diagnostics,
            ..
        } = self;
        let mut settled = Vec::new();

        for (index, node) in states.iter_mut().enumerate() {
            let Payload::TaskWait {
                task, completed, ..
            } = &mut node.payload
            else {
                continue;
            };
            let Some(future) = task.as_mut() else {
                continue;
            };

            match isolate(|| future.as_mut().poll(cx)) {
                Ok(Poll::Pending) => continue,
                Ok(Poll::Ready(())) => {}
                Err(message) => {
                    let site = FaultSite {
                        phase: Phase::Task,
                        state: &node.name,
                        target: None,
                        event: None,
                        backtrace: node.backtrace.as_deref(),
                    };
                    diagnostics.report(site.fault(message));
                }
            }

            *task = None;
            *completed = true;
            tracing::trace!(chart = %diagnostics.instance_id, "Task of '{}' settled", node.name);
            settled.push(StateId(index));
        }

        settled
    }

    /// Events to replay after the task of `state` settled: the queued
    /// events, or a single empty resumption when none were queued. A task
    /// state that was restarted since has nothing to replay.
    pub(crate) fn take_resumptions(&mut self, state: StateId) -> Vec<Option<Event>> {
        match &mut self.states[state.0].payload {
            Payload::TaskWait {
                completed: true,
                queue,
                ..
            } if !queue.is_empty() => queue.drain(..).collect(),
            Payload::TaskWait {
                completed: true, ..
            } => vec![None],
            _ => Vec::new(),
        }
    }

    /// Number of awaited operations that have not settled yet.
    pub(crate) fn pending_tasks(&self) -> usize {
        let owned = self
            .states
            .iter()
            .filter(|node| matches!(&node.payload, Payload::TaskWait { task: Some(_), .. }))
            .count();
        owned + self.orphans.len()
    }
}
