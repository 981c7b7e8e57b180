//! Worker-side session state, independent of any socket.
//!
//! The request-more cycle is an explicit phase: the session only sends
//! WANT_MORE from `Idle` with an empty queue, and while `AwaitingGrant` the
//! next ADD_COL or FINISH is by construction the reply to that request.

use std::collections::VecDeque;

use farm_shared::{
    models::column::{ColumnIndex, RenderedColumn},
    networking::message::{MasterMessage, WorkerMessage},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingGrant,
    Finishing,
}

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Render(ColumnIndex),
    /// Send WANT_MORE and wait for the reply.
    RequestMore,
    /// Already waiting; feed the next message in.
    AwaitReply,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("master sent {0} after telling this session to finish")]
    AfterFinish(&'static str),
}

#[derive(Debug)]
pub struct SessionState {
    queue: VecDeque<ColumnIndex>,
    results: Vec<RenderedColumn>,
    phase: Phase,
    relinquished: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            results: Vec::new(),
            phase: Phase::Idle,
            relinquished: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn rendered(&self) -> usize {
        self.results.len()
    }

    pub fn relinquished(&self) -> u32 {
        self.relinquished
    }

    pub fn next_action(&mut self) -> Action {
        match self.phase {
            Phase::Finishing => Action::Finish,
            Phase::AwaitingGrant => Action::AwaitReply,
            Phase::Idle => match self.queue.pop_front() {
                Some(column) => Action::Render(column),
                None => {
                    self.phase = Phase::AwaitingGrant;
                    Action::RequestMore
                }
            },
        }
    }

    /// Applies one message from the master. Returns the report to send back,
    /// if the message calls for one.
    pub fn on_message(
        &mut self,
        message: MasterMessage,
    ) -> Result<Option<WorkerMessage>, ProtocolError> {
        match message {
            MasterMessage::AddColumns(columns) => {
                if self.phase == Phase::Finishing {
                    return Err(ProtocolError::AfterFinish("ADD_COL"));
                }
                self.queue.extend(columns);
                self.phase = Phase::Idle;
                Ok(None)
            }
            MasterMessage::RemoveColumns(requested) => Ok(Some(self.relinquish(requested))),
            MasterMessage::Finish => {
                if self.phase == Phase::Finishing {
                    return Err(ProtocolError::AfterFinish("FINISH"));
                }
                self.phase = Phase::Finishing;
                Ok(None)
            }
        }
    }

    pub fn record(&mut self, rendered: RenderedColumn) {
        self.results.push(rendered);
    }

    /// Drops up to `requested` columns from the tail of the queue.
    fn relinquish(&mut self, requested: u32) -> WorkerMessage {
        let count = (requested as usize).min(self.queue.len());
        self.queue.truncate(self.queue.len() - count);
        self.relinquished += count as u32;
        WorkerMessage::Relinquished(count as u32)
    }

    /// The closing messages: give back whatever is still queued, then the
    /// results.
    pub fn finish(&mut self) -> Vec<WorkerMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.queue.is_empty() {
            messages.push(self.relinquish(self.queue.len() as u32));
        }
        messages.push(WorkerMessage::Results(std::mem::take(&mut self.results)));
        messages
    }
}
