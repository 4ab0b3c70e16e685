//! Progress and result notifications for the presentation layer.
//!
//! The engine never calls into the UI. A caller that wants live progress
//! hands the engine an [`EventSender`] and drains the receiving end;
//! events sent after the receiver is dropped are discarded.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ops::task::{ItemOutcome, OperationKind, TaskId, TaskReport};

/// Sending half of an operation event channel.
pub type EventSender = mpsc::UnboundedSender<OperationEvent>;

/// A notification flowing **Core → UI**.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OperationEvent {
    /// The task was accepted and may be waiting on an overlapping task.
    TaskQueued { id: TaskId, kind: OperationKind },
    /// The task holds its locks and starts executing items.
    TaskStarted { id: TaskId, total_items: usize },
    ItemStarted {
        id: TaskId,
        index: usize,
        source: PathBuf,
    },
    /// `bytes` more bytes of item `index` were written.
    BytesCopied { id: TaskId, index: usize, bytes: u64 },
    ItemFinished {
        id: TaskId,
        index: usize,
        source: PathBuf,
        outcome: ItemOutcome,
    },
    /// Terminal report with every item outcome.
    TaskFinished { report: TaskReport },
}

impl OperationEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::TaskQueued { id, .. }
            | Self::TaskStarted { id, .. }
            | Self::ItemStarted { id, .. }
            | Self::BytesCopied { id, .. }
            | Self::ItemFinished { id, .. } => *id,
            Self::TaskFinished { report } => report.id,
        }
    }
}

/// Sends `event` if a listener is attached.
pub(crate) fn emit(events: Option<&EventSender>, event: OperationEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening any more.
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::task::TaskStatus;

    #[test]
    fn emit_without_listener_is_a_no_op() {
        emit(
            None,
            OperationEvent::TaskQueued {
                id: TaskId::new(),
                kind: OperationKind::Copy,
            },
        );
    }

    #[test]
    fn emit_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        emit(
            Some(&tx),
            OperationEvent::TaskStarted {
                id: TaskId::new(),
                total_items: 1,
            },
        );
    }

    #[test]
    fn task_id_of_finished_event_comes_from_report() {
        let id = TaskId::new();
        let event = OperationEvent::TaskFinished {
            report: TaskReport {
                id,
                kind: OperationKind::Delete,
                status: TaskStatus::Completed,
                outcomes: Vec::new(),
            },
        };
        assert_eq!(event.task_id(), id);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = OperationEvent::BytesCopied {
            id: TaskId::new(),
            index: 2,
            bytes: 4096,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "bytes_copied");
        assert_eq!(value["bytes"], 4096);
    }
}
