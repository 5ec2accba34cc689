use serde::{Deserialize, Serialize};

use crate::types::{RunId, StepResult, UnitKind, WorkflowId};

/// Progress notifications emitted while a workflow runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run began.
    RunStarted {
        run_id: RunId,
        workflow_id: WorkflowId,
        workflow_name: String,
        total_steps: usize,
    },
    /// An execution unit is about to launch its members.
    UnitStarted {
        run_id: RunId,
        unit: UnitKind,
        size: usize,
    },
    /// A step passed its condition and is being dispatched.
    StepStarted { run_id: RunId, step_name: String },
    /// A step produced its result (success, skip, or error).
    StepFinished { run_id: RunId, result: StepResult },
    /// Every unit completed.
    RunComplete {
        run_id: RunId,
        workflow_id: WorkflowId,
        elapsed_ms: u64,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// A zero capacity is raised to 1; broadcast channels need room for one event.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RunEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
