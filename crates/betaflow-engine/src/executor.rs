use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use betaflow_core::error::{FlowError, Result};
use betaflow_core::event::{EventBus, RunEvent};
use betaflow_core::traits::WorkflowStore;
use betaflow_core::types::{RunId, Workflow, WorkflowExecutionResult, WorkflowId};

use crate::dispatcher::ActionRegistry;
use crate::scheduler::GroupScheduler;

/// Runs stored workflows end to end.
///
/// Loads the workflow, hands its ordered steps to a [`GroupScheduler`] and
/// packages the per-step results. The only error a run can surface is a
/// workflow that cannot be loaded; once steps are loaded the run completes.
pub struct WorkflowExecutor {
    store: Arc<dyn WorkflowStore>,
    registry: Arc<ActionRegistry>,
    events: Arc<EventBus>,
}

impl WorkflowExecutor {
    pub fn new(store: Arc<dyn WorkflowStore>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            store,
            registry,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Publish run progress on the given bus instead of a private one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Execute the workflow stored under `id`.
    pub async fn execute(&self, id: WorkflowId) -> Result<WorkflowExecutionResult> {
        let workflow = match self.store.get(id).await? {
            Some(w) => w,
            None => {
                warn!(workflow_id = %id, "Workflow not found");
                return Err(FlowError::WorkflowNotFound(id));
            }
        };
        Ok(self.execute_workflow(&workflow).await)
    }

    /// Execute an already loaded workflow.
    pub async fn execute_workflow(&self, workflow: &Workflow) -> WorkflowExecutionResult {
        let start = Instant::now();
        let run_id = RunId::new();
        let steps = workflow.ordered_steps();

        info!(
            run_id = %run_id,
            workflow_id = %workflow.id,
            workflow = %workflow.workflow_name,
            steps = steps.len(),
            "Starting workflow run"
        );
        self.events.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            workflow_id: workflow.id,
            workflow_name: workflow.workflow_name.clone(),
            total_steps: steps.len(),
        });

        let scheduler = GroupScheduler::new(self.registry.clone(), self.events.clone());
        let results = scheduler.run(&run_id, &steps).await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let errors = results.iter().filter(|r| r.is_error()).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        info!(
            run_id = %run_id,
            workflow_id = %workflow.id,
            errors,
            skipped,
            elapsed_ms,
            "Workflow run complete"
        );
        self.events.publish(RunEvent::RunComplete {
            run_id,
            workflow_id: workflow.id,
            elapsed_ms,
        });

        WorkflowExecutionResult {
            workflow_id: workflow.id,
            workflow_name: workflow.workflow_name.clone(),
            results,
            elapsed_ms,
        }
    }
}
