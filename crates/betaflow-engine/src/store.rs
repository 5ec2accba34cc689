use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::info;

use betaflow_core::definition::WorkflowDefinition;
use betaflow_core::error::Result;
use betaflow_core::traits::WorkflowStore;
use betaflow_core::types::{Workflow, WorkflowId};

/// Workflow store kept in process memory. Ids start at 1.
pub struct InMemoryWorkflowStore {
    workflows: RwLock<BTreeMap<WorkflowId, Workflow>>,
    next_id: AtomicU64,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn create(&self, definition: WorkflowDefinition) -> BoxFuture<'_, Result<Workflow>> {
        Box::pin(async move {
            let (workflow_name, steps) = definition.into_steps()?;
            let id = WorkflowId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let workflow = Workflow {
                id,
                workflow_name,
                created_at: chrono::Utc::now(),
                steps,
            };

            info!(workflow_id = %id, name = %workflow.workflow_name, steps = workflow.steps.len(), "Workflow created");
            self.workflows.write().await.insert(id, workflow.clone());
            Ok(workflow)
        })
    }

    fn get(&self, id: WorkflowId) -> BoxFuture<'_, Result<Option<Workflow>>> {
        Box::pin(async move { Ok(self.workflows.read().await.get(&id).cloned()) })
    }

    fn list(&self, skip: usize, limit: usize) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move {
            Ok(self
                .workflows
                .read()
                .await
                .values()
                .skip(skip)
                .take(limit)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betaflow_core::definition::StepSpec;
    use betaflow_core::error::FlowError;

    fn definition(name: &str, steps: &[&str]) -> WorkflowDefinition {
        WorkflowDefinition {
            workflow_name: name.to_string(),
            steps: steps
                .iter()
                .map(|s| StepSpec {
                    step_name: s.to_string(),
                    action: "llm-call".to_string(),
                    parameters: Default::default(),
                    condition: None,
                    group: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_orders() {
        let store = InMemoryWorkflowStore::new();
        let first = store.create(definition("one", &["a", "b", "c"])).await.unwrap();
        let second = store.create(definition("two", &["x"])).await.unwrap();

        assert_eq!(first.id, WorkflowId(1));
        assert_eq!(second.id, WorkflowId(2));
        let orders: Vec<usize> = first.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryWorkflowStore::new();
        assert!(store.get(WorkflowId(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_round_trips_steps() {
        let store = InMemoryWorkflowStore::new();
        let created = store.create(definition("one", &["a", "b"])).await.unwrap();
        let loaded = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.workflow_name, "one");
        assert_eq!(loaded.steps, created.steps);
    }

    #[tokio::test]
    async fn test_list_paginates_by_id() {
        let store = InMemoryWorkflowStore::new();
        for name in ["a", "b", "c"] {
            store.create(definition(name, &["s"])).await.unwrap();
        }
        let page = store.list(1, 5).await.unwrap();
        let names: Vec<&str> = page.iter().map(|w| w.workflow_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(store.list(3, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_definition_is_not_stored() {
        let store = InMemoryWorkflowStore::new();
        let err = store.create(definition("dup", &["a", "a"])).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidDefinition(_)));
        assert!(store.is_empty().await);
    }
}
